//! Mock 선물 거래소 FuturesExchangeProvider 구현.
//!
//! 실제 거래소 없이 실행 엔진을 검증하기 위한 인메모리 거래소입니다.
//! 단방향/헤지 모드의 포지션 규칙(positionSide, reduceOnly)을 실제 거래소처럼
//! 검사하므로 잘못된 주문 파라미터는 API 에러로 거부됩니다.
//!
//! # 아키텍처
//!
//! ```text
//! MockFuturesExchange
//! ├── FuturesExchangeProvider 구현
//! ├── 포지션 레그 (심볼 × positionSide)
//! ├── 제출 주문 기록 (순서 보존)
//! └── 작업별 에러 주입 / 호출 횟수
//! ```

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tracing::debug;
use trader_core::{
    normalize_symbol, to_exchange_symbol, AccountBalance, ExchangePosition,
    FuturesExchangeProvider, FuturesOrderRequest, OrderAck, OrderSide, PositionMode, PositionSide,
    PositionTag, ProviderError,
};

/// 에러 주입 및 호출 횟수 집계 대상 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    FetchPositions,
    SetLeverage,
    PlaceOrder,
    FetchBalance,
    FetchLastPrice,
    FetchPositionMode,
    FetchAccountSettings,
}

/// 포지션 모드 조회 지원 수준.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockModeSupport {
    /// 표준 조회와 원시 설정 조회 모두 지원
    Standard,
    /// 원시 설정 조회만 지원
    RawOnly,
    /// 둘 다 실패
    Unavailable,
}

#[derive(Debug, Clone, Default)]
struct MockLeg {
    /// 단방향: 부호 있는 수량, 헤지: 레그 수량 (양수)
    size: Decimal,
    entry_price: Decimal,
}

type LegKey = (String, Option<PositionTag>);

#[derive(Debug)]
struct MockState {
    mode: PositionMode,
    mode_support: MockModeSupport,
    price: Decimal,
    leverage: u32,
    wallet_balance: Decimal,
    legs: HashMap<LegKey, MockLeg>,
    orders: Vec<FuturesOrderRequest>,
    /// 작업별 예정된 호출 결과 (`None`은 정상 처리)
    failures: HashMap<MockOperation, VecDeque<Option<ProviderError>>>,
    calls: HashMap<MockOperation, u32>,
    next_order_id: u64,
    /// 주문은 처리하되 응답 대신 반환할 에러
    lost_order_response: Option<ProviderError>,
}

impl MockState {
    /// 호출 기록 후 주입된 에러가 있으면 반환.
    fn enter(&mut self, op: MockOperation) -> Result<(), ProviderError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(|queue| queue.pop_front()) {
            Some(Some(error)) => Err(error),
            _ => Ok(()),
        }
    }

    fn unrealized_pnl(&self) -> Decimal {
        self.legs
            .iter()
            .map(|((_, tag), leg)| {
                let signed = match tag {
                    Some(PositionTag::Short) => -leg.size,
                    _ => leg.size,
                };
                (self.price - leg.entry_price) * signed
            })
            .sum()
    }

    fn liquidation_price(&self, side: PositionSide, entry_price: Decimal) -> Decimal {
        let margin = Decimal::ONE / Decimal::from(self.leverage.max(1));
        match side {
            PositionSide::Long => entry_price * (Decimal::ONE - margin),
            PositionSide::Short => entry_price * (Decimal::ONE + margin),
            PositionSide::None => Decimal::ZERO,
        }
    }

    fn position_record(&self, symbol: &str, tag: Option<PositionTag>, leg: &MockLeg) -> ExchangePosition {
        let signed = match tag {
            Some(PositionTag::Short) => -leg.size.abs(),
            Some(PositionTag::Long) => leg.size.abs(),
            None => leg.size,
        };
        let side = if signed > Decimal::ZERO {
            PositionSide::Long
        } else if signed < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::None
        };

        ExchangePosition {
            symbol: format!("{}:USDT", normalize_symbol(symbol)),
            position_amt: Some(signed),
            contracts: Some(signed.abs()),
            side: match side {
                PositionSide::Long => Some("long".to_string()),
                PositionSide::Short => Some("short".to_string()),
                PositionSide::None => None,
            },
            position_side: Some(tag.map(|t| t.as_str()).unwrap_or("BOTH").to_string()),
            entry_price: Some(leg.entry_price),
            unrealized_pnl: Some((self.price - leg.entry_price) * signed),
            leverage: Some(Decimal::from(self.leverage)),
            liquidation_price: Some(self.liquidation_price(side, leg.entry_price)),
            mark_price: Some(self.price),
        }
    }

    /// 시장가 주문 체결.
    fn fill_market(&mut self, request: &FuturesOrderRequest) -> Result<(), ProviderError> {
        let key_symbol = to_exchange_symbol(&request.symbol);
        let price = self.price;
        let quantity = request.quantity;

        match self.mode {
            PositionMode::OneWay => {
                if request.position_side.is_some() {
                    return Err(ProviderError::Api(
                        "-4061 Order's position side does not match user's setting.".to_string(),
                    ));
                }
                let leg = self.legs.entry((key_symbol, None)).or_default();
                let delta = match request.side {
                    OrderSide::Buy => quantity,
                    OrderSide::Sell => -quantity,
                };

                if request.reduce_only {
                    let reduces = !leg.size.is_zero()
                        && (leg.size.is_sign_positive() != delta.is_sign_positive());
                    if !reduces || quantity > leg.size.abs() {
                        return Err(ProviderError::Api(
                            "-2022 ReduceOnly Order is rejected.".to_string(),
                        ));
                    }
                }

                let old = leg.size;
                let new = old + delta;
                leg.entry_price = if new.is_zero() {
                    Decimal::ZERO
                } else if old.is_zero() || old.is_sign_positive() == delta.is_sign_positive() {
                    (old.abs() * leg.entry_price + quantity * price) / new.abs()
                } else if old.is_sign_positive() != new.is_sign_positive() {
                    // 반대 방향으로 넘어가면 새 진입가
                    price
                } else {
                    leg.entry_price
                };
                leg.size = new;
            }
            PositionMode::Hedge => {
                let tag = request.position_side.ok_or_else(|| {
                    ProviderError::Api(
                        "-4061 Order's position side does not match user's setting.".to_string(),
                    )
                })?;
                let leg = self.legs.entry((key_symbol, Some(tag))).or_default();
                let opening = matches!(
                    (tag, request.side),
                    (PositionTag::Long, OrderSide::Buy) | (PositionTag::Short, OrderSide::Sell)
                );

                if opening {
                    let new = leg.size + quantity;
                    leg.entry_price = (leg.size * leg.entry_price + quantity * price) / new;
                    leg.size = new;
                } else {
                    if quantity > leg.size {
                        return Err(ProviderError::Api(
                            "-2022 ReduceOnly Order is rejected.".to_string(),
                        ));
                    }
                    leg.size -= quantity;
                    if leg.size.is_zero() {
                        leg.entry_price = Decimal::ZERO;
                    }
                }
            }
        }
        Ok(())
    }
}

/// 인메모리 선물 거래소.
#[derive(Debug)]
pub struct MockFuturesExchange {
    state: RwLock<MockState>,
}

impl MockFuturesExchange {
    /// 새 Mock 거래소 생성 (가격 50,000 / 잔고 10,000 USDT / 레버리지 10).
    pub fn new(mode: PositionMode) -> Self {
        Self {
            state: RwLock::new(MockState {
                mode,
                mode_support: MockModeSupport::Standard,
                price: dec!(50000),
                leverage: 10,
                wallet_balance: dec!(10000),
                legs: HashMap::new(),
                orders: Vec::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                next_order_id: 1,
                lost_order_response: None,
            }),
        }
    }

    /// 단방향 모드 거래소.
    pub fn one_way() -> Self {
        Self::new(PositionMode::OneWay)
    }

    /// 헤지 모드 거래소.
    pub fn hedge() -> Self {
        Self::new(PositionMode::Hedge)
    }

    /// 가격 설정 (빌더 패턴).
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.state.get_mut().price = price;
        self
    }

    /// 지갑 잔고 설정 (빌더 패턴).
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.state.get_mut().wallet_balance = balance;
        self
    }

    /// 포지션 모드 조회 지원 수준 설정 (빌더 패턴).
    pub fn with_mode_support(mut self, support: MockModeSupport) -> Self {
        self.state.get_mut().mode_support = support;
        self
    }

    /// 포지션 직접 설정.
    ///
    /// 단방향 모드에서는 심볼 포지션을 대체하고, 헤지 모드에서는 해당 레그를 설정합니다.
    pub async fn set_position(
        &self,
        symbol: &str,
        side: PositionSide,
        size: Decimal,
        entry_price: Decimal,
    ) {
        let mut state = self.state.write().await;
        let key_symbol = to_exchange_symbol(symbol);
        match state.mode {
            PositionMode::OneWay => {
                let signed = match side {
                    PositionSide::Long => size.abs(),
                    PositionSide::Short => -size.abs(),
                    PositionSide::None => Decimal::ZERO,
                };
                state.legs.insert(
                    (key_symbol, None),
                    MockLeg {
                        size: signed,
                        entry_price,
                    },
                );
            }
            PositionMode::Hedge => {
                if let Some(tag) = PositionTag::for_side(side) {
                    state.legs.insert(
                        (key_symbol, Some(tag)),
                        MockLeg {
                            size: size.abs(),
                            entry_price,
                        },
                    );
                }
            }
        }
    }

    /// 현재 가격 변경.
    pub async fn set_price(&self, price: Decimal) {
        self.state.write().await.price = price;
    }

    /// 다음 호출 1회에 에러 주입.
    pub async fn fail_next(&self, op: MockOperation, error: ProviderError) {
        self.fail_times(op, error, 1).await;
    }

    /// 다음 호출 `times`회에 같은 에러 주입.
    pub async fn fail_times(&self, op: MockOperation, error: ProviderError, times: usize) {
        let mut state = self.state.write().await;
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(Some(error.clone()));
        }
    }

    /// 지금부터 `nth`번째 호출 (1부터)에만 에러 주입.
    ///
    /// 반전 주문에서 청산은 성공하고 재진입만 실패하는 상황을 만들 때 사용합니다.
    pub async fn fail_nth(&self, op: MockOperation, nth: usize, error: ProviderError) {
        let mut state = self.state.write().await;
        let queue = state.failures.entry(op).or_default();
        for _ in 1..nth {
            queue.push_back(None);
        }
        queue.push_back(Some(error));
    }

    /// 다음 주문은 체결하되 응답이 유실된 것처럼 `error`를 반환.
    ///
    /// 거래소가 주문을 받은 뒤 타임아웃이 난 상황을 재현합니다.
    pub async fn lose_next_order_response(&self, error: ProviderError) {
        self.state.write().await.lost_order_response = Some(error);
    }

    /// 제출된 주문 목록 (제출 순서).
    pub async fn orders(&self) -> Vec<FuturesOrderRequest> {
        self.state.read().await.orders.clone()
    }

    /// 작업 호출 횟수 (에러로 끝난 호출 포함).
    pub async fn call_count(&self, op: MockOperation) -> u32 {
        self.state.read().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// 현재 레버리지.
    pub async fn leverage(&self) -> u32 {
        self.state.read().await.leverage
    }

    /// 계정 포지션 모드.
    pub async fn position_mode(&self) -> PositionMode {
        self.state.read().await.mode
    }
}

#[async_trait]
impl FuturesExchangeProvider for MockFuturesExchange {
    fn exchange_name(&self) -> &str {
        "mock"
    }

    async fn fetch_positions(&self, symbol: &str) -> Result<Vec<ExchangePosition>, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::FetchPositions)?;

        let key_symbol = to_exchange_symbol(symbol);
        let tags: Vec<Option<PositionTag>> = match state.mode {
            PositionMode::OneWay => vec![None],
            PositionMode::Hedge => vec![Some(PositionTag::Long), Some(PositionTag::Short)],
        };

        // 실제 거래소처럼 수량 0인 레그도 반환
        Ok(tags
            .into_iter()
            .map(|tag| {
                let leg = state
                    .legs
                    .get(&(key_symbol.clone(), tag))
                    .cloned()
                    .unwrap_or_default();
                state.position_record(symbol, tag, &leg)
            })
            .collect())
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::SetLeverage)?;
        if leverage == 0 || leverage > 125 {
            return Err(ProviderError::Api(format!(
                "-4028 Leverage {} is not valid",
                leverage
            )));
        }
        state.leverage = leverage;
        Ok(())
    }

    async fn place_order(&self, request: &FuturesOrderRequest) -> Result<OrderAck, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::PlaceOrder)?;

        if request.quantity <= Decimal::ZERO {
            return Err(ProviderError::Api(
                "-4003 Quantity less than or equal to zero.".to_string(),
            ));
        }

        let conditional = request.order_type.is_conditional();
        if conditional {
            if request.stop_price.is_none() {
                return Err(ProviderError::Api(
                    "-1102 Mandatory parameter 'stopPrice' was not sent.".to_string(),
                ));
            }
        } else {
            state.fill_market(request)?;
        }

        let order_id = state.next_order_id;
        state.next_order_id += 1;
        state.orders.push(request.clone());

        if let Some(error) = state.lost_order_response.take() {
            return Err(error);
        }

        debug!(
            order_id,
            side = %request.side,
            order_type = request.order_type.as_str(),
            quantity = %request.quantity,
            "Mock 주문 처리"
        );

        Ok(OrderAck {
            order_id: format!("mock-{}", order_id),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            filled: Some(if conditional {
                Decimal::ZERO
            } else {
                request.quantity
            }),
            average_price: (!conditional).then_some(state.price),
            status: if conditional { "NEW" } else { "FILLED" }.to_string(),
        })
    }

    async fn fetch_balance(&self, asset: &str) -> Result<AccountBalance, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::FetchBalance)?;

        let unrealized_pnl = state.unrealized_pnl();
        let notional: Decimal = state
            .legs
            .values()
            .map(|leg| leg.size.abs() * leg.entry_price)
            .sum();
        let used = notional / Decimal::from(state.leverage.max(1));
        let total = state.wallet_balance + unrealized_pnl;

        Ok(AccountBalance {
            asset: asset.to_uppercase(),
            total,
            free: (total - used).max(Decimal::ZERO),
            used,
            unrealized_pnl,
        })
    }

    async fn fetch_last_price(&self, _symbol: &str) -> Result<Decimal, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::FetchLastPrice)?;
        Ok(state.price)
    }

    async fn fetch_position_mode(&self) -> Result<PositionMode, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::FetchPositionMode)?;
        match state.mode_support {
            MockModeSupport::Standard => Ok(state.mode),
            _ => Err(ProviderError::Unsupported("mock: fetch_position_mode".to_string())),
        }
    }

    async fn fetch_account_settings(&self) -> Result<serde_json::Value, ProviderError> {
        let mut state = self.state.write().await;
        state.enter(MockOperation::FetchAccountSettings)?;
        match state.mode_support {
            MockModeSupport::Unavailable => Err(ProviderError::Api(
                "-1000 An unknown error occurred while processing the request.".to_string(),
            )),
            _ => Ok(serde_json::json!({
                "dualSidePosition": state.mode == PositionMode::Hedge
            })),
        }
    }
}
