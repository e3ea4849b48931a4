//! 실행 엔진.
//!
//! 매매 시그널과 거래소의 현재 포지션을 대조해 주문 순서를 결정하고 제출합니다.
//!
//! # 실행 흐름
//!
//! ```text
//! 스냅샷 재조회 → plan_execution → (테스트 모드: 모의 결과)
//!   → 포지션 모드 → 주문 순차 제출 (사이 settle_delay)
//!   → 손절/익절 (stop_order_delay 후) → requery_delay 후 스냅샷 재조회 → 이력 추가
//! ```
//!
//! 청산 후 재진입은 트랜잭션이 아닙니다. 청산만 성공하면 `Partial` 결과를 반환하며
//! 청산을 되돌리지 않습니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use trader_core::{
    AccountInfo, FuturesExchangeProvider, FuturesOrderRequest, OrderAck, PositionMode,
    PositionSnapshot, TradeAction, TradeSignal,
};
use trader_exchange::{with_retry, ExchangeError};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use crate::history::TradeHistory;
use crate::plan::{plan_execution, ExecutionPlan};
use crate::position::fetch_position_snapshot;
use crate::position_mode::PositionModeResolver;
use crate::result::{ExecutionResult, ExecutionStatus, PartialExecution};
use crate::stop_orders::StopOrderManager;
use crate::summary::{format_position_summary, format_summary_unavailable};

/// 거래소 중복 주문 방지용 클라이언트 주문 ID.
///
/// 재시도로 같은 주문이 두 번 접수되면 거래소가 두 번째를 거부합니다.
/// 주문 1회 제출.
///
/// 주문은 재시도하지 않습니다. 응답이 유실된 주문도 거래소에서는 체결됐을 수 있고,
/// 체결된 시장가 주문은 같은 client order id로 다시 제출해도 거부되지 않습니다.
pub(crate) async fn submit_order_once(
    provider: &dyn FuturesExchangeProvider,
    order: &FuturesOrderRequest,
) -> Result<OrderAck, ExchangeError> {
    provider.place_order(order).await.map_err(|e| {
        if e.is_transient() {
            warn!(
                symbol = %order.symbol,
                client_order_id = order.client_order_id.as_deref().unwrap_or("-"),
                error = %e,
                "주문 응답 불확실, 재제출하지 않음"
            );
        }
        ExchangeError::from(e)
    })
}

pub(crate) fn new_client_order_id() -> String {
    format!("tr{}", Uuid::new_v4().simple())
}

/// 실행 엔진.
///
/// 포지션 모드와 거래 이력을 소유하므로 심볼/계정당 하나의 인스턴스를 사용합니다.
/// 실행 메서드가 `&mut self`를 받아 사이클이 순차적으로 처리됩니다.
pub struct ExecutionReconciler {
    /// 선물 거래소 제공자
    provider: Arc<dyn FuturesExchangeProvider>,
    /// 실행 설정
    config: ExecutionConfig,
    /// 메모이즈된 포지션 모드
    mode_resolver: PositionModeResolver,
    /// 거래 이력
    history: TradeHistory,
    /// 손절/익절 관리자
    stop_manager: StopOrderManager,
}

impl ExecutionReconciler {
    pub fn new(provider: Arc<dyn FuturesExchangeProvider>, config: ExecutionConfig) -> Self {
        let stop_manager = StopOrderManager::new(provider.clone(), config.retry.clone());
        Self {
            mode_resolver: PositionModeResolver::new(config.position_mode),
            provider,
            config,
            history: TradeHistory::new(),
            stop_manager,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn exchange_name(&self) -> &str {
        self.provider.exchange_name()
    }

    /// 실행 준비: 포지션 모드 감지, 레버리지 설정, 가용 잔고 로그.
    ///
    /// 계정의 포지션 모드는 변경하지 않습니다. 잔고 조회 실패는 경고만 남깁니다.
    pub async fn setup(&mut self, symbol: &str, leverage: u32) -> Result<PositionMode, ExecutionError> {
        let mode = self.position_mode().await;

        let provider = self.provider.as_ref();
        with_retry(&self.config.retry, "set_leverage", || {
            provider.set_leverage(symbol, leverage)
        })
        .await?;

        let asset = self.config.quote_asset.as_str();
        match with_retry(&self.config.retry, "fetch_balance", || provider.fetch_balance(asset)).await
        {
            Ok(balance) => info!(
                symbol,
                leverage,
                mode = %mode,
                free = %balance.free,
                asset,
                test_mode = self.config.test_mode,
                "실행 엔진 준비 완료"
            ),
            Err(e) => warn!(symbol, error = %e, "잔고 조회 실패"),
        }

        Ok(mode)
    }

    /// 포지션 모드 (첫 호출에만 거래소 조회).
    pub async fn position_mode(&mut self) -> PositionMode {
        self.mode_resolver.resolve(self.provider.as_ref()).await
    }

    /// 현재 포지션 스냅샷. 포지션이 없으면 `None`.
    pub async fn current_position(
        &self,
        symbol: &str,
    ) -> Result<Option<PositionSnapshot>, ExecutionError> {
        Ok(fetch_position_snapshot(self.provider.as_ref(), symbol, &self.config.retry).await?)
    }

    /// 시그널 실행.
    pub async fn execute(
        &mut self,
        symbol: &str,
        signal: &TradeSignal,
        amount: Decimal,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.execute_action(
            symbol,
            signal.action,
            amount,
            signal.stop_loss,
            signal.take_profit,
            Some(signal.rationale.clone()),
        )
        .await
    }

    /// 액션 문자열 실행. 지원하지 않는 문자열은 설정 오류.
    pub async fn execute_raw(
        &mut self,
        symbol: &str,
        action: &str,
        amount: Decimal,
    ) -> Result<ExecutionResult, ExecutionError> {
        let action: TradeAction = action.parse()?;
        self.execute_action(symbol, action, amount, None, None, None)
            .await
    }

    /// 현재 포지션 전량 청산. 포지션이 없으면 `Info` 결과.
    pub async fn close_position(&mut self, symbol: &str) -> Result<ExecutionResult, ExecutionError> {
        self.execute_action(symbol, TradeAction::Close, Decimal::ZERO, None, None, None)
            .await
    }

    /// 액션 실행.
    ///
    /// 중복 진입 거부, 관망, 주문 실패는 `Ok(ExecutionResult)`로 보고합니다.
    /// `Err`는 스냅샷 조회 실패나 설정 오류처럼 사이클을 중단해야 하는 경우에만 반환합니다.
    pub async fn execute_action(
        &mut self,
        symbol: &str,
        action: TradeAction,
        amount: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        rationale: Option<String>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let test_mode = self.config.test_mode;
        let current = self.current_position(symbol).await?;
        let plan = plan_execution(current.as_ref(), action);

        info!(
            symbol,
            action = %action,
            current_side = %current.as_ref().map(|p| p.side.to_string()).unwrap_or_else(|| "NONE".to_string()),
            current_size = %current.as_ref().map(|p| p.size).unwrap_or_default(),
            %amount,
            test_mode,
            "시그널 실행"
        );

        let mut result =
            ExecutionResult::new(action, symbol, amount, test_mode).with_rationale(rationale);

        match &plan {
            ExecutionPlan::NoAction => {
                result.new_position = current;
                return Ok(result.with_status(ExecutionStatus::NoAction, "관망: 주문 없음"));
            }
            ExecutionPlan::NothingToClose => {
                return Ok(result.with_status(ExecutionStatus::Info, "청산할 포지션 없음"));
            }
            ExecutionPlan::Reject(reason) => {
                warn!(symbol, action = %action, reason = %reason.message(), "주문 거부");
                result.new_position = current;
                return Ok(result.with_status(ExecutionStatus::Rejected, reason.message()));
            }
            _ => {}
        }

        if plan.entry_side().is_some() && amount <= Decimal::ZERO {
            return Err(ExecutionError::Configuration(format!(
                "진입 수량은 0보다 커야 함: {}",
                amount
            )));
        }

        let mode = self.position_mode().await;
        let orders = plan.orders(symbol, amount, mode);

        if test_mode {
            let result = self.simulate(result, &plan, orders, amount);
            self.history.append(result.clone());
            return Ok(result);
        }

        let mut result = self.submit_orders(result, &plan, orders).await;

        // 손절/익절은 진입이 성공한 경우에만
        if result.status == ExecutionStatus::Executed
            && plan.entry_side().is_some()
            && (stop_loss.is_some() || take_profit.is_some())
        {
            tokio::time::sleep(self.config.stop_order_delay).await;
            result.stop_orders = self
                .stop_manager
                .attach_stops(symbol, mode, stop_loss, take_profit)
                .await;
        }

        if result.changed_position() {
            tokio::time::sleep(self.config.requery_delay).await;
            match self.current_position(symbol).await {
                Ok(position) => result.new_position = position,
                Err(e) => {
                    warn!(symbol, error = %e, "주문 후 포지션 재조회 실패");
                    result.message = format!("{} (포지션 재조회 실패: {})", result.message, e);
                }
            }
            self.history.append(result.clone());
        } else {
            result.new_position = current;
        }

        Ok(result)
    }

    /// 주문 순차 제출.
    ///
    /// 첫 주문이 실패하면 `Failed`, 이후 주문이 실패하면 `Partial`.
    async fn submit_orders(
        &self,
        mut result: ExecutionResult,
        plan: &ExecutionPlan,
        orders: Vec<FuturesOrderRequest>,
    ) -> ExecutionResult {
        result.planned_orders = orders.clone();
        let provider = self.provider.as_ref();

        for (index, order) in orders.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.settle_delay).await;
            }

            let order = order.with_client_order_id(new_client_order_id());
            match submit_order_once(provider, &order).await {
                Ok(ack) => {
                    info!(
                        symbol = %ack.symbol,
                        order_id = %ack.order_id,
                        side = %ack.side,
                        quantity = %ack.quantity,
                        reduce_only = order.reduce_only,
                        position_side = order.position_side.map(|t| t.as_str()).unwrap_or("-"),
                        "주문 체결"
                    );
                    result.order_id = Some(ack.order_id.clone());
                    result.filled = ack.filled;
                    result.average_price = ack.average_price;
                    result.orders.push(ack);
                }
                Err(e) => {
                    error!(
                        symbol = %order.symbol,
                        side = %order.side,
                        quantity = %order.quantity,
                        error = %e,
                        "주문 실패"
                    );
                    if e.provider_error().is_transient() {
                        result.outcome_uncertain = true;
                    }
                    return match result.orders.last().cloned() {
                        Some(closed) => {
                            let message = format!(
                                "부분 실행: 청산 완료 (주문 {}), 신규 진입 실패: {}",
                                closed.order_id, e
                            );
                            result.partial = Some(PartialExecution {
                                closed,
                                failed_order: order,
                                error: e.to_string(),
                            });
                            result.with_status(ExecutionStatus::Partial, message)
                        }
                        None => result.with_status(
                            ExecutionStatus::Failed,
                            format!("주문 실행 실패: {}", e),
                        ),
                    };
                }
            }
        }

        let message = plan_message(plan);
        info!(message = %message, orders = result.orders.len(), "실행 완료");
        result.with_status(ExecutionStatus::Executed, message)
    }

    /// 테스트 모드 모의 결과. 주문은 제출하지 않습니다.
    fn simulate(
        &self,
        mut result: ExecutionResult,
        plan: &ExecutionPlan,
        orders: Vec<FuturesOrderRequest>,
        amount: Decimal,
    ) -> ExecutionResult {
        info!(
            symbol = %result.symbol,
            orders = orders.len(),
            "테스트 모드: 주문 제출 생략"
        );
        result.new_position = plan.entry_side().map(|side| {
            let mut position = PositionSnapshot::from_signed_size(result.symbol.clone(), amount);
            position.side = side;
            position
        });
        result.filled = plan.entry_side().map(|_| amount);
        result.planned_orders = orders;
        let message = format!("[테스트 모드] {}", plan_message(plan));
        result.with_status(ExecutionStatus::Simulated, message)
    }

    /// 계정 요약 정보.
    pub async fn account_info(&self) -> Result<AccountInfo, ExecutionError> {
        let provider = self.provider.as_ref();
        let asset = self.config.quote_asset.as_str();
        let balance =
            with_retry(&self.config.retry, "fetch_balance", || provider.fetch_balance(asset)).await?;
        Ok(balance.into())
    }

    /// 트레이더 단계용 계정/포지션 요약. 조회 실패 시에도 안내 문구를 반환합니다.
    pub async fn position_summary(&self, symbol: &str) -> String {
        let provider = self.provider.as_ref();
        let asset = self.config.quote_asset.as_str();

        let balance =
            match with_retry(&self.config.retry, "fetch_balance", || provider.fetch_balance(asset))
                .await
            {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(symbol, error = %e, "요약용 잔고 조회 실패");
                    return format_summary_unavailable(symbol, &e.to_string());
                }
            };

        let position = match self.current_position(symbol).await {
            Ok(position) => position,
            Err(e) => {
                warn!(symbol, error = %e, "요약용 포지션 조회 실패");
                return format_summary_unavailable(symbol, &e.to_string());
            }
        };

        let price = match &position {
            Some(_) => provider.fetch_last_price(symbol).await.unwrap_or_else(|e| {
                warn!(symbol, error = %e, "현재가 조회 실패, 진입가 사용");
                Decimal::ZERO
            }),
            None => Decimal::ZERO,
        };

        format_position_summary(symbol, &balance, position.as_ref(), price)
    }

    /// 거래 이력 (추가 순서).
    pub fn history(&self) -> &[ExecutionResult] {
        self.history.records()
    }
}

fn plan_message(plan: &ExecutionPlan) -> String {
    match plan {
        ExecutionPlan::Open { side } => format!("{} 포지션 진입", side),
        ExecutionPlan::Close { side, quantity } => {
            format!("{} 포지션 {} 전량 청산", side, quantity.normalize())
        }
        ExecutionPlan::Reverse { from, close_quantity } => format!(
            "{} 포지션 {} 청산 후 {} 진입",
            from,
            close_quantity.normalize(),
            from.opposite()
        ),
        ExecutionPlan::NoAction => "관망: 주문 없음".to_string(),
        ExecutionPlan::NothingToClose => "청산할 포지션 없음".to_string(),
        ExecutionPlan::Reject(reason) => reason.message(),
    }
}
