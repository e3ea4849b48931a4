//! 손절/익절 조건부 주문.
//!
//! 진입 성공 후에만 호출되며, 스냅샷을 다시 읽어 방향과 수량을 결정합니다.
//! 실패해도 진입을 되돌리지 않고 보고서에 기록만 합니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trader_core::{
    FuturesExchangeProvider, FuturesOrderRequest, FuturesOrderType, OrderSide, PositionMode,
    PositionSide, PositionSnapshot, PositionTag,
};
use trader_exchange::RetryConfig;

use crate::position::fetch_position_snapshot;
use crate::reconciler::{new_client_order_id, submit_order_once};

/// 조건부 주문 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    StopLoss,
    TakeProfit,
}

impl StopKind {
    fn order_type(&self) -> FuturesOrderType {
        match self {
            StopKind::StopLoss => FuturesOrderType::StopMarket,
            StopKind::TakeProfit => FuturesOrderType::TakeProfitMarket,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            StopKind::StopLoss => "손절",
            StopKind::TakeProfit => "익절",
        }
    }
}

/// 접수된 조건부 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedStopOrder {
    pub kind: StopKind,
    pub order_id: String,
    pub stop_price: Decimal,
    pub quantity: Decimal,
}

/// 손절/익절 주문 보고서.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopOrderReport {
    pub placed: Vec<PlacedStopOrder>,
    pub failures: Vec<String>,
}

impl StopOrderReport {
    /// 모든 요청 주문이 접수되었는지 여부.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 손절/익절 주문 관리자.
pub struct StopOrderManager {
    provider: Arc<dyn FuturesExchangeProvider>,
    retry: RetryConfig,
}

impl StopOrderManager {
    pub fn new(provider: Arc<dyn FuturesExchangeProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    /// 현재 포지션에 손절/익절 주문 부착.
    ///
    /// 두 가격 모두 없으면 `None`을 반환하고 거래소를 호출하지 않습니다.
    pub async fn attach_stops(
        &self,
        symbol: &str,
        mode: PositionMode,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Option<StopOrderReport> {
        if stop_loss.is_none() && take_profit.is_none() {
            return None;
        }

        let mut report = StopOrderReport::default();
        let snapshot =
            match fetch_position_snapshot(self.provider.as_ref(), symbol, &self.retry).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    report
                        .failures
                        .push("포지션이 없어 손절/익절을 설정하지 않음".to_string());
                    return Some(report);
                }
                Err(e) => {
                    report.failures.push(format!("포지션 조회 실패: {}", e));
                    return Some(report);
                }
            };

        let requests = [
            (StopKind::StopLoss, stop_loss),
            (StopKind::TakeProfit, take_profit),
        ];
        for (kind, price) in requests {
            let Some(price) = price else { continue };

            if let Err(reason) = validate_stop_price(kind, &snapshot, price) {
                warn!(symbol, kind = kind.label(), %price, reason = %reason, "조건부 주문 건너뜀");
                report.failures.push(reason);
                continue;
            }

            let Some(order) = build_stop_order(kind, &snapshot, mode, price) else {
                continue;
            };

            match submit_order_once(self.provider.as_ref(), &order).await {
                Ok(ack) => {
                    info!(
                        symbol,
                        kind = kind.label(),
                        %price,
                        order_id = %ack.order_id,
                        "조건부 주문 설정"
                    );
                    report.placed.push(PlacedStopOrder {
                        kind,
                        order_id: ack.order_id,
                        stop_price: price,
                        quantity: snapshot.size,
                    });
                }
                Err(e) => {
                    warn!(symbol, kind = kind.label(), error = %e, "조건부 주문 실패");
                    report
                        .failures
                        .push(format!("{} 주문 실패: {}", kind.label(), e));
                }
            }
        }

        Some(report)
    }
}

/// 진입가 기준 손절/익절 가격 방향 검증.
///
/// 롱: 손절 < 진입가 < 익절, 숏: 익절 < 진입가 < 손절.
/// 진입가를 모르면 (0) 양수인지만 검사합니다.
fn validate_stop_price(
    kind: StopKind,
    snapshot: &PositionSnapshot,
    price: Decimal,
) -> Result<(), String> {
    if price <= Decimal::ZERO {
        return Err(format!("{} 가격은 0보다 커야 함: {}", kind.label(), price));
    }
    let entry = snapshot.entry_price;
    if entry.is_zero() {
        return Ok(());
    }

    let below_entry = price < entry;
    let valid = match (snapshot.side, kind) {
        (PositionSide::Long, StopKind::StopLoss) | (PositionSide::Short, StopKind::TakeProfit) => {
            below_entry
        }
        (PositionSide::Long, StopKind::TakeProfit) | (PositionSide::Short, StopKind::StopLoss) => {
            price > entry
        }
        (PositionSide::None, _) => false,
    };

    if valid {
        Ok(())
    } else {
        Err(format!(
            "{} {} 가격 {}이(가) 진입가 {} 기준으로 잘못된 방향",
            snapshot.side,
            kind.label(),
            price,
            entry
        ))
    }
}

fn build_stop_order(
    kind: StopKind,
    snapshot: &PositionSnapshot,
    mode: PositionMode,
    price: Decimal,
) -> Option<FuturesOrderRequest> {
    let order = FuturesOrderRequest::conditional(
        snapshot.symbol.clone(),
        OrderSide::closing(snapshot.side)?,
        kind.order_type(),
        snapshot.size,
        price,
    )
    .with_client_order_id(new_client_order_id());

    Some(match mode {
        PositionMode::Hedge => order.with_position_side(PositionTag::for_side(snapshot.side)?),
        PositionMode::OneWay => order.reduce_only(),
    })
}
