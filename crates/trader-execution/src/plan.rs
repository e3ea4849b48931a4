//! 주문 계획.
//!
//! (현재 포지션 방향 × 매매 액션) → 실행할 작업을 결정하는 순수 함수입니다.
//! 실거래와 테스트 모드가 같은 계획을 사용하므로 분기 선택과 중복 진입 방지 규칙이
//! 두 모드에서 동일합니다.
//!
//! | 현재 \ 액션 | BUY            | SELL           | CLOSE     | HOLD   |
//! |-------------|----------------|----------------|-----------|--------|
//! | NONE        | 롱 진입        | 숏 진입        | 정보 응답 | 무동작 |
//! | LONG        | 거부 (중복)    | 청산 후 숏     | 롱 청산   | 무동작 |
//! | SHORT       | 청산 후 롱     | 거부 (중복)    | 숏 청산   | 무동작 |
//!
//! UNKNOWN은 현재 포지션과 무관하게 거부합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{
    FuturesOrderRequest, OrderSide, PositionMode, PositionSide, PositionSnapshot, PositionTag,
    TradeAction,
};

/// 거부 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// 같은 방향 포지션이 이미 있음
    DuplicateEntry(PositionSide),
    /// 인식할 수 없는 액션
    UnrecognizedAction,
}

impl RejectReason {
    pub fn message(&self) -> String {
        match self {
            RejectReason::DuplicateEntry(side) => format!(
                "이미 {} 포지션 보유 중 - 중복 진입 차단 (유지하려면 HOLD, 청산하려면 CLOSE)",
                side
            ),
            RejectReason::UnrecognizedAction => "인식할 수 없는 매매 액션".to_string(),
        }
    }
}

/// 주문 계획.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPlan {
    /// 신규 진입 (수량은 요청 수량)
    Open { side: PositionSide },
    /// 전량 청산 (수량은 스냅샷 수량)
    Close { side: PositionSide, quantity: Decimal },
    /// 전량 청산 후 반대 방향 진입
    Reverse { from: PositionSide, close_quantity: Decimal },
    /// 관망
    NoAction,
    /// 청산할 포지션 없음
    NothingToClose,
    /// 거부
    Reject(RejectReason),
}

/// 현재 포지션과 액션으로 주문 계획 결정.
pub fn plan_execution(current: Option<&PositionSnapshot>, action: TradeAction) -> ExecutionPlan {
    let (side, size) = match current {
        Some(snapshot) if !snapshot.is_flat() => (snapshot.side, snapshot.size),
        _ => (PositionSide::None, Decimal::ZERO),
    };

    match (side, action) {
        (_, TradeAction::Unknown) => ExecutionPlan::Reject(RejectReason::UnrecognizedAction),
        (_, TradeAction::Hold) => ExecutionPlan::NoAction,

        (PositionSide::None, TradeAction::Buy) => ExecutionPlan::Open {
            side: PositionSide::Long,
        },
        (PositionSide::None, TradeAction::Sell) => ExecutionPlan::Open {
            side: PositionSide::Short,
        },
        (PositionSide::None, TradeAction::Close) => ExecutionPlan::NothingToClose,

        (PositionSide::Long, TradeAction::Buy) => {
            ExecutionPlan::Reject(RejectReason::DuplicateEntry(PositionSide::Long))
        }
        (PositionSide::Short, TradeAction::Sell) => {
            ExecutionPlan::Reject(RejectReason::DuplicateEntry(PositionSide::Short))
        }

        (PositionSide::Long, TradeAction::Sell) | (PositionSide::Short, TradeAction::Buy) => {
            ExecutionPlan::Reverse {
                from: side,
                close_quantity: size,
            }
        }
        (PositionSide::Long | PositionSide::Short, TradeAction::Close) => ExecutionPlan::Close {
            side,
            quantity: size,
        },
    }
}

impl ExecutionPlan {
    /// 주문을 제출하는 계획인지 여부.
    pub fn submits_orders(&self) -> bool {
        matches!(
            self,
            ExecutionPlan::Open { .. } | ExecutionPlan::Close { .. } | ExecutionPlan::Reverse { .. }
        )
    }

    /// 계획 실행 후 새로 열리는 포지션 방향.
    pub fn entry_side(&self) -> Option<PositionSide> {
        match self {
            ExecutionPlan::Open { side } => Some(*side),
            ExecutionPlan::Reverse { from, .. } => Some(from.opposite()),
            _ => None,
        }
    }

    /// 제출할 주문 목록 (제출 순서).
    ///
    /// - 헤지 모드: 모든 주문에 `positionSide` 태그
    /// - 단방향 모드: 태그 없음, 청산 주문은 reduce-only
    pub fn orders(
        &self,
        symbol: &str,
        amount: Decimal,
        mode: PositionMode,
    ) -> Vec<FuturesOrderRequest> {
        match self {
            ExecutionPlan::Open { side } => open_order(symbol, *side, amount, mode)
                .into_iter()
                .collect(),
            ExecutionPlan::Close { side, quantity } => close_order(symbol, *side, *quantity, mode)
                .into_iter()
                .collect(),
            ExecutionPlan::Reverse {
                from,
                close_quantity,
            } => close_order(symbol, *from, *close_quantity, mode)
                .into_iter()
                .chain(open_order(symbol, from.opposite(), amount, mode))
                .collect(),
            ExecutionPlan::NoAction | ExecutionPlan::NothingToClose | ExecutionPlan::Reject(_) => {
                Vec::new()
            }
        }
    }
}

fn open_order(
    symbol: &str,
    side: PositionSide,
    amount: Decimal,
    mode: PositionMode,
) -> Option<FuturesOrderRequest> {
    let order = FuturesOrderRequest::market(symbol, OrderSide::opening(side)?, amount);
    Some(match (mode, PositionTag::for_side(side)) {
        (PositionMode::Hedge, Some(tag)) => order.with_position_side(tag),
        _ => order,
    })
}

fn close_order(
    symbol: &str,
    side: PositionSide,
    quantity: Decimal,
    mode: PositionMode,
) -> Option<FuturesOrderRequest> {
    let order = FuturesOrderRequest::market(symbol, OrderSide::closing(side)?, quantity);
    Some(match mode {
        PositionMode::Hedge => order.with_position_side(PositionTag::for_side(side)?),
        PositionMode::OneWay => order.reduce_only(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(side: PositionSide, size: Decimal) -> Option<PositionSnapshot> {
        match side {
            PositionSide::None => None,
            PositionSide::Long => Some(PositionSnapshot::from_signed_size("BTC/USDT", size)),
            PositionSide::Short => Some(PositionSnapshot::from_signed_size("BTC/USDT", -size)),
        }
    }

    #[test]
    fn test_transition_table() {
        use ExecutionPlan::*;
        use PositionSide::{Long, Short};

        let s = dec!(0.5);
        let cases = [
            (PositionSide::None, TradeAction::Buy, Open { side: Long }),
            (PositionSide::None, TradeAction::Sell, Open { side: Short }),
            (PositionSide::None, TradeAction::Hold, NoAction),
            (PositionSide::None, TradeAction::Close, NothingToClose),
            (PositionSide::None, TradeAction::Unknown, Reject(RejectReason::UnrecognizedAction)),
            (Long, TradeAction::Buy, Reject(RejectReason::DuplicateEntry(Long))),
            (Long, TradeAction::Sell, Reverse { from: Long, close_quantity: s }),
            (Long, TradeAction::Hold, NoAction),
            (Long, TradeAction::Close, Close { side: Long, quantity: s }),
            (Long, TradeAction::Unknown, Reject(RejectReason::UnrecognizedAction)),
            (Short, TradeAction::Sell, Reject(RejectReason::DuplicateEntry(Short))),
            (Short, TradeAction::Buy, Reverse { from: Short, close_quantity: s }),
            (Short, TradeAction::Hold, NoAction),
            (Short, TradeAction::Close, Close { side: Short, quantity: s }),
            (Short, TradeAction::Unknown, Reject(RejectReason::UnrecognizedAction)),
        ];

        for (side, action, expected) in cases {
            let current = snapshot(side, s);
            assert_eq!(
                plan_execution(current.as_ref(), action),
                expected,
                "{side} × {action}"
            );
        }
    }

    #[test]
    fn test_flat_snapshot_treated_as_none() {
        let flat = PositionSnapshot::flat("BTC/USDT");
        assert_eq!(
            plan_execution(Some(&flat), TradeAction::Close),
            ExecutionPlan::NothingToClose
        );
    }

    #[test]
    fn test_reverse_orders_one_way() {
        let plan = ExecutionPlan::Reverse {
            from: PositionSide::Long,
            close_quantity: dec!(0.5),
        };
        let orders = plan.orders("BTC/USDT", dec!(0.2), PositionMode::OneWay);

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].quantity, dec!(0.5));
        assert!(orders[0].reduce_only);
        assert_eq!(orders[0].position_side, None);

        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].quantity, dec!(0.2));
        assert!(!orders[1].reduce_only);
    }

    #[test]
    fn test_reverse_orders_hedge_tags() {
        let plan = ExecutionPlan::Reverse {
            from: PositionSide::Short,
            close_quantity: dec!(1),
        };
        let orders = plan.orders("BTC/USDT", dec!(0.3), PositionMode::Hedge);

        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].position_side, Some(PositionTag::Short));
        assert!(!orders[0].reduce_only);
        assert_eq!(orders[1].side, OrderSide::Buy);
        assert_eq!(orders[1].position_side, Some(PositionTag::Long));
    }

    #[test]
    fn test_non_order_plans_are_empty() {
        for plan in [
            ExecutionPlan::NoAction,
            ExecutionPlan::NothingToClose,
            ExecutionPlan::Reject(RejectReason::UnrecognizedAction),
        ] {
            assert!(!plan.submits_orders());
            assert!(plan.orders("BTC/USDT", dec!(1), PositionMode::OneWay).is_empty());
        }
    }
}
