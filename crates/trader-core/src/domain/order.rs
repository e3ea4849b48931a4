//! 선물 주문 요청/응답 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PositionSide;

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 해당 방향 포지션을 여는 주문 방향.
    pub fn opening(side: PositionSide) -> Option<Self> {
        match side {
            PositionSide::Long => Some(OrderSide::Buy),
            PositionSide::Short => Some(OrderSide::Sell),
            PositionSide::None => None,
        }
    }

    /// 해당 방향 포지션을 닫는 주문 방향.
    pub fn closing(side: PositionSide) -> Option<Self> {
        Self::opening(side).map(|s| s.opposite())
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// 거래소 API 표기.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 헤지 모드 레그 태그 (`positionSide`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionTag {
    Long,
    Short,
}

impl PositionTag {
    /// 포지션 방향에 대응하는 태그.
    pub fn for_side(side: PositionSide) -> Option<Self> {
        match side {
            PositionSide::Long => Some(PositionTag::Long),
            PositionSide::Short => Some(PositionTag::Short),
            PositionSide::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionTag::Long => "LONG",
            PositionTag::Short => "SHORT",
        }
    }
}

/// 선물 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuturesOrderType {
    /// 시장가
    Market,
    /// 손절 (조건부 시장가)
    StopMarket,
    /// 익절 (조건부 시장가)
    TakeProfitMarket,
}

impl FuturesOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuturesOrderType::Market => "MARKET",
            FuturesOrderType::StopMarket => "STOP_MARKET",
            FuturesOrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }

    /// 트리거 가격이 필요한 조건부 주문인지 여부.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, FuturesOrderType::Market)
    }
}

/// 선물 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesOrderRequest {
    /// 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: OrderSide,
    /// 주문 유형
    pub order_type: FuturesOrderType,
    /// 수량
    pub quantity: Decimal,
    /// 트리거 가격 (조건부 주문 전용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// 헤지 모드 레그 태그 (단방향 모드에서는 `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_side: Option<PositionTag>,
    /// 감소 전용 (단방향 모드 청산 주문)
    #[serde(default)]
    pub reduce_only: bool,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl FuturesOrderRequest {
    /// 시장가 주문 생성.
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: FuturesOrderType::Market,
            quantity,
            stop_price: None,
            position_side: None,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// 조건부 시장가 주문 생성 (STOP_MARKET / TAKE_PROFIT_MARKET).
    pub fn conditional(
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: FuturesOrderType,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        Self {
            order_type,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// 헤지 모드 레그 태그 설정.
    pub fn with_position_side(mut self, tag: PositionTag) -> Self {
        self.position_side = Some(tag);
        self
    }

    /// 감소 전용 설정.
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// 클라이언트 주문 ID 설정.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// 주문 접수 응답.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: OrderSide,
    /// 주문 유형
    pub order_type: FuturesOrderType,
    /// 요청 수량
    pub quantity: Decimal,
    /// 체결 수량
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled: Option<Decimal>,
    /// 평균 체결가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<Decimal>,
    /// 거래소 주문 상태 (예: `NEW`, `FILLED`)
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opening_and_closing_sides() {
        assert_eq!(OrderSide::opening(PositionSide::Long), Some(OrderSide::Buy));
        assert_eq!(OrderSide::closing(PositionSide::Long), Some(OrderSide::Sell));
        assert_eq!(OrderSide::closing(PositionSide::Short), Some(OrderSide::Buy));
        assert_eq!(OrderSide::opening(PositionSide::None), None);
    }

    #[test]
    fn test_order_builder() {
        let order = FuturesOrderRequest::market("BTC/USDT", OrderSide::Sell, dec!(0.5))
            .with_position_side(PositionTag::Long)
            .reduce_only();
        assert_eq!(order.order_type, FuturesOrderType::Market);
        assert_eq!(order.position_side, Some(PositionTag::Long));
        assert!(order.reduce_only);
        assert!(order.stop_price.is_none());

        let stop = FuturesOrderRequest::conditional(
            "BTC/USDT",
            OrderSide::Sell,
            FuturesOrderType::StopMarket,
            dec!(0.5),
            dec!(60000),
        );
        assert!(stop.order_type.is_conditional());
        assert_eq!(stop.stop_price, Some(dec!(60000)));
    }
}
