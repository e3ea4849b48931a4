//! Binance 선물 API 응답 타입.
//!
//! Binance는 숫자 대부분을 문자열로 반환합니다. `rust_decimal`의 역직렬화는
//! 문자열과 숫자를 모두 받으므로 `Decimal` 필드에 바로 매핑합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// 인증 API 응답
// ============================================================================

/// `GET /fapi/v2/positionRisk` 항목.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinancePositionRisk {
    pub symbol: String,
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub un_realized_profit: Option<Decimal>,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub position_side: Option<String>,
}

/// `GET /fapi/v2/balance` 항목.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceBalance {
    pub asset: String,
    /// 지갑 잔고
    pub balance: Decimal,
    /// 교차 마진 미실현 손익
    #[serde(default)]
    pub cross_un_pnl: Decimal,
    /// 주문 가능 잔고
    pub available_balance: Decimal,
}

/// `POST /fapi/v1/order` 응답.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
}

// ============================================================================
// 공개 API 응답
// ============================================================================

/// 캔들 (OHLCV).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kline {
    /// 시작 시각 (ms)
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    /// `GET /fapi/v1/klines`의 배열 한 행을 파싱.
    ///
    /// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`
    pub fn from_row(row: &[serde_json::Value]) -> Option<Self> {
        Some(Self {
            open_time: row.first()?.as_i64()?,
            open: value_as_f64(row.get(1)?)?,
            high: value_as_f64(row.get(2)?)?,
            low: value_as_f64(row.get(3)?)?,
            close: value_as_f64(row.get(4)?)?,
            volume: value_as_f64(row.get(5)?)?,
        })
    }
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}

/// `GET /fapi/v1/premiumIndex` 응답 (펀딩비 + 마크 가격).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRateInfo {
    pub symbol: String,
    pub mark_price: Decimal,
    pub index_price: Decimal,
    pub last_funding_rate: Decimal,
    pub next_funding_time: i64,
}

/// 호가 한 단계.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// 호가 스냅샷.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDepth {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl From<RawDepth> for OrderBookSnapshot {
    fn from(raw: RawDepth) -> Self {
        let level = |(price, quantity): (Decimal, Decimal)| OrderBookLevel { price, quantity };
        Self {
            bids: raw.bids.into_iter().map(level).collect(),
            asks: raw.asks.into_iter().map(level).collect(),
        }
    }
}

impl OrderBookSnapshot {
    /// 최우선 매수/매도 호가 스프레드.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.asks.first()?.price - self.bids.first()?.price)
    }

    /// 매수 잔량 / (매수 + 매도 잔량). 0.5 초과면 매수 우위.
    pub fn bid_ratio(&self) -> Option<Decimal> {
        let bid: Decimal = self.bids.iter().map(|l| l.quantity).sum();
        let ask: Decimal = self.asks.iter().map(|l| l.quantity).sum();
        let total = bid + ask;
        if total.is_zero() {
            None
        } else {
            Some(bid / total)
        }
    }
}

/// `GET /fapi/v1/ticker/24hr` 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: Decimal,
    pub price_change: Decimal,
    pub price_change_percent: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TickerPrice {
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInterest {
    pub open_interest: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kline_from_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1700000000000, "37000.1", "37100.0", "36900.5", "37050.0", "123.4", 1700003599999, "0", 100, "0", "0", "0"]"#,
        )
        .unwrap();
        let kline = Kline::from_row(&row).unwrap();
        assert_eq!(kline.open_time, 1_700_000_000_000);
        assert_eq!(kline.close, 37050.0);
        assert!(Kline::from_row(&row[..3]).is_none());
    }

    #[test]
    fn test_depth_parse_and_ratio() {
        let raw: RawDepth = serde_json::from_str(
            r#"{"lastUpdateId": 1, "bids": [["100.0", "3"], ["99.5", "1"]], "asks": [["100.5", "2"], ["101.0", "2"]]}"#,
        )
        .unwrap();
        let book = OrderBookSnapshot::from(raw);
        assert_eq!(book.spread(), Some(dec!(0.5)));
        assert_eq!(book.bid_ratio(), Some(dec!(0.5)));
    }

    #[test]
    fn test_position_risk_string_numbers() {
        let json = r#"{"symbol":"BTCUSDT","positionAmt":"-0.500","entryPrice":"65000.0","markPrice":"64000.0",
            "unRealizedProfit":"500.0","liquidationPrice":"70000","leverage":"10","positionSide":"BOTH"}"#;
        let risk: BinancePositionRisk = serde_json::from_str(json).unwrap();
        assert_eq!(risk.position_amt, dec!(-0.5));
        assert_eq!(risk.leverage, Some(dec!(10)));
    }
}
