//! Binance USDⓈ-M 선물 커넥터.
//!
//! - 인증 API: 포지션, 레버리지, 주문, 잔고, 포지션 모드 (HMAC-SHA256 서명)
//! - 공개 API: 캔들, 펀딩비, 호가, 24시간 시세, 미결제약정

mod client;
mod types;

pub use client::{BinanceFuturesClient, BinanceFuturesConfig};
pub use types::{
    BinanceBalance, BinanceOrderResponse, BinancePositionRisk, FundingRateInfo, Kline,
    OrderBookLevel, OrderBookSnapshot, Ticker24h,
};
