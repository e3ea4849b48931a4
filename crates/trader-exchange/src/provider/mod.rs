//! FuturesExchangeProvider 구현체.
//!
//! - [`BinanceFuturesProvider`]: Binance USDⓈ-M 선물 Provider
//! - [`MockFuturesExchange`]: 시뮬레이션/테스트용 인메모리 Provider

mod binance;
mod mock;

pub use binance::BinanceFuturesProvider;
pub use mock::{MockFuturesExchange, MockModeSupport, MockOperation};
