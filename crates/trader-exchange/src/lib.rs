//! 선물 거래소 커넥터.
//!
//! 이 crate는 다음을 제공합니다:
//! - 일시적 에러 재시도 래퍼 ([`retry`])
//! - Binance USDⓈ-M 선물 REST 커넥터 ([`connector::binance`])
//! - `FuturesExchangeProvider` 구현체 (Binance, 시뮬레이션용 Mock)
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_exchange::connector::binance::{BinanceFuturesClient, BinanceFuturesConfig};
//! use trader_exchange::provider::BinanceFuturesProvider;
//!
//! let client = BinanceFuturesClient::new(BinanceFuturesConfig::new(api_key, api_secret))?;
//! let provider = BinanceFuturesProvider::from_client(client);
//! ```

pub mod connector;
pub mod error;
pub mod provider;
pub mod retry;

pub use error::ExchangeError;
pub use provider::{BinanceFuturesProvider, MockFuturesExchange, MockModeSupport, MockOperation};
pub use retry::{truncate_error, with_retry, RetryConfig};
