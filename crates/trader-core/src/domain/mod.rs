//! 도메인 모델.

mod account;
mod exchange_provider;
mod order;
mod position;
mod signal;
mod symbol;

pub use account::{AccountBalance, AccountInfo};
pub use exchange_provider::{FuturesExchangeProvider, ProviderError};
pub use order::{FuturesOrderRequest, FuturesOrderType, OrderAck, OrderSide, PositionTag};
pub use position::{
    ExchangePosition, ParsePositionModeError, PositionMode, PositionModeSetting, PositionSide,
    PositionSnapshot,
};
pub use signal::{ParseActionError, TradeAction, TradeSignal};
pub use symbol::{normalize_symbol, symbols_match, to_exchange_symbol};
