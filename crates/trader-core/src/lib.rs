//! 선물 트레이딩 파이프라인의 핵심 도메인 타입.
//!
//! 이 crate는 다음을 제공합니다:
//! - 매매 액션과 트레이딩 시그널 (`TradeAction`, `TradeSignal`)
//! - 포지션 스냅샷과 포지션 모드 (`PositionSnapshot`, `PositionMode`)
//! - 선물 주문 요청/응답 타입
//! - 거래소 중립적인 `FuturesExchangeProvider` trait 및 `ProviderError`

pub mod domain;

pub use domain::*;
