//! 실행 엔진 에러.

use thiserror::Error;
use trader_core::{ParseActionError, ParsePositionModeError};
use trader_exchange::ExchangeError;

/// 실행 사이클을 중단시키는 에러.
///
/// 중복 진입 거부와 부분 체결은 에러가 아니라 `ExecutionResult`로 보고됩니다.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 거래소 호출 실패 (재시도 소진 또는 영구적 에러)
    #[error("거래소 호출 실패: {0}")]
    Exchange(#[from] ExchangeError),

    /// 설정 오류
    #[error("설정 오류: {0}")]
    Configuration(String),
}

impl From<ParseActionError> for ExecutionError {
    fn from(err: ParseActionError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<ParsePositionModeError> for ExecutionError {
    fn from(err: ParsePositionModeError) -> Self {
        Self::Configuration(err.to_string())
    }
}
