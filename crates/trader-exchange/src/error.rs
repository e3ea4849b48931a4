//! 거래소 호출 에러.

use thiserror::Error;
use trader_core::ProviderError;

/// 재시도 래퍼를 거친 거래소 호출의 에러.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 일시적 에러가 재시도 한도까지 반복됨
    #[error("{operation}: {attempts}회 시도 후 실패 - {source}")]
    ExhaustedRetries {
        /// 작업 이름
        operation: String,
        /// 총 시도 횟수 (초기 시도 포함)
        attempts: u32,
        /// 마지막 에러
        #[source]
        source: ProviderError,
    },

    /// 재시도 대상이 아닌 에러 (첫 발생 시 즉시 전파)
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ExchangeError {
    /// 원인 ProviderError.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            ExchangeError::ExhaustedRetries { source, .. } => source,
            ExchangeError::Provider(e) => e,
        }
    }

    /// 재시도 소진 여부.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ExchangeError::ExhaustedRetries { .. })
    }
}
