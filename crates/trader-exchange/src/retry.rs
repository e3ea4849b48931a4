//! 거래소 API 재시도 유틸리티.
//!
//! 네트워크 오류, 타임아웃, 거래소 점검 등 일시적인 오류에 대해 지수 백오프로
//! 자동 재시도를 수행합니다. 인증 실패나 주문 거부 같은 영구적 오류는
//! 첫 발생 시 즉시 반환합니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_exchange::retry::{RetryConfig, with_retry};
//!
//! let config = RetryConfig::default();
//! let positions = with_retry(&config, "fetch_positions", || async {
//!     provider.fetch_positions("BTC/USDT").await
//! }).await?;
//! ```

use std::{future::Future, time::Duration};

use tracing::{debug, warn};
use trader_core::ProviderError;

use crate::ExchangeError;

/// 진단 로그에 남기는 에러 메시지 최대 길이 (문자 수).
const ERROR_LOG_MAX_CHARS: usize = 100;

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 첫 재시도 전 대기 시간.
    pub base_delay: Duration,
    /// 최대 대기 시간.
    pub max_delay: Duration,
    /// 백오프 배수 (재시도마다 대기 시간에 곱함).
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 빠른 재시도 설정 (짧은 지연, 적은 재시도).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// `attempt`번째 재시도 전 대기 시간 (0부터 시작).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay = Duration::from_secs_f64(self.base_delay.as_secs_f64() * multiplier);
        delay.min(self.max_delay)
    }
}

/// 에러 메시지를 로그용 길이로 자름.
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= ERROR_LOG_MAX_CHARS {
        return message.to_string();
    }
    let truncated: String = message.chars().take(ERROR_LOG_MAX_CHARS).collect();
    format!("{}...", truncated)
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// # Arguments
/// * `config` - 재시도 설정
/// * `operation_name` - 로그와 에러에 남길 작업 이름
/// * `operation` - 실행할 비동기 작업
///
/// # Returns
/// * `Ok(T)` - 작업 성공 결과
/// * `Err(ExchangeError::Provider)` - 영구적 에러 (1회 시도)
/// * `Err(ExchangeError::ExhaustedRetries)` - 일시적 에러가 `max_retries + 1`회 반복
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, ExchangeError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        total_delay_ms = total_delay.as_millis(),
                        "재시도 후 성공"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                // 영구적 에러는 재시도하지 않음
                if !e.is_transient() {
                    debug!(
                        operation = operation_name,
                        error = %truncate_error(&e.to_string()),
                        "재시도 불가능한 에러, 즉시 실패 반환"
                    );
                    return Err(ExchangeError::Provider(e));
                }

                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        error = %truncate_error(&e.to_string()),
                        attempts = attempt + 1,
                        max_retries = config.max_retries,
                        "최대 재시도 횟수 초과"
                    );
                    return Err(ExchangeError::ExhaustedRetries {
                        operation: operation_name.to_string(),
                        attempts: attempt + 1,
                        source: e,
                    });
                }

                let delay = config.delay_for(attempt);
                total_delay += delay;

                warn!(
                    operation = operation_name,
                    error = %truncate_error(&e.to_string()),
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis(),
                    "재시도 대기 중"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test]
    async fn test_immediate_success() {
        let config = RetryConfig::default();
        let result = with_retry(&config, "noop", || async { Ok::<_, ProviderError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_network_error() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "fetch_positions", || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ProviderError::Network("연결 실패".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3); // 3번 시도
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_permanent_error() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, "place_order", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ProviderError::Api("잔고 부족".to_string()))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_exhausted());
        assert!(matches!(err, ExchangeError::Provider(ProviderError::Api(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1); // 1번만 시도
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_retries_exceeded() {
        let config = RetryConfig {
            max_retries: 2,
            ..Default::default()
        };
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let started = tokio::time::Instant::now();

        let result = with_retry(&config, "fetch_balance", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ProviderError::Timeout("항상 실패".to_string()))
            }
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 3); // 초기 1회 + 재시도 2회 = 3번
        match result.unwrap_err() {
            ExchangeError::ExhaustedRetries {
                operation,
                attempts,
                source,
            } => {
                assert_eq!(operation, "fetch_balance");
                assert_eq!(attempts, 3);
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // 2초 + 4초 백오프
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_no_retry_preset_single_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&RetryConfig::no_retry(), "fetch_positions", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ProviderError::ExchangeUnavailable("503".to_string()))
            }
        })
        .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_backoff_and_cap() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(config.delay_for(0), Duration::from_secs(2));
        assert_eq!(config.delay_for(1), Duration::from_secs(4));
        assert_eq!(config.delay_for(2), Duration::from_secs(8));
        assert_eq!(config.delay_for(3), Duration::from_secs(10));
    }

    #[test]
    fn test_config_presets() {
        let fast = RetryConfig::fast();
        assert_eq!(fast.max_retries, 2);
        assert_eq!(fast.base_delay, Duration::from_millis(100));
        assert_eq!(RetryConfig::no_retry().max_retries, 0);
    }

    #[test]
    fn test_truncate_error() {
        assert_eq!(truncate_error("짧은 에러"), "짧은 에러");
        let long = "가".repeat(150);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), 103);
        assert!(truncated.ends_with("..."));
    }
}
