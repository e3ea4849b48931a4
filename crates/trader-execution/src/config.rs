//! 실행 엔진 설정.

use std::time::Duration;

use trader_core::PositionModeSetting;
use trader_exchange::RetryConfig;

/// 실행 엔진 설정.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// 테스트 모드 (주문 제출 없이 모의 실행)
    pub test_mode: bool,
    /// 포지션 모드 설정 (auto면 거래소에서 감지)
    pub position_mode: PositionModeSetting,
    /// 증거금 자산
    pub quote_asset: String,
    /// 반전 시 청산 → 신규 진입 사이 대기
    pub settle_delay: Duration,
    /// 진입 후 손절/익절 주문 전 대기
    pub stop_order_delay: Duration,
    /// 주문 후 포지션 재조회 전 대기
    pub requery_delay: Duration,
    /// 거래소 호출 재시도 설정
    pub retry: RetryConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            test_mode: true,
            position_mode: PositionModeSetting::Auto,
            quote_asset: "USDT".to_string(),
            settle_delay: Duration::from_secs(1),
            stop_order_delay: Duration::from_secs(1),
            requery_delay: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// 실거래 설정.
    pub fn live() -> Self {
        Self {
            test_mode: false,
            ..Default::default()
        }
    }

    /// 테스트 모드 설정 (빌더 패턴).
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// 포지션 모드 설정 (빌더 패턴).
    pub fn with_position_mode(mut self, mode: PositionModeSetting) -> Self {
        self.position_mode = mode;
        self
    }

    /// 재시도 설정 (빌더 패턴).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
