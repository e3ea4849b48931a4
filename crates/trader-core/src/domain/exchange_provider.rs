//! 선물 거래소 제공자 추상화.
//!
//! 포지션 조회, 레버리지 설정, 주문 제출, 잔고 조회, 포지션 모드 조회를 위한
//! 거래소 중립적인 인터페이스를 제공합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{AccountBalance, ExchangePosition, FuturesOrderRequest, OrderAck, PositionMode};

// =============================================================================
// 에러 타입
// =============================================================================

/// FuturesExchangeProvider 에러.
///
/// 일시적 에러(네트워크, 타임아웃, 거래소 점검)와 영구적 에러(인증, 검증,
/// 비즈니스 규칙 거부)를 구분합니다. 재시도 래퍼는 일시적 에러만 재시도합니다.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// 거래소 이용 불가 (점검, 5xx)
    #[error("거래소 이용 불가: {0}")]
    ExchangeUnavailable(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// API 에러 (주문 거부, 파라미터 오류 등)
    #[error("API 에러: {0}")]
    Api(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// 재시도로 회복 가능한 일시적 에러인지 여부.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout(_)
                | ProviderError::ExchangeUnavailable(_)
        )
    }
}

// =============================================================================
// FuturesExchangeProvider Trait
// =============================================================================

/// 선물 거래소 제공자 trait.
///
/// 실행 엔진은 이 trait만 통해 거래소와 통신합니다. 실거래소 구현과
/// 시뮬레이션용 Mock 구현이 같은 인터페이스를 제공합니다.
#[async_trait]
pub trait FuturesExchangeProvider: Send + Sync {
    /// 거래소 이름.
    fn exchange_name(&self) -> &str;

    /// 심볼의 포지션 목록 조회.
    ///
    /// 헤지 모드에서는 롱/숏 레그가 각각 반환될 수 있습니다.
    /// 포지션이 없으면 빈 벡터 또는 수량 0인 레코드를 반환합니다.
    async fn fetch_positions(&self, symbol: &str) -> Result<Vec<ExchangePosition>, ProviderError>;

    /// 레버리지 설정.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError>;

    /// 주문 제출.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Network` / `Timeout` / `ExchangeUnavailable`: 일시적 실패
    /// - `ProviderError::Api`: 거래소가 주문을 거부
    async fn place_order(&self, request: &FuturesOrderRequest) -> Result<OrderAck, ProviderError>;

    /// 자산 잔고 조회.
    async fn fetch_balance(&self, asset: &str) -> Result<AccountBalance, ProviderError>;

    /// 최근 체결가 조회.
    async fn fetch_last_price(&self, symbol: &str) -> Result<Decimal, ProviderError>;

    /// 표준 포지션 모드 조회.
    ///
    /// 기본 구현은 `Unsupported`를 반환합니다.
    async fn fetch_position_mode(&self) -> Result<PositionMode, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{}: fetch_position_mode",
            self.exchange_name()
        )))
    }

    /// 원시 계정 설정 조회 (포지션 모드 감지 폴백용).
    ///
    /// 예: Binance `GET /fapi/v1/positionSide/dual` → `{"dualSidePosition": true}`.
    /// 기본 구현은 `Unsupported`를 반환합니다.
    async fn fetch_account_settings(&self) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{}: fetch_account_settings",
            self.exchange_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::Timeout("10s".into()).is_transient());
        assert!(ProviderError::ExchangeUnavailable("503".into()).is_transient());

        assert!(!ProviderError::Authentication("invalid key".into()).is_transient());
        assert!(!ProviderError::Api("-2019 margin is insufficient".into()).is_transient());
        assert!(!ProviderError::Parse("bad json".into()).is_transient());
        assert!(!ProviderError::Unsupported("x".into()).is_transient());
    }
}
