//! 트레이더 단계에 제공되는 실시간 포지션 요약.

use async_trait::async_trait;
use trader_execution::ExecutionReconciler;

/// 계정/포지션 요약 제공자.
///
/// 조회 실패 시에도 사용할 수 있는 요약 텍스트를 반환해야 합니다.
#[async_trait]
pub trait PositionContext: Send + Sync {
    async fn position_summary(&self, symbol: &str) -> String;
}

#[async_trait]
impl PositionContext for ExecutionReconciler {
    async fn position_summary(&self, symbol: &str) -> String {
        ExecutionReconciler::position_summary(self, symbol).await
    }
}

/// 고정 텍스트 요약 (드라이런/테스트용).
#[derive(Debug, Clone, Default)]
pub struct StaticPositionContext(pub String);

#[async_trait]
impl PositionContext for StaticPositionContext {
    async fn position_summary(&self, _symbol: &str) -> String {
        self.0.clone()
    }
}
