//! 사이클 결과 전달.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use trader_core::TradeSignal;
use trader_execution::ExecutionResult;

use crate::error::AgentError;
use crate::stage::Stage;

/// 결정 사이클 1회의 결과.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub symbol: String,
    pub trade_date: String,
    /// 분석 단계 보고서
    pub reports: BTreeMap<Stage, String>,
    /// 트레이더 단계 최종 텍스트
    pub decision_text: String,
    pub signal: TradeSignal,
    /// 실행하지 않은 사이클은 `None`
    pub execution: Option<ExecutionResult>,
}

/// 결과 수신자.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, report: &CycleReport) -> Result<(), AgentError>;
}

/// 결과를 구조화 로그로 출력하는 수신자.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingResultSink;

#[async_trait]
impl ResultSink for TracingResultSink {
    async fn publish(&self, report: &CycleReport) -> Result<(), AgentError> {
        let payload =
            serde_json::to_string(report).map_err(|e| AgentError::Parse(e.to_string()))?;
        info!(
            symbol = %report.symbol,
            trade_date = %report.trade_date,
            action = %report.signal.action,
            executed = report.execution.as_ref().map(|e| e.success),
            report = %payload,
            "사이클 결과"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::TradeAction;

    #[tokio::test]
    async fn test_report_serializes_with_stage_keys() {
        let mut reports = BTreeMap::new();
        reports.insert(Stage::MarketAnalysis, "market".to_string());
        reports.insert(Stage::SentimentAnalysis, "sentiment".to_string());

        let report = CycleReport {
            symbol: "BTC/USDT".into(),
            trade_date: "2026-10-18".into(),
            reports,
            decision_text: "**最终决策: HOLD**".into(),
            signal: TradeSignal::new(TradeAction::Hold, "**最终决策: HOLD**"),
            execution: None,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["reports"]["market_analysis"], "market");
        assert_eq!(json["reports"]["sentiment_analysis"], "sentiment");
        assert!(json["execution"].is_null());

        TracingResultSink.publish(&report).await.unwrap();
    }
}
