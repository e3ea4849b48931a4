//! 분석 도구.
//!
//! 추론 단계가 이름으로 호출하는 데이터 조회 도구입니다. 단계마다 별도의
//! [`ToolRegistry`]를 사용합니다.
//!
//! - 시장 분석: `get_crypto_data`, `get_crypto_indicators`
//! - 선물 시장 분석: `get_crypto_funding_rate`, `get_crypto_order_book`, `get_crypto_market_info`

mod binance;
pub mod indicators;

pub use binance::{
    crypto_tools, market_tools, AtrReading, CryptoDataTool, FundingRateTool, IndicatorTool, MarketDataSource,
    MarketInfoTool, OrderBookTool,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::reasoning::{ToolCall, ToolResult};

/// 분석 도구.
#[async_trait]
pub trait AnalysisTool: Send + Sync {
    /// 도구 이름 (추론 단계가 호출하는 이름)
    fn name(&self) -> &str;

    /// 도구 설명
    fn description(&self) -> &str;

    /// 인자 JSON 스키마
    fn parameters(&self) -> serde_json::Value;

    /// 도구 실행. 반환 텍스트는 그대로 추론 단계에 전달됩니다.
    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError>;
}

/// 추론 단계에 노출하는 도구 정의.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// 단계별 도구 레지스트리.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AnalysisTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 도구 등록 (빌더 패턴). 같은 이름은 덮어씁니다.
    pub fn with_tool(mut self, tool: Arc<dyn AnalysisTool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn AnalysisTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// 도구 호출. 알 수 없는 도구나 실행 실패는 에러 결과로 반환합니다.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "등록되지 않은 도구 호출");
            return ToolResult::failure(
                call,
                format!(
                    "알 수 없는 도구 '{}' (사용 가능: {})",
                    call.name,
                    self.names().join(", ")
                ),
            );
        };

        match tool.invoke(&call.arguments).await {
            Ok(content) => {
                debug!(tool = %call.name, bytes = content.len(), "도구 실행 완료");
                ToolResult::success(call, content)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "도구 실행 실패");
                ToolResult::failure(call, e)
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl AnalysisTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echo arguments"
        }

        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
            arguments["text"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| AgentError::InvalidArguments("text 필요".into()))
        }
    }

    #[tokio::test]
    async fn test_invoke_registered_tool() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let result = registry
            .invoke(&ToolCall::new("c1", "echo", json!({"text": "hello"})))
            .await;

        assert!(!result.is_error);
        assert_eq!(result.content, "hello");
        assert_eq!(result.call_id, "c1");
    }

    #[tokio::test]
    async fn test_unknown_and_failing_tools_become_error_results() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));

        let unknown = registry.invoke(&ToolCall::new("c2", "nope", json!({}))).await;
        assert!(unknown.is_error);
        assert!(unknown.content.contains("echo"));

        let failing = registry.invoke(&ToolCall::new("c3", "echo", json!({}))).await;
        assert!(failing.is_error);
        assert!(failing.content.starts_with("ERROR:"));
    }

    #[test]
    fn test_definitions() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["type"], "object");
    }
}
