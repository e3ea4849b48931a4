//! 추론 단계 trait.
//!
//! 추론 단계는 두 가지 능력만 가집니다: 현재 상태에서 한 단계 진행하거나,
//! 도구 실행 결과를 받아 이어서 진행합니다. 결과는 도구 호출 요청 또는 최종 텍스트입니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::stage::Stage;
use crate::state::PipelineState;

/// 도구 호출 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 호출 ID (결과와 짝을 맞추는 용도)
    pub id: String,
    /// 도구 이름
    pub name: String,
    /// JSON 인자
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 도구 실행 결과.
///
/// 실패도 결과로 표현되어 추론 단계에 전달됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(call: &ToolCall, error: impl std::fmt::Display) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: format!("ERROR: {}", error),
            is_error: true,
        }
    }
}

/// 추론 단계 출력.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutput {
    /// 도구 실행 요청
    ToolCalls(Vec<ToolCall>),
    /// 단계 종료 텍스트
    Final(String),
}

/// 추론 단계.
#[async_trait]
pub trait ReasoningStep: Send + Sync {
    /// 현재 상태에서 한 단계 진행.
    async fn advance(&self, stage: Stage, state: &PipelineState) -> Result<ReasoningOutput, AgentError>;

    /// 도구 결과를 받은 뒤 진행.
    ///
    /// 결과는 이미 `state.messages`에 추가되어 있습니다. 기본 구현은 `advance`와 같습니다.
    async fn advance_with_tool_results(
        &self,
        stage: Stage,
        state: &PipelineState,
        _results: &[ToolResult],
    ) -> Result<ReasoningOutput, AgentError> {
        self.advance(stage, state).await
    }
}
