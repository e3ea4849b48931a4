//! OpenAI 호환 chat-completions 추론 단계.
//!
//! 단계마다 시스템 프롬프트 + 작업 지시 + 현재 단계 메시지 버퍼를 전송하고,
//! 응답의 `tool_calls` 유무로 도구 호출 요청과 최종 텍스트를 구분합니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use trader_exchange::truncate_error;

use crate::error::AgentError;
use crate::prompts::{self, PromptContext};
use crate::reasoning::{ReasoningOutput, ReasoningStep, ToolCall};
use crate::stage::Stage;
use crate::state::{ChatMessage, PipelineState};
use crate::tools::ToolDefinition;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// LLM 엔드포인트 설정.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `/chat/completions` 앞까지의 URL
    pub base_url: String,
    /// 로컬 서버 등은 키 없이 사용
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(120),
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// chat-completions 기반 추론 단계.
pub struct OpenAiReasoningStep {
    client: reqwest::Client,
    config: LlmConfig,
    prompt: PromptContext,
    tools: HashMap<Stage, Vec<ToolDefinition>>,
}

impl OpenAiReasoningStep {
    pub fn new(config: LlmConfig, prompt: PromptContext) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            prompt,
            tools: HashMap::new(),
        })
    }

    /// 단계에 노출할 도구 정의 등록.
    pub fn with_tools(mut self, stage: Stage, definitions: Vec<ToolDefinition>) -> Self {
        self.tools.insert(stage, definitions);
        self
    }

    fn build_request(&self, stage: Stage, state: &PipelineState) -> serde_json::Value {
        let mut messages = vec![
            json!({"role": "system", "content": prompts::system_prompt(stage)}),
            json!({"role": "user", "content": prompts::task_prompt(stage, state, &self.prompt)}),
        ];
        messages.extend(state.messages.iter().map(wire_message));

        let mut request = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(temperature) = self.config.temperature {
            request["temperature"] = json!(temperature);
        }
        if let Some(definitions) = self.tools.get(&stage).filter(|d| !d.is_empty()) {
            request["tools"] = definitions
                .iter()
                .map(|d| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": d.name,
                            "description": d.description,
                            "parameters": d.parameters,
                        }
                    })
                })
                .collect();
        }
        request
    }

    async fn complete(&self, request: &serde_json::Value) -> Result<ReasoningOutput, AgentError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Llm {
                status: status.as_u16(),
                message: truncate_error(&body),
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        parse_completion(completion)
    }
}

#[async_trait]
impl ReasoningStep for OpenAiReasoningStep {
    async fn advance(&self, stage: Stage, state: &PipelineState) -> Result<ReasoningOutput, AgentError> {
        let request = self.build_request(stage, state);
        debug!(
            stage = %stage,
            model = %self.config.model,
            messages = state.messages.len(),
            "LLM 요청"
        );
        self.complete(&request).await
    }
}

// ============================================================================
// 와이어 포맷
// ============================================================================

fn wire_message(message: &ChatMessage) -> serde_json::Value {
    match message {
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut value = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            value
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
            ..
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_completion(completion: ChatCompletionResponse) -> Result<ReasoningOutput, AgentError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Parse("choices가 비어 있음".into()))?
        .message;

    if message.tool_calls.is_empty() {
        return Ok(ReasoningOutput::Final(message.content.unwrap_or_default()));
    }

    let calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let raw = call.function.arguments;
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&raw).unwrap_or_else(|e| {
                    warn!(tool = %call.function.name, error = %e, "도구 인자 JSON 파싱 실패");
                    serde_json::Value::String(raw)
                })
            };
            ToolCall::new(call.id, call.function.name, arguments)
        })
        .collect();
    Ok(ReasoningOutput::ToolCalls(calls))
}
