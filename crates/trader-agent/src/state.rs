//! 파이프라인 상태.
//!
//! 단계별 보고서와 단계 내부에서만 쓰이는 메시지 버퍼를 보관합니다.
//! 메시지 버퍼는 각 단계가 끝날 때 계속 진행 메시지 하나로 초기화되어
//! 다음 단계로 대화가 새지 않습니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reasoning::{ToolCall, ToolResult};
use crate::stage::Stage;

/// 단계 종료 후 버퍼에 남기는 메시지.
pub const CONTINUE_PLACEHOLDER: &str = "Continue";

/// 단계 내부 대화 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        ChatMessage::Assistant {
            content: None,
            tool_calls,
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        ChatMessage::Tool {
            tool_call_id: result.call_id.clone(),
            name: result.name.clone(),
            content: result.content.clone(),
        }
    }
}

/// 결정 사이클 1회의 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub symbol: String,
    /// 거래 기준일 (YYYY-MM-DD)
    pub trade_date: String,
    /// 단계별 보고서
    pub reports: BTreeMap<Stage, String>,
    /// 현재 단계 메시지 버퍼
    pub messages: Vec<ChatMessage>,
    /// 트레이더 단계에 제공되는 계정/포지션 요약
    pub position_summary: Option<String>,
    /// 트레이더 단계 최종 텍스트
    pub final_decision: Option<String>,
}

impl PipelineState {
    pub fn new(symbol: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            trade_date: trade_date.into(),
            reports: BTreeMap::new(),
            messages: Vec::new(),
            position_summary: None,
            final_decision: None,
        }
    }

    pub fn report(&self, stage: Stage) -> Option<&str> {
        self.reports.get(&stage).map(String::as_str)
    }

    pub fn set_report(&mut self, stage: Stage, report: impl Into<String>) {
        self.reports.insert(stage, report.into());
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// 단계 종료: 버퍼를 계속 진행 메시지 하나로 교체.
    pub fn end_stage(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::user(CONTINUE_PLACEHOLDER));
    }

    /// 이번 단계에서 실행된 도구 호출 수.
    pub fn tool_messages(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m, ChatMessage::Tool { .. }))
            .count()
    }
}
