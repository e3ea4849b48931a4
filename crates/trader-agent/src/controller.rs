//! 다단계 분석 파이프라인 컨트롤러.
//!
//! 단계 순서: 시장 분석 → 선물 시장 분석 → 감성 분석 → 트레이더.
//!
//! 도구를 쓰는 단계는 `Reasoning → ToolExecution → Reasoning → ... → StageDone`
//! 상태 전이로 진행하며, 추론 호출 횟수가 `max_iterations`에 도달하면 사이클이
//! 중단됩니다 (재시도 없음). 각 단계가 끝나면 메시지 버퍼가 초기화되어 다음 단계는
//! 이전 단계의 최종 보고서만 볼 수 있습니다.

use std::sync::Arc;

use tracing::{debug, info, warn};
use trader_core::TradeSignal;

use crate::context::PositionContext;
use crate::decision;
use crate::error::{AgentError, PipelineError};
use crate::reasoning::{ReasoningOutput, ReasoningStep, ToolCall, ToolResult};
use crate::sentiment::{sentiment_report, sentiment_token, SentimentSource};
use crate::stage::Stage;
use crate::state::{ChatMessage, PipelineState};
use crate::tools::ToolRegistry;

/// 단계당 기본 추론 호출 한도
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// 단계 내부 상태.
#[derive(Debug)]
enum LoopState {
    Reasoning,
    ToolExecution(Vec<ToolCall>),
    StageDone(String),
}

/// 파이프라인 실행 결과.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    /// 트레이더 단계 최종 텍스트
    pub decision_text: String,
    pub signal: TradeSignal,
}

/// 파이프라인 컨트롤러.
pub struct PipelineController {
    reasoning: Arc<dyn ReasoningStep>,
    market_tools: ToolRegistry,
    crypto_tools: ToolRegistry,
    sentiment: Option<Arc<dyn SentimentSource>>,
    max_iterations: u32,
}

impl PipelineController {
    pub fn new(reasoning: Arc<dyn ReasoningStep>) -> Self {
        Self {
            reasoning,
            market_tools: ToolRegistry::new(),
            crypto_tools: ToolRegistry::new(),
            sentiment: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_market_tools(mut self, tools: ToolRegistry) -> Self {
        self.market_tools = tools;
        self
    }

    pub fn with_crypto_tools(mut self, tools: ToolRegistry) -> Self {
        self.crypto_tools = tools;
        self
    }

    /// 감성 데이터 소스. 없으면 감성 단계는 "데이터 없음" 보고서를 남깁니다.
    pub fn with_sentiment(mut self, source: Arc<dyn SentimentSource>) -> Self {
        self.sentiment = Some(source);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// 결정 사이클 1회 실행.
    pub async fn run(
        &self,
        symbol: &str,
        trade_date: &str,
        position: &dyn PositionContext,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut state = PipelineState::new(symbol, trade_date);
        info!(symbol, trade_date, "분석 파이프라인 시작");

        let empty = ToolRegistry::new();
        for stage in Stage::ORDER {
            match stage {
                Stage::MarketAnalysis => {
                    self.run_reasoning_stage(stage, &self.market_tools, &mut state)
                        .await?;
                }
                Stage::CryptoAnalysis => {
                    self.run_reasoning_stage(stage, &self.crypto_tools, &mut state)
                        .await?;
                }
                Stage::SentimentAnalysis => self.run_sentiment_stage(&mut state).await,
                Stage::Trader => {
                    state.position_summary = Some(position.position_summary(symbol).await);
                    let text = self.run_reasoning_stage(stage, &empty, &mut state).await?;
                    state.final_decision = Some(text);
                }
            }
        }

        let decision_text = state.final_decision.clone().unwrap_or_default();
        let signal = decision::parse_signal(&decision_text);
        info!(
            symbol,
            action = %signal.action,
            stop_loss = ?signal.stop_loss,
            take_profit = ?signal.take_profit,
            "분석 파이프라인 완료"
        );

        Ok(PipelineOutcome {
            state,
            decision_text,
            signal,
        })
    }

    /// 추론/도구 반복 루프. 단계 최종 텍스트를 보고서로 저장하고 반환합니다.
    async fn run_reasoning_stage(
        &self,
        stage: Stage,
        tools: &ToolRegistry,
        state: &mut PipelineState,
    ) -> Result<String, PipelineError> {
        let mut iterations = 0u32;
        let mut results: Vec<ToolResult> = Vec::new();
        let mut current = LoopState::Reasoning;

        loop {
            current = match current {
                LoopState::Reasoning => {
                    if iterations >= self.max_iterations {
                        warn!(stage = %stage, max_iterations = self.max_iterations, "단계 반복 한도 도달");
                        return Err(PipelineError::IterationLimit {
                            stage,
                            max_iterations: self.max_iterations,
                        });
                    }
                    iterations += 1;

                    let output = if results.is_empty() {
                        self.reasoning.advance(stage, state).await
                    } else {
                        self.reasoning
                            .advance_with_tool_results(stage, state, &results)
                            .await
                    }
                    .map_err(|source| reasoning_error(stage, source))?;

                    match output {
                        ReasoningOutput::ToolCalls(calls) if !calls.is_empty() => {
                            LoopState::ToolExecution(calls)
                        }
                        ReasoningOutput::ToolCalls(_) => LoopState::StageDone(String::new()),
                        ReasoningOutput::Final(text) => LoopState::StageDone(text),
                    }
                }
                LoopState::ToolExecution(calls) => {
                    debug!(stage = %stage, count = calls.len(), iteration = iterations, "도구 실행");
                    state.push_message(ChatMessage::assistant_tool_calls(calls.clone()));
                    results.clear();
                    for call in &calls {
                        let result = tools.invoke(call).await;
                        state.push_message(ChatMessage::tool_result(&result));
                        results.push(result);
                    }
                    LoopState::Reasoning
                }
                LoopState::StageDone(text) => {
                    info!(
                        stage = %stage,
                        iterations,
                        tool_calls = state.tool_messages(),
                        "단계 완료"
                    );
                    state.set_report(stage, text.clone());
                    state.end_stage();
                    return Ok(text);
                }
            };
        }
    }

    /// 감성 단계: 단일 조회 + 포맷. 실패해도 보고서를 남기고 계속합니다.
    async fn run_sentiment_stage(&self, state: &mut PipelineState) {
        let token = sentiment_token(&state.symbol).to_string();
        let result = match &self.sentiment {
            Some(source) => source.fetch(&token).await,
            None => Err(AgentError::NoData("감성 데이터 소스가 설정되지 않음".into())),
        };

        match &result {
            Ok(reading) => info!(token = %token, net = reading.net(), "감성 지표 조회"),
            Err(e) => warn!(token = %token, error = %e, "감성 지표 없음, 대체 보고서 사용"),
        }

        state.set_report(Stage::SentimentAnalysis, sentiment_report(&token, &result));
        state.end_stage();
    }
}

fn reasoning_error(stage: Stage, source: AgentError) -> PipelineError {
    warn!(stage = %stage, error = %source, "추론 단계 실패");
    PipelineError::Reasoning { stage, source }
}
