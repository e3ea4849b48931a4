//! 다단계 분석 파이프라인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 추론 단계와 도구 실행을 오가는 제한된 상태 기계 ([`controller`])
//! - 단계별 분석 도구와 레지스트리 ([`tools`])
//! - 시장 감성 지표 조회/보고서 ([`sentiment`])
//! - 최종 텍스트 → 매매 시그널 파서 ([`decision`])
//! - OpenAI 호환 추론 단계 ([`llm`])
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_agent::{PipelineController, OpenAiReasoningStep};
//!
//! let controller = PipelineController::new(Arc::new(step))
//!     .with_market_tools(market_tools(&source))
//!     .with_crypto_tools(crypto_tools(&source));
//! let outcome = controller.run("BTC/USDT", "2026-10-18", &reconciler).await?;
//! ```

pub mod context;
pub mod controller;
pub mod decision;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod reasoning;
pub mod sentiment;
pub mod sink;
pub mod stage;
pub mod state;
pub mod tools;

pub use context::{PositionContext, StaticPositionContext};
pub use controller::{PipelineController, PipelineOutcome, DEFAULT_MAX_ITERATIONS};
pub use error::{AgentError, PipelineError};
pub use llm::{LlmConfig, OpenAiReasoningStep};
pub use prompts::PromptContext;
pub use reasoning::{ReasoningOutput, ReasoningStep, ToolCall, ToolResult};
pub use sentiment::{
    CryptoOracleClient, CryptoOracleConfig, SentimentLevel, SentimentReading, SentimentSource,
};
pub use sink::{CycleReport, ResultSink, TracingResultSink};
pub use stage::Stage;
pub use state::{ChatMessage, PipelineState, CONTINUE_PLACEHOLDER};
pub use tools::{AnalysisTool, MarketDataSource, ToolDefinition, ToolRegistry};
