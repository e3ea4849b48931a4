//! 분석 파이프라인 에러.

use thiserror::Error;
use trader_core::ProviderError;

use crate::stage::Stage;

/// 추론 단계, 도구, 외부 데이터 소스 에러.
#[derive(Debug, Error)]
pub enum AgentError {
    /// HTTP 전송 실패
    #[error("HTTP 요청 실패: {0}")]
    Http(String),

    /// LLM API 에러 응답
    #[error("LLM API 에러 (status {status}): {message}")]
    Llm { status: u16, message: String },

    /// 응답 파싱 실패
    #[error("응답 파싱 실패: {0}")]
    Parse(String),

    /// 도구 인자 오류
    #[error("잘못된 도구 인자: {0}")]
    InvalidArguments(String),

    /// 도구 실행 실패
    #[error("도구 실행 실패: {0}")]
    Tool(String),

    /// 데이터 소스 응답에 유효한 값이 없음
    #[error("데이터 없음: {0}")]
    NoData(String),

    /// 거래소 데이터 조회 실패
    #[error("거래소 데이터 조회 실패: {0}")]
    Exchange(#[from] ProviderError),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AgentError::Parse(err.to_string())
        } else {
            AgentError::Http(err.to_string())
        }
    }
}

/// 사이클을 중단시키는 파이프라인 에러.
///
/// 도구 실패와 감성 데이터 실패는 보고서에 기록되고 여기로 올라오지 않습니다.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 단계 반복 한도 도달 (재시도하지 않음)
    #[error("{stage} 단계가 반복 한도 {max_iterations}회에 도달")]
    IterationLimit { stage: Stage, max_iterations: u32 },

    /// 추론 단계 실패
    #[error("{stage} 단계 추론 실패: {source}")]
    Reasoning {
        stage: Stage,
        #[source]
        source: AgentError,
    },
}
