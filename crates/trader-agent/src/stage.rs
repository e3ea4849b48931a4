//! 분석 단계.

use serde::{Deserialize, Serialize};

/// 파이프라인 단계 (실행 순서대로).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 기술적 분석 (캔들, 지표)
    MarketAnalysis,
    /// 선물 시장 분석 (펀딩비, 호가, 24시간 시세)
    CryptoAnalysis,
    /// 시장 감성 (단일 조회 + 포맷)
    SentimentAnalysis,
    /// 최종 매매 결정
    Trader,
}

impl Stage {
    /// 실행 순서.
    pub const ORDER: [Stage; 4] = [
        Stage::MarketAnalysis,
        Stage::CryptoAnalysis,
        Stage::SentimentAnalysis,
        Stage::Trader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MarketAnalysis => "market_analysis",
            Stage::CryptoAnalysis => "crypto_analysis",
            Stage::SentimentAnalysis => "sentiment_analysis",
            Stage::Trader => "trader",
        }
    }

    /// 보고서 제목.
    pub fn title(&self) -> &'static str {
        match self {
            Stage::MarketAnalysis => "시장 기술적 분석",
            Stage::CryptoAnalysis => "선물 시장 분석",
            Stage::SentimentAnalysis => "시장 감성 분석",
            Stage::Trader => "매매 결정",
        }
    }

    /// 추론/도구 반복 루프를 사용하는 단계인지 여부.
    pub fn uses_tools(&self) -> bool {
        matches!(self, Stage::MarketAnalysis | Stage::CryptoAnalysis)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
