//! 분석 파이프라인이 생성하는 트레이딩 시그널.
//!
//! 이 모듈은 사이클당 한 번 생성되는 최종 매매 신호 관련 타입을 정의합니다:
//! - `TradeAction` - 범주형 매매 액션 (BUY, SELL, CLOSE, HOLD, UNKNOWN)
//! - `TradeSignal` - 액션 + 근거 + 선택적 손절/익절 가격

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// 범주형 매매 액션.
///
/// `Unknown`은 결정 마커를 찾지 못한 경우이며 호출자는 HOLD와 동일하게
/// (아무 주문도 내지 않는 방향으로) 취급합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    /// 롱 진입 (또는 숏 → 롱 반전)
    Buy,
    /// 숏 진입 (또는 롱 → 숏 반전)
    Sell,
    /// 보유 포지션 전량 청산
    Close,
    /// 아무것도 하지 않음
    Hold,
    /// 인식할 수 없는 결정
    Unknown,
}

impl TradeAction {
    /// 모든 액션 (테이블 기반 테스트용).
    pub const ALL: [TradeAction; 5] = [
        TradeAction::Buy,
        TradeAction::Sell,
        TradeAction::Close,
        TradeAction::Hold,
        TradeAction::Unknown,
    ];

    /// 대문자 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Close => "CLOSE",
            TradeAction::Hold => "HOLD",
            TradeAction::Unknown => "UNKNOWN",
        }
    }

    /// 포지션을 변경할 수 있는 액션인지 여부.
    pub fn changes_position(&self) -> bool {
        matches!(self, TradeAction::Buy | TradeAction::Sell | TradeAction::Close)
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 액션 문자열 파싱 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("지원하지 않는 매매 액션: {0}")]
pub struct ParseActionError(pub String);

impl FromStr for TradeAction {
    type Err = ParseActionError;

    /// 엄격한 파싱. 설정값이나 외부 입력 문자열에만 사용합니다.
    ///
    /// LONG/SHORT는 각각 BUY/SELL의 별칭입니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeAction::Buy),
            "SELL" | "SHORT" => Ok(TradeAction::Sell),
            "CLOSE" => Ok(TradeAction::Close),
            "HOLD" => Ok(TradeAction::Hold),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// 최종 트레이딩 시그널.
///
/// 사이클당 한 번 생성되며 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// 매매 액션
    pub action: TradeAction,
    /// 결정 근거 (추론 단계의 최종 텍스트)
    pub rationale: String,
    /// 제안 손절가 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 제안 익절가 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 신호 생성 시각
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    /// 새 시그널 생성.
    pub fn new(action: TradeAction, rationale: impl Into<String>) -> Self {
        Self {
            action,
            rationale: rationale.into(),
            stop_loss: None,
            take_profit: None,
            timestamp: Utc::now(),
        }
    }

    /// 손절가 설정.
    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// 익절가 설정.
    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// 손절/익절 중 하나라도 지정되었는지 여부.
    pub fn has_protective_prices(&self) -> bool {
        self.stop_loss.is_some() || self.take_profit.is_some()
    }
}
