//! 시장 감성 지표.
//!
//! 감성 단계는 도구 호출 없이 외부 API를 한 번 조회하고 보고서로 변환합니다.
//! 조회 실패는 사이클을 중단시키지 않고 "감성 데이터 없음" 보고서가 됩니다.

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AgentError;

/// 긍정 감성 비율 엔드포인트
pub const POSITIVE_ENDPOINT: &str = "CO-A-02-01";
/// 부정 감성 비율 엔드포인트
pub const NEGATIVE_ENDPOINT: &str = "CO-A-02-02";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 데이터 공개 지연을 고려한 조회 종료 시점 오프셋 (분)
const END_OFFSET_MINUTES: i64 = 40;
/// 조회 구간 (시간)
const WINDOW_HOURS: i64 = 4;

// ============================================================================
// 감성 데이터
// ============================================================================

/// 한 구간의 감성 측정값.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReading {
    pub token: String,
    /// 긍정 비율 (0~1)
    pub positive_ratio: f64,
    /// 부정 비율 (0~1)
    pub negative_ratio: f64,
    /// 구간 시작 시각 (원본 문자열)
    pub data_time: String,
    /// 조회 시점 기준 지연 (분)
    pub delay_minutes: i64,
}

impl SentimentReading {
    /// 순감성 = 긍정 − 부정.
    pub fn net(&self) -> f64 {
        self.positive_ratio - self.negative_ratio
    }

    pub fn level(&self) -> SentimentLevel {
        SentimentLevel::from_net(self.net())
    }
}

/// 감성 데이터 소스.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch(&self, token: &str) -> Result<SentimentReading, AgentError>;
}

/// 심볼 → 감성 API 토큰. (`BTC/USDT` → `BTC`)
pub fn sentiment_token(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol)
}

// ============================================================================
// 해석
// ============================================================================

/// 순감성 9단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLevel {
    ExtremelyBullish,
    StronglyBullish,
    Bullish,
    SlightlyBullish,
    Neutral,
    SlightlyBearish,
    Bearish,
    StronglyBearish,
    ExtremelyBearish,
}

impl SentimentLevel {
    pub fn from_net(net: f64) -> Self {
        match net {
            n if n >= 0.7 => Self::ExtremelyBullish,
            n if n >= 0.5 => Self::StronglyBullish,
            n if n >= 0.3 => Self::Bullish,
            n if n >= 0.1 => Self::SlightlyBullish,
            n if n >= -0.1 => Self::Neutral,
            n if n >= -0.3 => Self::SlightlyBearish,
            n if n >= -0.5 => Self::Bearish,
            n if n >= -0.7 => Self::StronglyBearish,
            _ => Self::ExtremelyBearish,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ExtremelyBullish => "극단적 낙관",
            Self::StronglyBullish => "강한 낙관",
            Self::Bullish => "낙관 우세",
            Self::SlightlyBullish => "약한 낙관",
            Self::Neutral => "중립",
            Self::SlightlyBearish => "약한 비관",
            Self::Bearish => "비관 우세",
            Self::StronglyBearish => "강한 비관",
            Self::ExtremelyBearish => "극단적 비관",
        }
    }
}

/// 순감성 추세 해석 (7구간).
pub fn trend_description(net: f64) -> &'static str {
    match net {
        n if n >= 0.5 => "시장 감성이 극도로 낙관적입니다. 과매수 위험이 있으므로 조정에 유의하세요.",
        n if n >= 0.3 => "시장 감성이 낙관 쪽으로 기울어 롱이 우세합니다. 추세 추종 롱에 적합합니다.",
        n if n >= 0.1 => "시장 감성이 약하게 낙관적입니다. 롱이 약간 우세하며 소규모 롱을 고려할 수 있습니다.",
        n if n >= -0.1 => "시장 감성이 중립적이며 롱/숏 의견이 갈립니다. 관망 또는 소규모 운용을 권장합니다.",
        n if n >= -0.3 => "시장 감성이 약하게 비관적입니다. 숏이 약간 우세하며 소규모 숏을 고려할 수 있습니다.",
        n if n >= -0.5 => "시장 감성이 비관 쪽으로 기울어 숏이 우세합니다. 추세 추종 숏에 적합합니다.",
        _ => "시장 감성이 극도로 비관적입니다. 공포성 매도 가능성이 있으므로 반등에 유의하세요.",
    }
}

/// 감성 보고서.
pub fn format_sentiment_report(reading: &SentimentReading) -> String {
    let net = reading.net();
    let mut out = String::new();
    let _ = writeln!(out, "# 시장 감성 분석 보고서 ({})", reading.token);
    let _ = writeln!(out);
    let _ = writeln!(out, "## 감성 지표 개요");
    let _ = writeln!(
        out,
        "- **데이터 시각**: {} (지연 {}분)",
        reading.data_time, reading.delay_minutes
    );
    let _ = writeln!(out, "- **긍정 비율**: {:.2}%", reading.positive_ratio * 100.0);
    let _ = writeln!(out, "- **부정 비율**: {:.2}%", reading.negative_ratio * 100.0);
    let _ = writeln!(out, "- **순감성**: {:+.4}", net);
    let _ = writeln!(out, "- **감성 단계**: {}", reading.level().label());
    let _ = writeln!(out);
    let _ = writeln!(out, "## 감성 해석");
    let _ = writeln!(out, "{}", trend_description(net));
    let _ = writeln!(out);
    let _ = writeln!(out, "## 매매 참고");
    let _ = writeln!(out, "- **순감성 > 0.3**: 롱 우위, 롱 전략 고려");
    let _ = writeln!(out, "- **순감성 < -0.3**: 숏 우위, 숏 전략 고려");
    let _ = writeln!(out, "- **|순감성| < 0.3**: 중립, 관망 또는 소규모 운용");
    let _ = writeln!(out, "- **|순감성| > 0.6**: 극단 감성, 반전 위험 경계");
    let _ = writeln!(out);
    let _ = writeln!(out, "## 데이터 출처");
    let _ = writeln!(out, "- API: CryptoOracle Sentiment Indicators");
    let _ = writeln!(
        out,
        "- 지표: {} (긍정), {} (부정)",
        POSITIVE_ENDPOINT, NEGATIVE_ENDPOINT
    );
    let _ = writeln!(out, "- 시간 단위: 15분");
    out
}

/// 감성 데이터 조회 실패 보고서.
pub fn format_sentiment_failure(token: &str, reason: &str) -> String {
    format!(
        "# 시장 감성 데이터 없음\n\n\
         - 오류: {}\n\
         - 심볼: {}\n\n\
         이번 분석에서는 감성 데이터를 사용할 수 없습니다. 신중하게 거래하세요.\n",
        reason, token
    )
}

/// 조회 결과 → 보고서. 실패도 보고서로 변환됩니다.
pub fn sentiment_report(token: &str, result: &Result<SentimentReading, AgentError>) -> String {
    match result {
        Ok(reading) => format_sentiment_report(reading),
        Err(e) => format_sentiment_failure(token, &e.to_string()),
    }
}

// ============================================================================
// CryptoOracle 클라이언트
// ============================================================================

/// CryptoOracle 감성 API 설정.
#[derive(Debug, Clone)]
pub struct CryptoOracleConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl CryptoOracleConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(10),
        }
    }
}

/// CryptoOracle 감성 API 클라이언트.
pub struct CryptoOracleClient {
    client: reqwest::Client,
    config: CryptoOracleConfig,
}

impl CryptoOracleClient {
    pub fn new(config: CryptoOracleConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<OracleTokenData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OracleTokenData {
    #[serde(default)]
    time_periods: Vec<OraclePeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OraclePeriod {
    start_time: String,
    #[serde(default)]
    data: Vec<OracleValue>,
}

#[derive(Debug, Deserialize)]
struct OracleValue {
    endpoint: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl OracleValue {
    fn as_f64(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        }
    }
}

/// 응답에서 두 지표가 모두 있는 첫 구간을 선택.
fn parse_response(
    token: &str,
    response: OracleResponse,
    now: NaiveDateTime,
) -> Result<SentimentReading, AgentError> {
    if response.code != 200 {
        return Err(AgentError::Parse(format!(
            "API 응답 이상: code={}, msg={}",
            response.code,
            response.msg.unwrap_or_default()
        )));
    }
    let periods = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::NoData("응답 data가 비어 있음".into()))?
        .time_periods;

    for period in periods {
        let find = |endpoint: &str| {
            period
                .data
                .iter()
                .filter(|v| v.endpoint == endpoint)
                .find_map(OracleValue::as_f64)
        };
        let (Some(positive), Some(negative)) = (find(POSITIVE_ENDPOINT), find(NEGATIVE_ENDPOINT))
        else {
            continue;
        };

        let delay_minutes = NaiveDateTime::parse_from_str(&period.start_time, TIME_FORMAT)
            .map(|t| (now - t).num_minutes())
            .unwrap_or_default();

        return Ok(SentimentReading {
            token: token.to_string(),
            positive_ratio: positive,
            negative_ratio: negative,
            data_time: period.start_time,
            delay_minutes,
        });
    }

    Err(AgentError::NoData(
        "모든 구간의 데이터가 비어 있음 (지연이 예상보다 김)".into(),
    ))
}

#[async_trait]
impl SentimentSource for CryptoOracleClient {
    async fn fetch(&self, token: &str) -> Result<SentimentReading, AgentError> {
        let now = Utc::now().naive_utc();
        let end = now - chrono::Duration::minutes(END_OFFSET_MINUTES);
        let start = end - chrono::Duration::hours(WINDOW_HOURS);
        let api_key = self.config.api_key.expose_secret();

        let body = json!({
            "apiKey": api_key,
            "endpoints": [POSITIVE_ENDPOINT, NEGATIVE_ENDPOINT],
            "startTime": start.format(TIME_FORMAT).to_string(),
            "endTime": end.format(TIME_FORMAT).to_string(),
            "timeType": "15m",
            "token": [token],
        });

        debug!(token, "감성 지표 조회");
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-API-KEY", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(token, status = status.as_u16(), "감성 API HTTP 에러");
            return Err(AgentError::Http(format!("status_code={}", status.as_u16())));
        }

        let parsed: OracleResponse = response.json().await?;
        parse_response(token, parsed, now)
    }
}
