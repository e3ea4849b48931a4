//! 환경변수 기반 설정 모듈.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use trader_core::PositionModeSetting;

const DEFAULT_SENTIMENT_URL: &str = "https://service.cryptoracle.network/openapi/v2/endpoint";
const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// 설정 에러.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("잘못된 포지션 모드 '{0}' (auto, oneway, hedge 중 하나)")]
    InvalidPositionMode(String),

    #[error("잘못된 설정 값 {key}={value}")]
    InvalidValue { key: String, value: String },
}

/// Binance API 자격 증명.
#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
}

/// LLM 엔드포인트 설정.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
}

/// 감성 API 설정. 키가 없으면 감성 조회 비활성화.
#[derive(Debug, Clone)]
pub struct SentimentSettings {
    pub url: String,
    pub api_key: SecretString,
}

/// 트레이딩 사이클 설정
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// 거래 심볼 (예: BTC/USDT)
    pub symbol: String,
    /// 캔들 간격
    pub timeframe: String,
    /// 캔들 조회 기간 (일)
    pub lookback_days: u32,
    pub leverage: u32,
    pub position_mode: PositionModeSetting,
    /// 테스트 모드 (주문 미제출)
    pub test_mode: bool,
    /// 거래당 리스크 비율
    pub risk_per_trade: f64,
    /// 분석 후 자동 실행 여부
    pub auto_execute: bool,
    /// 진입 수량 (기초자산 단위)
    pub position_size: Decimal,
    /// 손절가 없는 진입에 ATR 초기 손절가 부여
    pub atr_initial_stop: bool,
    pub binance: Option<BinanceCredentials>,
    pub binance_base_url: Option<String>,
    pub llm: LlmSettings,
    /// 단계당 추론 호출 한도
    pub max_tool_iterations: u32,
    pub sentiment: Option<SentimentSettings>,
}

impl TradingConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let timeframe = env_var_string(vars, "CRYPTO_TIMEFRAME", "1h");

        let mode_raw = env_var_string(vars, "BINANCE_POSITION_MODE", "auto");
        let position_mode = PositionModeSetting::from_str(&mode_raw)
            .map_err(|_| ConfigError::InvalidPositionMode(mode_raw.clone()))?;

        let lookback_days = match env_var(vars, "CRYPTO_LOOKBACK_DAYS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CRYPTO_LOOKBACK_DAYS".into(),
                value: raw.to_string(),
            })?,
            None => default_lookback_days(&timeframe),
        };

        let binance = match (
            env_var(vars, "BINANCE_API_KEY"),
            env_var(vars, "BINANCE_API_SECRET"),
        ) {
            (Some(key), Some(secret)) => Some(BinanceCredentials {
                api_key: SecretString::from(key.to_string()),
                api_secret: SecretString::from(secret.to_string()),
            }),
            _ => None,
        };

        let llm_key = env_var(vars, "LLM_API_KEY").or_else(|| env_var(vars, "OPENAI_API_KEY"));

        Ok(Self {
            symbol: env_var_string(vars, "CRYPTO_SYMBOL", "BTC/USDT"),
            timeframe,
            lookback_days,
            leverage: env_var_parse(vars, "BINANCE_LEVERAGE", 10),
            position_mode,
            test_mode: env_var_bool(vars, "BINANCE_TEST_MODE", true),
            risk_per_trade: env_var_parse(vars, "RISK_PER_TRADE", 0.02),
            auto_execute: env_var_bool(vars, "AUTO_EXECUTE", false),
            position_size: env_var_parse(vars, "POSITION_SIZE", Decimal::new(1, 3)),
            atr_initial_stop: env_var_bool(vars, "ATR_INITIAL_STOP", true),
            binance,
            binance_base_url: env_var(vars, "BINANCE_BASE_URL").map(str::to_string),
            llm: LlmSettings {
                base_url: env_var_string(vars, "LLM_BACKEND_URL", DEFAULT_LLM_URL),
                api_key: llm_key.map(|k| SecretString::from(k.to_string())),
                model: env_var_string(vars, "QUICK_THINK_LLM", DEFAULT_LLM_MODEL),
            },
            max_tool_iterations: env_var_parse(vars, "MAX_TOOL_ITERATIONS", 25),
            sentiment: env_var(vars, "SENTIMENT_API_KEY").map(|key| SentimentSettings {
                url: env_var_string(vars, "SENTIMENT_API_URL", DEFAULT_SENTIMENT_URL),
                api_key: SecretString::from(key.to_string()),
            }),
        })
    }
}

/// 타임프레임별 기본 조회 기간 (일).
pub fn default_lookback_days(timeframe: &str) -> u32 {
    match timeframe {
        "15m" => 5,
        "1h" => 10,
        "4h" => 15,
        "1d" => 60,
        _ => 10,
    }
}

/// 비어 있지 않은 환경변수 값
fn env_var<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn env_var_string(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    env_var(vars, key).unwrap_or(default).to_string()
}

/// 환경변수 파싱 (실패 시 기본값)
fn env_var_parse<T: FromStr>(vars: &HashMap<String, String>, key: &str, default: T) -> T {
    env_var(vars, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> bool {
    env_var(vars, key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}
