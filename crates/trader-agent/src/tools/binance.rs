//! Binance 선물 공개 API 기반 분석 도구.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::debug;
use trader_exchange::connector::binance::{BinanceFuturesClient, Kline};

use super::indicators::{self, MIN_CANDLES};
use super::{AnalysisTool, ToolRegistry};
use crate::error::AgentError;

/// 응답 캔들 최대 개수 (Binance 제한)
const MAX_KLINES: u32 = 1500;

/// 지표 계산 시 최소 확보 캔들 수 (워밍업 포함)
const INDICATOR_WARMUP: u32 = 200;

/// 호가 조회 깊이
const ORDER_BOOK_LIMIT: u32 = 20;

/// 보고서에 표시할 최근 캔들 수
const RECENT_CANDLES: usize = 10;

// ============================================================================
// 데이터 소스
// ============================================================================

/// 최근 종가와 ATR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtrReading {
    pub close: Decimal,
    pub atr: Decimal,
}

fn to_decimal(value: f64) -> Result<Decimal, AgentError> {
    // f64 Display는 최단 왕복 표현이므로 응답 문자열의 자릿수가 유지됨
    value
        .to_string()
        .parse()
        .map_err(|_| AgentError::Parse(format!("가격 변환 실패: {}", value)))
}

/// 도구 공통 설정: 클라이언트 + 기본 심볼/타임프레임/조회 기간.
#[derive(Debug, Clone)]
pub struct MarketDataSource {
    client: Arc<BinanceFuturesClient>,
    symbol: String,
    timeframe: String,
    lookback_days: u32,
}

impl MarketDataSource {
    pub fn new(
        client: Arc<BinanceFuturesClient>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        lookback_days: u32,
    ) -> Self {
        Self {
            client,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            lookback_days: lookback_days.max(1),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// 기본 심볼/타임프레임의 최근 종가와 ATR(`period`).
    ///
    /// 종가의 소수 자릿수는 거래소 응답을 따르므로 손절가 반올림 기준으로 쓸 수 있습니다.
    pub async fn latest_atr(&self, period: usize) -> Result<AtrReading, AgentError> {
        let limit = (period as u32).saturating_mul(10).clamp(MIN_CANDLES as u32, MAX_KLINES);
        let klines = self
            .client
            .klines(&self.symbol, &self.timeframe, limit)
            .await?;
        let atr = indicators::average_true_range(&klines, period)?;
        let close = klines
            .last()
            .map(|k| k.close)
            .ok_or_else(|| AgentError::NoData(format!("{} 캔들 없음", self.symbol)))?;

        Ok(AtrReading {
            close: to_decimal(close)?,
            atr: to_decimal(atr)?,
        })
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    /// 조회 기간을 덮는 캔들 수 (최대 1500).
    pub fn kline_limit(&self, timeframe: &str) -> Result<u32, AgentError> {
        let minutes = interval_minutes(timeframe).ok_or_else(|| {
            AgentError::InvalidArguments(format!("지원하지 않는 타임프레임: {}", timeframe))
        })?;
        let candles = u64::from(self.lookback_days) * 1440 / minutes;
        Ok(candles.clamp(1, u64::from(MAX_KLINES)) as u32)
    }

    /// 인자의 `symbol`/`timeframe`으로 기본값 덮어쓰기.
    fn resolve(&self, arguments: &serde_json::Value) -> Result<(String, String), AgentError> {
        let symbol = optional_str(arguments, "symbol")?.unwrap_or(&self.symbol);
        let timeframe = optional_str(arguments, "timeframe")?.unwrap_or(&self.timeframe);
        Ok((symbol.to_string(), timeframe.to_string()))
    }

    fn resolve_symbol(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        Ok(optional_str(arguments, "symbol")?
            .unwrap_or(&self.symbol)
            .to_string())
    }
}

/// 타임프레임 문자열 → 분. (`15m`, `1h`, `4h`, `1d`, `1w` 등)
///
/// 모델이 넘긴 임의의 문자열이 들어올 수 있으므로 해석할 수 없으면 `None`.
fn interval_minutes(timeframe: &str) -> Option<u64> {
    let (unit_at, unit) = timeframe.char_indices().next_back()?;
    let unit_minutes: u64 = match unit {
        'm' => 1,
        'h' => 60,
        'd' => 1440,
        'w' => 10080,
        _ => return None,
    };
    let count: u64 = timeframe[..unit_at].parse().ok().filter(|c| *c > 0)?;
    count.checked_mul(unit_minutes)
}

fn optional_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<Option<&'a str>, AgentError> {
    match arguments.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(AgentError::InvalidArguments(format!(
            "{}는 문자열이어야 합니다: {}",
            key, other
        ))),
    }
}

fn symbol_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": {"type": "string", "description": "거래 심볼 (예: BTC/USDT). 생략 시 기본 심볼"}
        }
    })
}

fn candle_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": {"type": "string", "description": "거래 심볼 (예: BTC/USDT). 생략 시 기본 심볼"},
            "timeframe": {"type": "string", "description": "캔들 간격 (예: 15m, 1h, 4h, 1d). 생략 시 기본값"}
        }
    })
}

fn format_time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

// ============================================================================
// 시장 분석 도구
// ============================================================================

/// OHLCV 캔들 요약 (`get_crypto_data`).
pub struct CryptoDataTool {
    source: MarketDataSource,
}

impl CryptoDataTool {
    pub fn new(source: MarketDataSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisTool for CryptoDataTool {
    fn name(&self) -> &str {
        "get_crypto_data"
    }

    fn description(&self) -> &str {
        "선물 OHLCV 캔들 데이터 조회 (기간 요약 + 최근 캔들)"
    }

    fn parameters(&self) -> serde_json::Value {
        candle_schema()
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let (symbol, timeframe) = self.source.resolve(arguments)?;
        let limit = self.source.kline_limit(&timeframe)?;
        let klines = self.source.client.klines(&symbol, &timeframe, limit).await?;
        debug!(symbol = %symbol, timeframe = %timeframe, count = klines.len(), "캔들 조회");
        format_candles(&symbol, &timeframe, &klines)
    }
}

fn format_candles(symbol: &str, timeframe: &str, klines: &[Kline]) -> Result<String, AgentError> {
    let (Some(first), Some(last)) = (klines.first(), klines.last()) else {
        return Err(AgentError::NoData(format!("{} 캔들 데이터 없음", symbol)));
    };

    let high = klines.iter().map(|k| k.high).fold(f64::MIN, f64::max);
    let low = klines.iter().map(|k| k.low).fold(f64::MAX, f64::min);
    let volume: f64 = klines.iter().map(|k| k.volume).sum();
    let change = if first.open > 0.0 {
        (last.close - first.open) / first.open * 100.0
    } else {
        0.0
    };

    let mut out = String::new();
    let _ = writeln!(out, "# {} 캔들 데이터 ({}, {}개)", symbol, timeframe, klines.len());
    let _ = writeln!(
        out,
        "- 기간: {} ~ {}",
        format_time(first.open_time),
        format_time(last.open_time)
    );
    let _ = writeln!(out, "- 시가 {:.2} → 종가 {:.2} ({:+.2}%)", first.open, last.close, change);
    let _ = writeln!(out, "- 최고 {:.2} / 최저 {:.2}", high, low);
    let _ = writeln!(out, "- 총 거래량: {:.2}", volume);
    let _ = writeln!(out);
    let _ = writeln!(out, "## 최근 캔들");
    let _ = writeln!(out, "시각 | 시가 | 고가 | 저가 | 종가 | 거래량");
    let start = klines.len().saturating_sub(RECENT_CANDLES);
    for k in &klines[start..] {
        let _ = writeln!(
            out,
            "{} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2}",
            format_time(k.open_time),
            k.open,
            k.high,
            k.low,
            k.close,
            k.volume
        );
    }
    Ok(out)
}

/// 기술적 지표 (`get_crypto_indicators`).
pub struct IndicatorTool {
    source: MarketDataSource,
}

impl IndicatorTool {
    pub fn new(source: MarketDataSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisTool for IndicatorTool {
    fn name(&self) -> &str {
        "get_crypto_indicators"
    }

    fn description(&self) -> &str {
        "기술적 지표 계산: RSI(14), MACD(12,26,9), EMA(20/50), 볼린저 밴드(20,2), ATR(14)"
    }

    fn parameters(&self) -> serde_json::Value {
        candle_schema()
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let (symbol, timeframe) = self.source.resolve(arguments)?;
        let limit = self
            .source
            .kline_limit(&timeframe)?
            .max(INDICATOR_WARMUP)
            .max(MIN_CANDLES as u32)
            .min(MAX_KLINES);
        let klines = self.source.client.klines(&symbol, &timeframe, limit).await?;
        let snapshot = indicators::calculate(&klines)?;
        Ok(snapshot.report(&symbol, &timeframe))
    }
}

// ============================================================================
// 선물 시장 분석 도구
// ============================================================================

/// 펀딩비 (`get_crypto_funding_rate`).
pub struct FundingRateTool {
    source: MarketDataSource,
}

impl FundingRateTool {
    pub fn new(source: MarketDataSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisTool for FundingRateTool {
    fn name(&self) -> &str {
        "get_crypto_funding_rate"
    }

    fn description(&self) -> &str {
        "현재 펀딩비, 마크/인덱스 가격, 다음 펀딩 시각 조회"
    }

    fn parameters(&self) -> serde_json::Value {
        symbol_schema()
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let symbol = self.source.resolve_symbol(arguments)?;
        let info = self.source.client.premium_index(&symbol).await?;

        let rate_pct = (info.last_funding_rate * dec!(100)).round_dp(4);
        // 8시간 주기, 하루 3회
        let annualized = (info.last_funding_rate * dec!(3) * dec!(365) * dec!(100)).round_dp(2);
        let basis = info.mark_price - info.index_price;

        let mut out = String::new();
        let _ = writeln!(out, "# {} 펀딩비", symbol);
        let _ = writeln!(out, "- 펀딩비: {}% (연환산 {}%)", rate_pct, annualized);
        let _ = writeln!(out, "- 마크 가격: {}", info.mark_price);
        let _ = writeln!(out, "- 인덱스 가격: {} (베이시스 {})", info.index_price, basis);
        let _ = writeln!(out, "- 다음 펀딩: {}", format_time(info.next_funding_time));
        let _ = writeln!(out, "- 해석: {}", funding_interpretation(info.last_funding_rate));
        Ok(out)
    }
}

fn funding_interpretation(rate: Decimal) -> &'static str {
    if rate >= dec!(0.0005) {
        "롱 과열 (롱이 숏에 높은 비용 지불)"
    } else if rate > dec!(0.0001) {
        "롱 우위"
    } else if rate <= dec!(-0.0005) {
        "숏 과열 (숏이 롱에 높은 비용 지불)"
    } else if rate < Decimal::ZERO {
        "숏 우위"
    } else {
        "중립"
    }
}

/// 호가 깊이 (`get_crypto_order_book`).
pub struct OrderBookTool {
    source: MarketDataSource,
}

impl OrderBookTool {
    pub fn new(source: MarketDataSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisTool for OrderBookTool {
    fn name(&self) -> &str {
        "get_crypto_order_book"
    }

    fn description(&self) -> &str {
        "호가창 상위 20단계: 스프레드, 매수/매도 잔량 비율"
    }

    fn parameters(&self) -> serde_json::Value {
        symbol_schema()
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let symbol = self.source.resolve_symbol(arguments)?;
        let book = self.source.client.depth(&symbol, ORDER_BOOK_LIMIT).await?;
        if book.bids.is_empty() && book.asks.is_empty() {
            return Err(AgentError::NoData(format!("{} 호가 없음", symbol)));
        }

        let bid_volume: Decimal = book.bids.iter().map(|l| l.quantity).sum();
        let ask_volume: Decimal = book.asks.iter().map(|l| l.quantity).sum();

        let mut out = String::new();
        let _ = writeln!(out, "# {} 호가 (상위 {}단계)", symbol, ORDER_BOOK_LIMIT);
        if let (Some(bid), Some(ask)) = (book.bids.first(), book.asks.first()) {
            let _ = writeln!(out, "- 최우선 매수 {} / 최우선 매도 {}", bid.price, ask.price);
        }
        if let Some(spread) = book.spread() {
            let _ = writeln!(out, "- 스프레드: {}", spread);
        }
        let _ = writeln!(out, "- 매수 잔량 {} / 매도 잔량 {}", bid_volume, ask_volume);
        if !ask_volume.is_zero() {
            let _ = writeln!(out, "- 매수/매도 잔량 비: {}", (bid_volume / ask_volume).round_dp(3));
        }
        if let Some(ratio) = book.bid_ratio() {
            let pressure = if ratio > dec!(0.6) {
                "매수 우위"
            } else if ratio < dec!(0.4) {
                "매도 우위"
            } else {
                "균형"
            };
            let _ = writeln!(
                out,
                "- 매수 비중: {}% ({})",
                (ratio * dec!(100)).round_dp(1),
                pressure
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## 상위 5단계");
        let _ = writeln!(out, "매수 가격 | 수량 || 매도 가격 | 수량");
        for (bid, ask) in book.bids.iter().zip(book.asks.iter()).take(5) {
            let _ = writeln!(
                out,
                "{} | {} || {} | {}",
                bid.price, bid.quantity, ask.price, ask.quantity
            );
        }
        Ok(out)
    }
}

/// 24시간 시세 + 미결제약정 (`get_crypto_market_info`).
pub struct MarketInfoTool {
    source: MarketDataSource,
}

impl MarketInfoTool {
    pub fn new(source: MarketDataSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisTool for MarketInfoTool {
    fn name(&self) -> &str {
        "get_crypto_market_info"
    }

    fn description(&self) -> &str {
        "24시간 시세 통계와 미결제약정 조회"
    }

    fn parameters(&self) -> serde_json::Value {
        symbol_schema()
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String, AgentError> {
        let symbol = self.source.resolve_symbol(arguments)?;
        let ticker = self.source.client.ticker_24h(&symbol).await?;
        let open_interest = self.source.client.open_interest(&symbol).await?;

        let mut out = String::new();
        let _ = writeln!(out, "# {} 24시간 시장 정보", symbol);
        let _ = writeln!(out, "- 최근가: {}", ticker.last_price);
        let _ = writeln!(
            out,
            "- 24h 변동: {} ({}%)",
            ticker.price_change, ticker.price_change_percent
        );
        let _ = writeln!(out, "- 24h 고가 {} / 저가 {}", ticker.high_price, ticker.low_price);
        let _ = writeln!(
            out,
            "- 24h 거래량: {} (거래대금 {})",
            ticker.volume, ticker.quote_volume
        );
        let _ = writeln!(out, "- 미결제약정: {}", open_interest);
        if !ticker.last_price.is_zero() {
            let _ = writeln!(
                out,
                "- 미결제약정 명목가: {}",
                (open_interest * ticker.last_price).round_dp(0)
            );
        }
        Ok(out)
    }
}

// ============================================================================
// 단계별 레지스트리
// ============================================================================

/// 시장 분석 단계 도구.
pub fn market_tools(source: &MarketDataSource) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(CryptoDataTool::new(source.clone())))
        .with_tool(Arc::new(IndicatorTool::new(source.clone())))
}

/// 선물 시장 분석 단계 도구.
pub fn crypto_tools(source: &MarketDataSource) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(FundingRateTool::new(source.clone())))
        .with_tool(Arc::new(OrderBookTool::new(source.clone())))
        .with_tool(Arc::new(MarketInfoTool::new(source.clone())))
}
