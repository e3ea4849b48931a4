//! 기술적 지표 계산 (`ta` 크레이트).
//!
//! 캔들 종가/고가/저가를 순서대로 지표에 흘려 마지막 값을 사용합니다.

use std::fmt::Write;

use serde::Serialize;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex,
};
use ta::{DataItem, Next};
use trader_exchange::connector::binance::Kline;

use crate::error::AgentError;

/// 지표 계산에 필요한 최소 캔들 수 (EMA 50 기준)
pub const MIN_CANDLES: usize = 50;

/// 마지막 캔들 기준 지표 값.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub rsi14: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub atr14: f64,
}

fn ta_error(e: ta::errors::TaError) -> AgentError {
    AgentError::Tool(format!("지표 계산 실패: {:?}", e))
}

/// 캔들 목록으로 지표 계산.
pub fn calculate(klines: &[Kline]) -> Result<IndicatorSnapshot, AgentError> {
    if klines.len() < MIN_CANDLES {
        return Err(AgentError::NoData(format!(
            "지표 계산에 캔들 {}개 이상 필요 (현재 {}개)",
            MIN_CANDLES,
            klines.len()
        )));
    }

    let mut ema20 = ExponentialMovingAverage::new(20).map_err(ta_error)?;
    let mut ema50 = ExponentialMovingAverage::new(50).map_err(ta_error)?;
    let mut rsi = RelativeStrengthIndex::new(14).map_err(ta_error)?;
    let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(ta_error)?;
    let mut bb = BollingerBands::new(20, 2.0).map_err(ta_error)?;
    let mut atr = AverageTrueRange::new(14).map_err(ta_error)?;

    let mut snapshot = IndicatorSnapshot {
        close: 0.0,
        ema20: 0.0,
        ema50: 0.0,
        rsi14: 0.0,
        macd: 0.0,
        macd_signal: 0.0,
        macd_histogram: 0.0,
        bb_upper: 0.0,
        bb_middle: 0.0,
        bb_lower: 0.0,
        atr14: 0.0,
    };

    for kline in klines {
        let close = kline.close;
        let item = data_item(kline)?;

        let macd_out = macd.next(close);
        let bb_out = bb.next(close);
        snapshot = IndicatorSnapshot {
            close,
            ema20: ema20.next(close),
            ema50: ema50.next(close),
            rsi14: rsi.next(close),
            macd: macd_out.macd,
            macd_signal: macd_out.signal,
            macd_histogram: macd_out.histogram,
            bb_upper: bb_out.upper,
            bb_middle: bb_out.average,
            bb_lower: bb_out.lower,
            atr14: atr.next(&item),
        };
    }

    Ok(snapshot)
}

/// 마지막 캔들 기준 ATR(`period`).
pub fn average_true_range(klines: &[Kline], period: usize) -> Result<f64, AgentError> {
    if klines.len() <= period {
        return Err(AgentError::NoData(format!(
            "ATR({})에 캔들 {}개 초과 필요 (현재 {}개)",
            period,
            period,
            klines.len()
        )));
    }

    let mut atr = AverageTrueRange::new(period).map_err(ta_error)?;
    let mut value = 0.0;
    for kline in klines {
        value = atr.next(&data_item(kline)?);
    }
    Ok(value)
}

fn data_item(kline: &Kline) -> Result<DataItem, AgentError> {
    DataItem::builder()
        .open(kline.open)
        .high(kline.high)
        .low(kline.low)
        .close(kline.close)
        .volume(kline.volume)
        .build()
        .map_err(ta_error)
}

impl IndicatorSnapshot {
    /// 볼린저 밴드 내 위치 (0 = 하단, 1 = 상단).
    pub fn bollinger_position(&self) -> Option<f64> {
        let width = self.bb_upper - self.bb_lower;
        (width > 0.0).then(|| (self.close - self.bb_lower) / width)
    }

    fn trend(&self) -> &'static str {
        if self.close > self.ema20 && self.ema20 > self.ema50 {
            "상승 추세 (종가 > EMA20 > EMA50)"
        } else if self.close < self.ema20 && self.ema20 < self.ema50 {
            "하락 추세 (종가 < EMA20 < EMA50)"
        } else {
            "혼조 / 횡보"
        }
    }

    fn rsi_zone(&self) -> &'static str {
        if self.rsi14 >= 70.0 {
            "과매수"
        } else if self.rsi14 <= 30.0 {
            "과매도"
        } else {
            "중립"
        }
    }

    /// 추론 단계용 보고서.
    pub fn report(&self, symbol: &str, timeframe: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {} 기술적 지표 ({})", symbol, timeframe);
        let _ = writeln!(out, "- 종가: {:.2}", self.close);
        let _ = writeln!(out, "- EMA20: {:.2} / EMA50: {:.2}", self.ema20, self.ema50);
        let _ = writeln!(out, "- 추세: {}", self.trend());
        let _ = writeln!(out, "- RSI(14): {:.2} ({})", self.rsi14, self.rsi_zone());
        let _ = writeln!(
            out,
            "- MACD(12,26,9): {:.4} / 시그널 {:.4} / 히스토그램 {:+.4}",
            self.macd, self.macd_signal, self.macd_histogram
        );
        let _ = writeln!(
            out,
            "- 볼린저(20,2): 상단 {:.2} / 중단 {:.2} / 하단 {:.2}",
            self.bb_upper, self.bb_middle, self.bb_lower
        );
        if let Some(position) = self.bollinger_position() {
            let _ = writeln!(out, "  밴드 내 위치: {:.0}%", position * 100.0);
        }
        let _ = writeln!(
            out,
            "- ATR(14): {:.2} (종가 대비 {:.2}%)",
            self.atr14,
            if self.close > 0.0 {
                self.atr14 / self.close * 100.0
            } else {
                0.0
            }
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: impl IntoIterator<Item = f64>) -> Vec<Kline> {
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| Kline {
                open_time: i as i64 * 3_600_000,
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_requires_minimum_candles() {
        let klines = series((0..10).map(|i| 100.0 + i as f64));
        assert!(matches!(calculate(&klines), Err(AgentError::NoData(_))));
    }

    #[test]
    fn test_uptrend_indicators() {
        let klines = series((0..120).map(|i| 100.0 + i as f64));
        let snapshot = calculate(&klines).unwrap();

        assert_eq!(snapshot.close, 219.0);
        assert!(snapshot.ema20 > snapshot.ema50);
        assert!(snapshot.rsi14 > 70.0);
        assert!(snapshot.macd > 0.0);
        assert!(snapshot.atr14 > 0.0);

        let report = snapshot.report("BTC/USDT", "1h");
        assert!(report.contains("상승 추세"));
        assert!(report.contains("과매수"));
    }

    #[test]
    fn test_downtrend_classification() {
        let klines = series((0..120).map(|i| 500.0 - i as f64 * 2.0));
        let snapshot = calculate(&klines).unwrap();

        assert!(snapshot.rsi14 < 30.0);
        assert!(snapshot.report("ETH/USDT", "4h").contains("하락 추세"));
    }

    #[test]
    fn test_short_period_atr() {
        // 고가-저가 폭 4, 종가 변화 1 → 실제 범위 4로 일정
        let klines = series((0..20).map(|i| 100.0 + i as f64));
        let atr = average_true_range(&klines, 3).unwrap();
        assert!((atr - 4.0).abs() < 1e-9, "{atr}");

        assert!(matches!(
            average_true_range(&klines[..3], 3),
            Err(AgentError::NoData(_))
        ));
    }
}
