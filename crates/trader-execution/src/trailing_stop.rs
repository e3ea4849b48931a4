//! ATR 기반 손절가 계산.
//!
//! 결정적 공식만 사용합니다.
//!
//! - 초기 손절: 롱 `진입가 - k × ATR`, 숏 `진입가 + k × ATR`
//! - 추적 손절: 롱 `최고가 - k × ATR`, 숏 `최저가 + k × ATR`
//!
//! 손절가는 유리한 방향으로만 이동하고, 변화율이 임계값 이상일 때만 갱신하며,
//! 기준가 대비 거리가 심볼별 허용 범위 안에 있어야 합니다.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;
use trader_core::{to_exchange_symbol, PositionSide};

/// 심볼별 손절 파라미터.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStopConfig {
    /// 초기 손절 ATR 기간
    pub initial_atr_period: usize,
    pub initial_atr_multiplier: Decimal,
    /// 추적 손절 ATR 기간
    pub trailing_atr_period: usize,
    pub trailing_atr_multiplier: Decimal,
    /// 갱신 최소 변화율 (%)
    pub update_threshold_pct: Decimal,
    /// 기준가 대비 최소 손절 거리 (%)
    pub min_distance_pct: Decimal,
    /// 기준가 대비 최대 손절 거리 (%)
    pub max_distance_pct: Decimal,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            initial_atr_period: 3,
            initial_atr_multiplier: dec!(2.5),
            trailing_atr_period: 3,
            trailing_atr_multiplier: dec!(2.5),
            update_threshold_pct: dec!(0.3),
            min_distance_pct: dec!(0.5),
            max_distance_pct: dec!(5.0),
        }
    }
}

impl TrailingStopConfig {
    /// 최대 손절 거리 설정 (빌더 패턴).
    pub fn with_max_distance(mut self, pct: Decimal) -> Self {
        self.max_distance_pct = pct;
        self
    }
}

/// ATR 손절가 계산기.
#[derive(Debug, Clone)]
pub struct TrailingStopCalculator {
    configs: HashMap<String, TrailingStopConfig>,
    fallback: TrailingStopConfig,
}

impl Default for TrailingStopCalculator {
    /// 주요 심볼 프리셋 포함. 변동성이 큰 심볼일수록 최대 거리가 넓습니다.
    fn default() -> Self {
        let base = TrailingStopConfig::default();
        Self::new(base.clone())
            .with_symbol("BTCUSDT", base.clone().with_max_distance(dec!(6.0)))
            .with_symbol("ETHUSDT", base.clone().with_max_distance(dec!(6.0)))
            .with_symbol("SOLUSDT", base.clone().with_max_distance(dec!(8.0)))
            .with_symbol("BNBUSDT", base.clone().with_max_distance(dec!(7.0)))
            .with_symbol("XRPUSDT", base.with_max_distance(dec!(8.0)))
    }
}

impl TrailingStopCalculator {
    /// 프리셋 없이 모든 심볼에 `fallback` 적용.
    pub fn new(fallback: TrailingStopConfig) -> Self {
        Self {
            configs: HashMap::new(),
            fallback,
        }
    }

    /// 심볼 설정 추가 (빌더 패턴).
    pub fn with_symbol(mut self, symbol: &str, config: TrailingStopConfig) -> Self {
        self.configs.insert(to_exchange_symbol(symbol), config);
        self
    }

    /// 심볼 설정. 없으면 기본 설정.
    pub fn config_for(&self, symbol: &str) -> &TrailingStopConfig {
        self.configs
            .get(&to_exchange_symbol(symbol))
            .unwrap_or(&self.fallback)
    }

    /// 진입 시 초기 손절가. 포지션이 없으면 `None`.
    pub fn initial_stop(
        &self,
        symbol: &str,
        side: PositionSide,
        entry_price: Decimal,
        atr: Decimal,
    ) -> Option<Decimal> {
        let distance = self.config_for(symbol).initial_atr_multiplier * atr;
        offset_against(side, entry_price, distance)
    }

    /// 초기 손절가 중 허용 거리 범위 안인 경우만.
    pub fn checked_initial_stop(
        &self,
        symbol: &str,
        side: PositionSide,
        entry_price: Decimal,
        atr: Decimal,
    ) -> Option<Decimal> {
        let stop = self.initial_stop(symbol, side, entry_price, atr)?;
        self.validate_distance(symbol, side, entry_price, stop)
            .then_some(stop)
    }

    /// 추적 손절가.
    ///
    /// `extreme_price`는 롱이면 진입 후 최고가, 숏이면 최저가.
    pub fn trailing_stop(
        &self,
        symbol: &str,
        side: PositionSide,
        extreme_price: Decimal,
        atr: Decimal,
    ) -> Option<Decimal> {
        let distance = self.config_for(symbol).trailing_atr_multiplier * atr;
        offset_against(side, extreme_price, distance)
    }

    /// 손절가가 유리한 방향(롱은 위, 숏은 아래)으로 움직이는지.
    pub fn is_favorable_update(side: PositionSide, old_stop: Decimal, new_stop: Decimal) -> bool {
        match side {
            PositionSide::Long => new_stop > old_stop,
            PositionSide::Short => new_stop < old_stop,
            PositionSide::None => false,
        }
    }

    /// 변화율이 갱신 임계값 이상인지.
    pub fn should_update(&self, symbol: &str, old_stop: Decimal, new_stop: Decimal) -> bool {
        if old_stop <= Decimal::ZERO {
            return true;
        }
        let change_pct = ((new_stop - old_stop) / old_stop).abs() * dec!(100);
        change_pct >= self.config_for(symbol).update_threshold_pct
    }

    /// 기준가 대비 손절 거리가 허용 범위 안인지.
    pub fn validate_distance(
        &self,
        symbol: &str,
        side: PositionSide,
        reference_price: Decimal,
        stop_price: Decimal,
    ) -> bool {
        if reference_price <= Decimal::ZERO {
            return false;
        }
        let gap = match side {
            PositionSide::Long => reference_price - stop_price,
            PositionSide::Short => stop_price - reference_price,
            PositionSide::None => return false,
        };
        let distance_pct = gap / reference_price * dec!(100);
        let config = self.config_for(symbol);
        let valid =
            distance_pct >= config.min_distance_pct && distance_pct <= config.max_distance_pct;
        if !valid {
            debug!(
                symbol,
                %distance_pct,
                min = %config.min_distance_pct,
                max = %config.max_distance_pct,
                "손절 거리 범위 밖"
            );
        }
        valid
    }

    /// 다음 추적 손절가. 갱신 조건을 모두 만족할 때만 `Some`.
    ///
    /// 유리한 방향 이동, 임계값 이상 변화, 극값 대비 허용 거리.
    pub fn next_stop(
        &self,
        symbol: &str,
        side: PositionSide,
        current_stop: Decimal,
        extreme_price: Decimal,
        atr: Decimal,
    ) -> Option<Decimal> {
        let candidate = self.trailing_stop(symbol, side, extreme_price, atr)?;
        (Self::is_favorable_update(side, current_stop, candidate)
            && self.should_update(symbol, current_stop, candidate)
            && self.validate_distance(symbol, side, extreme_price, candidate))
        .then_some(candidate)
    }
}

/// 포지션에 불리한 방향으로 `distance`만큼 떨어진 가격.
fn offset_against(side: PositionSide, price: Decimal, distance: Decimal) -> Option<Decimal> {
    match side {
        PositionSide::Long => Some(price - distance),
        PositionSide::Short => Some(price + distance),
        PositionSide::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stop() {
        let calc = TrailingStopCalculator::default();
        let cases = [
            ("BTCUSDT", PositionSide::Long, dec!(50000), dec!(500), dec!(48750)),
            ("BTC/USDT", PositionSide::Short, dec!(50000), dec!(500), dec!(51250)),
            ("ETHUSDT", PositionSide::Long, dec!(3000), dec!(50), dec!(2875)),
            ("SOLUSDT", PositionSide::Short, dec!(100), dec!(5), dec!(112.5)),
        ];
        for (symbol, side, entry, atr, expected) in cases {
            assert_eq!(
                calc.initial_stop(symbol, side, entry, atr),
                Some(expected),
                "{symbol} {side}"
            );
        }
        assert_eq!(
            calc.initial_stop("BTCUSDT", PositionSide::None, dec!(50000), dec!(500)),
            None
        );
    }

    #[test]
    fn test_checked_initial_stop_respects_distance() {
        let calc = TrailingStopCalculator::default();
        // 2.5% → 허용
        assert_eq!(
            calc.checked_initial_stop("BTCUSDT", PositionSide::Long, dec!(50000), dec!(500)),
            Some(dec!(48750))
        );
        // 12.5% → SOL 최대 8% 초과
        assert_eq!(
            calc.checked_initial_stop("SOLUSDT", PositionSide::Short, dec!(100), dec!(5)),
            None
        );
    }

    #[test]
    fn test_trailing_stop() {
        let calc = TrailingStopCalculator::default();
        let cases = [
            ("BTCUSDT", PositionSide::Long, dec!(52000), dec!(500), dec!(50750)),
            ("BTCUSDT", PositionSide::Short, dec!(48000), dec!(500), dec!(49250)),
            ("ETHUSDT", PositionSide::Long, dec!(3200), dec!(40), dec!(3100)),
            ("SOLUSDT", PositionSide::Short, dec!(95), dec!(5), dec!(107.5)),
        ];
        for (symbol, side, extreme, atr, expected) in cases {
            assert_eq!(
                calc.trailing_stop(symbol, side, extreme, atr),
                Some(expected),
                "{symbol} {side}"
            );
        }
    }

    #[test]
    fn test_favorable_update() {
        use PositionSide::{Long, Short};
        let cases = [
            (Long, dec!(48000), dec!(49000), true),
            (Long, dec!(49000), dec!(48000), false),
            (Short, dec!(52000), dec!(51000), true),
            (Short, dec!(51000), dec!(52000), false),
            (Long, dec!(50000), dec!(50000), false),
        ];
        for (side, old, new, expected) in cases {
            assert_eq!(
                TrailingStopCalculator::is_favorable_update(side, old, new),
                expected,
                "{side} {old} → {new}"
            );
        }
    }

    #[test]
    fn test_update_threshold() {
        let calc = TrailingStopCalculator::default();
        let cases = [
            ("BTCUSDT", dec!(50000), dec!(50150), true),
            ("BTCUSDT", dec!(50000), dec!(50050), false),
            ("SOLUSDT", dec!(100), dec!(100.3), true),
            ("SOLUSDT", dec!(100), dec!(100.1), false),
        ];
        for (symbol, old, new, expected) in cases {
            assert_eq!(calc.should_update(symbol, old, new), expected, "{symbol} {old} → {new}");
        }
    }

    #[test]
    fn test_validate_distance() {
        let calc = TrailingStopCalculator::default();
        let cases = [
            ("BTCUSDT", PositionSide::Long, dec!(50000), dec!(49000), true),
            ("BTCUSDT", PositionSide::Long, dec!(50000), dec!(49850), false),
            ("BTCUSDT", PositionSide::Long, dec!(50000), dec!(46500), false),
            ("ETHUSDT", PositionSide::Short, dec!(3000), dec!(3090), true),
            ("SOLUSDT", PositionSide::Long, dec!(100), dec!(95), true),
            // 미등록 심볼은 기본 설정 (최대 5%)
            ("DOGEUSDT", PositionSide::Long, dec!(100), dec!(94), false),
        ];
        for (symbol, side, reference, stop, expected) in cases {
            assert_eq!(
                calc.validate_distance(symbol, side, reference, stop),
                expected,
                "{symbol} {side} {reference} / {stop}"
            );
        }
    }

    #[test]
    fn test_config_lookup_normalizes_symbol() {
        let calc = TrailingStopCalculator::default();
        assert_eq!(calc.config_for("BTC/USDT").max_distance_pct, dec!(6.0));
        assert_eq!(calc.config_for("sol/usdt:USDT").max_distance_pct, dec!(8.0));
        assert_eq!(calc.config_for("XYZUSDT").max_distance_pct, dec!(5.0));
        assert_eq!(calc.config_for("XYZUSDT").trailing_atr_multiplier, dec!(2.5));
    }

    #[test]
    fn test_long_trailing_scenario() {
        let calc = TrailingStopCalculator::default();
        let atr = dec!(500);

        let initial = calc
            .checked_initial_stop("BTCUSDT", PositionSide::Long, dec!(50000), atr)
            .unwrap();
        assert_eq!(initial, dec!(48750));

        // 52000 고점: 50750으로 상향
        let first = calc
            .next_stop("BTCUSDT", PositionSide::Long, initial, dec!(52000), atr)
            .unwrap();
        assert_eq!(first, dec!(50750));

        // 53000 고점: 51750으로 상향
        let second = calc
            .next_stop("BTCUSDT", PositionSide::Long, first, dec!(53000), atr)
            .unwrap();
        assert_eq!(second, dec!(51750));

        // 고점이 낮아지면 손절가를 내리지 않음
        assert_eq!(
            calc.next_stop("BTCUSDT", PositionSide::Long, second, dec!(52000), atr),
            None
        );
        // 임계값 미만 변화는 무시
        assert_eq!(
            calc.next_stop("BTCUSDT", PositionSide::Long, second, dec!(53050), atr),
            None
        );
    }
}
