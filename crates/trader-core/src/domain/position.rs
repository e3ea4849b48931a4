//! 선물 포지션 타입.
//!
//! - `ExchangePosition` - 거래소가 반환하는 원시 포지션 레코드 (필드 대부분 선택)
//! - `PositionSnapshot` - 정규화된 포지션 스냅샷 (결정 사이클 1회 동안만 유효)
//! - `PositionMode` / `PositionModeSetting` - 단방향/양방향(헤지) 모드

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// 포지션 방향
// =============================================================================

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    /// 롱
    Long,
    /// 숏
    Short,
    /// 포지션 없음
    None,
}

impl PositionSide {
    /// 모든 방향 (테이블 기반 테스트용).
    pub const ALL: [PositionSide; 3] = [PositionSide::None, PositionSide::Long, PositionSide::Short];

    /// 반대 방향. `None`은 그대로.
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
            PositionSide::None => PositionSide::None,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
            PositionSide::None => write!(f, "NONE"),
        }
    }
}

// =============================================================================
// 원시 포지션 레코드
// =============================================================================

/// 거래소가 반환한 원시 포지션 레코드.
///
/// 거래소마다 채우는 필드가 다릅니다. 부호 있는 수량은 `position_amt`에,
/// 부호 없는 계약 수는 `contracts` + `side`에 들어옵니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangePosition {
    /// 거래소 표기 심볼 (예: `BTC/USDT:USDT`, `BTCUSDT`)
    pub symbol: String,
    /// 부호 있는 포지션 수량 (양수 롱, 음수 숏)
    pub position_amt: Option<Decimal>,
    /// 부호 없는 계약 수
    pub contracts: Option<Decimal>,
    /// 방향 문자열 (`long` / `short`)
    pub side: Option<String>,
    /// 헤지 모드 레그 (`LONG` / `SHORT` / `BOTH`)
    pub position_side: Option<String>,
    /// 평균 진입가
    pub entry_price: Option<Decimal>,
    /// 미실현 손익
    pub unrealized_pnl: Option<Decimal>,
    /// 레버리지
    pub leverage: Option<Decimal>,
    /// 청산가
    pub liquidation_price: Option<Decimal>,
    /// 마크 가격
    pub mark_price: Option<Decimal>,
}

impl ExchangePosition {
    /// 부호 있는 수량 계산.
    ///
    /// `position_amt`가 있으면 그대로 사용하고, 없으면 `contracts`를
    /// `side == "short"`일 때 음수로 변환합니다. 둘 다 없으면 0.
    pub fn signed_size(&self) -> Decimal {
        if let Some(amt) = self.position_amt {
            return amt;
        }
        let contracts = self.contracts.unwrap_or(Decimal::ZERO);
        match self.side.as_deref() {
            Some(side) if side.eq_ignore_ascii_case("short") => -contracts.abs(),
            _ => contracts,
        }
    }
}

// =============================================================================
// 정규화된 스냅샷
// =============================================================================

/// 정규화된 포지션 스냅샷.
///
/// 불변 조건: `side == None`이면 `size == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// 심볼 (정규화된 표기)
    pub symbol: String,
    /// 방향
    pub side: PositionSide,
    /// 수량 (항상 0 이상)
    pub size: Decimal,
    /// 평균 진입가
    pub entry_price: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 레버리지
    pub leverage: u32,
    /// 청산가
    pub liquidation_price: Decimal,
    /// 마크 가격 (거래소가 제공하지 않으면 0)
    #[serde(default)]
    pub mark_price: Decimal,
}

impl PositionSnapshot {
    /// 포지션 없음 스냅샷.
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            side: PositionSide::None,
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            leverage: 1,
            liquidation_price: Decimal::ZERO,
            mark_price: Decimal::ZERO,
        }
    }

    /// 부호 있는 수량으로부터 방향과 크기를 설정한 스냅샷.
    pub fn from_signed_size(symbol: impl Into<String>, signed_size: Decimal) -> Self {
        let side = if signed_size > Decimal::ZERO {
            PositionSide::Long
        } else if signed_size < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::None
        };
        Self {
            side,
            size: signed_size.abs(),
            ..Self::flat(symbol)
        }
    }

    /// 포지션이 없는지 여부.
    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::None || self.size.is_zero()
    }

    /// 부호 있는 수량.
    pub fn signed_size(&self) -> Decimal {
        match self.side {
            PositionSide::Long => self.size,
            PositionSide::Short => -self.size,
            PositionSide::None => Decimal::ZERO,
        }
    }

    /// 진입가 대비 손익률 (%).
    ///
    /// 진입가나 현재가가 0이면 `None`.
    pub fn pnl_percent(&self, current_price: Decimal) -> Option<Decimal> {
        if self.entry_price.is_zero() || current_price.is_zero() {
            return None;
        }
        let change = (current_price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED;
        match self.side {
            PositionSide::Long => Some(change),
            PositionSide::Short => Some(-change),
            PositionSide::None => None,
        }
    }

    /// 현재가 대비 청산가까지 거리 (%). 이미 청산가를 넘었으면 음수.
    pub fn liquidation_distance_percent(&self, current_price: Decimal) -> Option<Decimal> {
        if self.liquidation_price.is_zero() || current_price.is_zero() {
            return None;
        }
        let gap = match self.side {
            PositionSide::Long => current_price - self.liquidation_price,
            PositionSide::Short => self.liquidation_price - current_price,
            PositionSide::None => return None,
        };
        Some(gap / current_price * Decimal::ONE_HUNDRED)
    }
}

// =============================================================================
// 포지션 모드
// =============================================================================

/// 계정의 포지션 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// 단방향 모드 (심볼당 포지션 1개)
    OneWay,
    /// 양방향(헤지) 모드 (롱/숏 레그 별도)
    Hedge,
}

impl std::fmt::Display for PositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionMode::OneWay => write!(f, "oneway"),
            PositionMode::Hedge => write!(f, "hedge"),
        }
    }
}

/// 설정에서 지정하는 포지션 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionModeSetting {
    /// 거래소에서 자동 감지
    #[default]
    Auto,
    /// 단방향 강제
    OneWay,
    /// 헤지 강제
    Hedge,
}

impl PositionModeSetting {
    /// 명시적으로 지정된 모드. `Auto`면 `None`.
    pub fn explicit(&self) -> Option<PositionMode> {
        match self {
            PositionModeSetting::Auto => None,
            PositionModeSetting::OneWay => Some(PositionMode::OneWay),
            PositionModeSetting::Hedge => Some(PositionMode::Hedge),
        }
    }
}

/// 포지션 모드 설정 파싱 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("지원하지 않는 포지션 모드: {0} (auto, oneway, hedge 중 하나)")]
pub struct ParsePositionModeError(pub String);

impl FromStr for PositionModeSetting {
    type Err = ParsePositionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(PositionModeSetting::Auto),
            "oneway" | "one_way" | "one-way" => Ok(PositionModeSetting::OneWay),
            "hedge" | "hedged" => Ok(PositionModeSetting::Hedge),
            _ => Err(ParsePositionModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_size_prefers_position_amt() {
        let raw = ExchangePosition {
            position_amt: Some(dec!(-0.3)),
            contracts: Some(dec!(0.5)),
            side: Some("long".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.signed_size(), dec!(-0.3));
    }

    #[test]
    fn test_signed_size_from_contracts() {
        let short = ExchangePosition {
            contracts: Some(dec!(0.5)),
            side: Some("short".to_string()),
            ..Default::default()
        };
        assert_eq!(short.signed_size(), dec!(-0.5));

        let long = ExchangePosition {
            contracts: Some(dec!(0.5)),
            side: Some("long".to_string()),
            ..Default::default()
        };
        assert_eq!(long.signed_size(), dec!(0.5));

        assert_eq!(ExchangePosition::default().signed_size(), Decimal::ZERO);
    }

    #[test]
    fn test_snapshot_from_signed_size() {
        let short = PositionSnapshot::from_signed_size("BTC/USDT", dec!(-1.5));
        assert_eq!(short.side, PositionSide::Short);
        assert_eq!(short.size, dec!(1.5));
        assert_eq!(short.signed_size(), dec!(-1.5));

        let flat = PositionSnapshot::from_signed_size("BTC/USDT", Decimal::ZERO);
        assert_eq!(flat.side, PositionSide::None);
        assert!(flat.is_flat());
    }

    #[test]
    fn test_pnl_percent_by_side() {
        let mut snapshot = PositionSnapshot::from_signed_size("BTC/USDT", dec!(1));
        snapshot.entry_price = dec!(100);
        assert_eq!(snapshot.pnl_percent(dec!(110)), Some(dec!(10)));

        snapshot.side = PositionSide::Short;
        assert_eq!(snapshot.pnl_percent(dec!(110)), Some(dec!(-10)));
        assert_eq!(snapshot.pnl_percent(Decimal::ZERO), None);
    }

    #[test]
    fn test_liquidation_distance() {
        let mut snapshot = PositionSnapshot::from_signed_size("BTC/USDT", dec!(1));
        snapshot.liquidation_price = dec!(95);
        assert_eq!(snapshot.liquidation_distance_percent(dec!(100)), Some(dec!(5)));

        snapshot.side = PositionSide::Short;
        snapshot.liquidation_price = dec!(108);
        assert_eq!(snapshot.liquidation_distance_percent(dec!(100)), Some(dec!(8)));
    }

    #[test]
    fn test_position_mode_setting_parse() {
        assert_eq!("auto".parse(), Ok(PositionModeSetting::Auto));
        assert_eq!("OneWay".parse(), Ok(PositionModeSetting::OneWay));
        assert_eq!("hedge".parse(), Ok(PositionModeSetting::Hedge));
        assert!("both".parse::<PositionModeSetting>().is_err());
        assert_eq!(PositionModeSetting::Hedge.explicit(), Some(PositionMode::Hedge));
        assert_eq!(PositionModeSetting::Auto.explicit(), None);
    }
}
