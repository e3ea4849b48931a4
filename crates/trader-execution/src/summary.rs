//! 트레이더 단계용 계정/포지션 요약 텍스트.

use std::fmt::Write;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{AccountBalance, PositionSnapshot};

/// 청산 위험 경고 기준 (%)
const LIQUIDATION_WARNING_PERCENT: Decimal = dec!(10);
/// 손절 검토 권고 기준 (%)
const LOSS_ADVICE_PERCENT: Decimal = dec!(-5);
/// 익절 검토 권고 기준 (%)
const PROFIT_ADVICE_PERCENT: Decimal = dec!(3);

/// 계정 + 포지션 요약.
///
/// `current_price`가 0이면 진입가를 현재가로 사용합니다.
pub fn format_position_summary(
    symbol: &str,
    balance: &AccountBalance,
    position: Option<&PositionSnapshot>,
    current_price: Decimal,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} 계정 상태 ===", symbol);
    let _ = writeln!(out, "- 가용 잔고: {:.2} {}", balance.free, balance.asset);
    let _ = writeln!(out, "- 총 잔고: {:.2} {}", balance.total, balance.asset);
    let _ = writeln!(out, "- 사용 증거금: {:.2} {}", balance.used, balance.asset);
    out.push('\n');

    let position = match position {
        Some(p) if !p.is_flat() => p,
        _ => {
            let _ = writeln!(out, "=== 현재 포지션 ===");
            let _ = writeln!(out, "- 포지션 없음");
            let _ = writeln!(
                out,
                "\n참고: 포지션이 없으므로 신규 진입(BUY/SELL) 또는 관망(HOLD)을 결정하십시오."
            );
            return out;
        }
    };

    let price = if current_price.is_zero() {
        position.entry_price
    } else {
        current_price
    };

    let _ = writeln!(out, "=== 현재 포지션 ===");
    let _ = writeln!(out, "- 방향: {}", position.side);
    let _ = writeln!(out, "- 수량: {}", position.size.normalize());
    let _ = writeln!(out, "- 진입가: {:.2}", position.entry_price);
    let _ = writeln!(out, "- 현재가: {:.2}", price);
    let _ = writeln!(out, "- 레버리지: {}x", position.leverage);

    let pnl_percent = position.pnl_percent(price);
    match pnl_percent {
        Some(pct) => {
            let _ = writeln!(
                out,
                "- 미실현 손익: {} {} ({}%)",
                signed(position.unrealized_pnl),
                balance.asset,
                signed(pct)
            );
        }
        None => {
            let _ = writeln!(
                out,
                "- 미실현 손익: {} {}",
                signed(position.unrealized_pnl),
                balance.asset
            );
        }
    }

    if !position.liquidation_price.is_zero() {
        let _ = writeln!(out, "- 청산가: {:.2}", position.liquidation_price);
        if let Some(distance) = position.liquidation_distance_percent(price) {
            if distance < LIQUIDATION_WARNING_PERCENT {
                let _ = writeln!(
                    out,
                    "  ⚠ 경고: 청산가까지 {:.2}% 남음, 청산 위험이 높습니다",
                    distance
                );
            }
        }
    }

    let advice = match pnl_percent {
        Some(pct) if pct < LOSS_ADVICE_PERCENT => {
            "손실이 5%를 넘었습니다. 손절(CLOSE) 또는 반대 방향 전환을 검토하십시오."
        }
        Some(pct) if pct > PROFIT_ADVICE_PERCENT => {
            "수익이 3%를 넘었습니다. 일부 익절 또는 유지(HOLD)를 검토하십시오."
        }
        _ => "포지션 상태 정상. 시장 변화에 따라 유지 또는 조정하십시오.",
    };
    let _ = writeln!(
        out,
        "\n참고: 같은 방향 재진입은 차단됩니다. 유지하려면 HOLD, 청산하려면 CLOSE를 선택하십시오."
    );
    let _ = writeln!(out, "권고: {}", advice);
    out
}

/// 거래소 조회 실패 시 요약.
pub fn format_summary_unavailable(symbol: &str, error: &str) -> String {
    format!(
        "=== {} 계정 상태 ===\n\
         계정/포지션 정보를 조회할 수 없습니다: {}\n\
         가능한 원인: 네트워크 장애, API 키 권한 부족, 거래소 점검\n\
         권고: 현재 포지션이 없다고 가정하고 신규 진입으로 판단하십시오.\n",
        symbol, error
    )
}

/// 부호를 붙인 소수점 2자리 표기.
fn signed(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("{:.2}", rounded)
    } else {
        format!("+{:.2}", rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::PositionSide;

    fn balance() -> AccountBalance {
        AccountBalance {
            asset: "USDT".to_string(),
            total: dec!(10250.5),
            free: dec!(9000),
            used: dec!(1250.5),
            unrealized_pnl: dec!(250.5),
        }
    }

    fn long(entry: Decimal, liquidation: Decimal) -> PositionSnapshot {
        let mut snapshot = PositionSnapshot::from_signed_size("BTC/USDT", dec!(0.5));
        snapshot.entry_price = entry;
        snapshot.liquidation_price = liquidation;
        snapshot.leverage = 10;
        snapshot
    }

    #[test]
    fn test_flat_summary() {
        let text = format_position_summary("BTC/USDT", &balance(), None, dec!(50000));
        assert!(text.contains("가용 잔고: 9000.00 USDT"));
        assert!(text.contains("포지션 없음"));
        assert!(text.contains("신규 진입"));
    }

    #[test]
    fn test_profit_advice() {
        let mut position = long(dec!(50000), dec!(45000));
        position.unrealized_pnl = dec!(1250);
        let text = format_position_summary("BTC/USDT", &balance(), Some(&position), dec!(52500));

        assert!(text.contains("방향: LONG"));
        assert!(text.contains("+1250.00 USDT (+5.00%)"));
        assert!(text.contains("익절"));
        assert!(!text.contains("경고"));
    }

    #[test]
    fn test_liquidation_warning_and_loss_advice() {
        let mut position = long(dec!(50000), dec!(45000));
        position.unrealized_pnl = dec!(-1500);
        let text = format_position_summary("BTC/USDT", &balance(), Some(&position), dec!(47000));

        assert!(text.contains("-1500.00 USDT (-6.00%)"));
        assert!(text.contains("경고"));
        assert!(text.contains("손절"));
    }

    #[test]
    fn test_short_uses_entry_when_price_missing() {
        let mut position = long(dec!(50000), Decimal::ZERO);
        position.side = PositionSide::Short;
        let text = format_position_summary("BTC/USDT", &balance(), Some(&position), Decimal::ZERO);

        assert!(text.contains("현재가: 50000.00"));
        assert!(text.contains("(+0.00%)"));
        assert!(text.contains("정상"));
        assert!(!text.contains("청산가"));
    }

    #[test]
    fn test_unavailable_summary() {
        let text = format_summary_unavailable("BTC/USDT", "timeout");
        assert!(text.contains("timeout"));
        assert!(text.contains("신규 진입"));
    }

    #[test]
    fn test_signed_format() {
        assert_eq!(signed(dec!(3.456)), "+3.46");
        assert_eq!(signed(dec!(-0.5)), "-0.50");
        assert_eq!(signed(Decimal::ZERO), "+0.00");
    }
}
