//! 심볼 정규화.
//!
//! 거래소마다 같은 무기한 선물 계약을 다르게 표기합니다
//! (`BTC/USDT`, `BTC/USDT:USDT`, `BTCUSDT`). 비교는 항상 정규화된 형태로 합니다.

/// 심볼 정규화.
///
/// `:` 뒤의 정산 통화 접미사를 제거하고 대문자로 변환합니다.
/// 구분자(`/`)는 유지합니다.
///
/// ```
/// use trader_core::normalize_symbol;
/// assert_eq!(normalize_symbol("btc/usdt:USDT"), "BTC/USDT");
/// ```
pub fn normalize_symbol(symbol: &str) -> String {
    let base = symbol.split(':').next().unwrap_or(symbol);
    base.trim().replace(['-', '_'], "/").to_uppercase()
}

/// 거래소 REST API용 심볼 (`BTCUSDT`).
pub fn to_exchange_symbol(symbol: &str) -> String {
    normalize_symbol(symbol).replace('/', "")
}

/// 두 심볼이 같은 계약을 가리키는지 확인.
pub fn symbols_match(a: &str, b: &str) -> bool {
    to_exchange_symbol(a) == to_exchange_symbol(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_drops_settlement_suffix() {
        assert_eq!(normalize_symbol("BTC/USDT:USDT"), "BTC/USDT");
        assert_eq!(normalize_symbol("eth-usdt"), "ETH/USDT");
        assert_eq!(normalize_symbol("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(to_exchange_symbol("BTC/USDT:USDT"), "BTCUSDT");
        assert_eq!(to_exchange_symbol("sol/usdt"), "SOLUSDT");
    }

    #[test]
    fn test_symbols_match_across_notations() {
        assert!(symbols_match("BTC/USDT", "BTC/USDT:USDT"));
        assert!(symbols_match("BTC/USDT", "BTCUSDT"));
        assert!(symbols_match("btc_usdt", "BTCUSDT"));
        assert!(!symbols_match("BTC/USDT", "ETH/USDT"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "[a-zA-Z]{2,5}[/_-][a-zA-Z]{3,4}(:[A-Z]{4})?") {
            let once = normalize_symbol(&s);
            prop_assert_eq!(normalize_symbol(&once), once.clone());
            prop_assert!(symbols_match(&s, &once));
        }
    }
}
