//! 최종 텍스트 → 매매 액션 파서.
//!
//! 추론 단계는 최종 결정을 `**最终决策: BUY**` 또는 `**FINAL DECISION: BUY**` 형식의
//! 리터럴 마커로 끝냅니다. 파서는 고정 우선순위 BUY(LONG) → SELL(SHORT) → CLOSE → HOLD로
//! 마커를 찾고 첫 일치를 반환합니다. 일치가 없으면 `Unknown`이며 실패하지 않습니다.

use std::str::FromStr;

use rust_decimal::Decimal;
use trader_core::{TradeAction, TradeSignal};

const DECISION_PREFIXES: [&str; 2] = ["**最终决策: ", "**FINAL DECISION: "];
const STOP_LOSS_PREFIXES: [&str; 2] = ["**止损: ", "**STOP LOSS: "];
const TAKE_PROFIT_PREFIXES: [&str; 2] = ["**止盈: ", "**TAKE PROFIT: "];

/// 우선순위 순서의 (액션, 마커 키워드).
const PRIORITY: [(TradeAction, &[&str]); 4] = [
    (TradeAction::Buy, &["BUY", "LONG"]),
    (TradeAction::Sell, &["SELL", "SHORT"]),
    (TradeAction::Close, &["CLOSE"]),
    (TradeAction::Hold, &["HOLD"]),
];

/// 최종 텍스트에서 매매 액션 추출.
///
/// 대소문자를 구분하는 리터럴 부분 문자열 비교입니다.
///
/// # 예제
///
/// ```
/// use trader_agent::decision::parse;
/// use trader_core::TradeAction;
///
/// assert_eq!(parse("... **最终决策: SELL**"), TradeAction::Sell);
/// assert_eq!(parse("no marker"), TradeAction::Unknown);
/// ```
pub fn parse(text: &str) -> TradeAction {
    PRIORITY
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|keyword| {
                DECISION_PREFIXES
                    .iter()
                    .any(|prefix| text.contains(&format!("{}{}**", prefix, keyword)))
            })
        })
        .map(|(action, _)| *action)
        .unwrap_or(TradeAction::Unknown)
}

/// 최종 텍스트 → 전체 시그널 (액션 + 근거 + 선택적 손절/익절가).
pub fn parse_signal(text: &str) -> TradeSignal {
    let mut signal = TradeSignal::new(parse(text), text);
    if let Some(price) = find_price(text, &STOP_LOSS_PREFIXES) {
        signal = signal.with_stop_loss(price);
    }
    if let Some(price) = find_price(text, &TAKE_PROFIT_PREFIXES) {
        signal = signal.with_take_profit(price);
    }
    signal
}

/// `**<prefix><price>**` 마커의 가격. 해석할 수 없으면 `None`.
fn find_price(text: &str, prefixes: &[&str]) -> Option<Decimal> {
    prefixes.iter().find_map(|prefix| {
        let start = text.find(prefix)? + prefix.len();
        let rest = &text[start..];
        let end = rest.find("**")?;
        let raw: String = rest[..end]
            .chars()
            .filter(|c| !matches!(c, ',' | '$' | ' '))
            .collect();
        Decimal::from_str(&raw).ok().filter(|p| *p > Decimal::ZERO)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_each_marker() {
        assert_eq!(parse("분석...\n**最终决策: BUY**"), TradeAction::Buy);
        assert_eq!(parse("**最终决策: LONG**"), TradeAction::Buy);
        assert_eq!(parse("**最终决策: SELL**"), TradeAction::Sell);
        assert_eq!(parse("**最终决策: SHORT**"), TradeAction::Sell);
        assert_eq!(parse("**最终决策: CLOSE**"), TradeAction::Close);
        assert_eq!(parse("**最终决策: HOLD**"), TradeAction::Hold);
        assert_eq!(parse("**FINAL DECISION: CLOSE**"), TradeAction::Close);
    }

    #[test]
    fn test_priority_first_match_wins() {
        let text = "**最终决策: HOLD** ... **最终决策: SELL** ... **最终决策: BUY**";
        assert_eq!(parse(text), TradeAction::Buy);

        let text = "**最终决策: CLOSE** **FINAL DECISION: SHORT**";
        assert_eq!(parse(text), TradeAction::Sell);
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(parse(""), TradeAction::Unknown);
        assert_eq!(parse("I would BUY here"), TradeAction::Unknown);
        // 리터럴 비교: 공백/대소문자가 다르면 인식하지 않음
        assert_eq!(parse("**最终决策:BUY**"), TradeAction::Unknown);
        assert_eq!(parse("**final decision: buy**"), TradeAction::Unknown);
    }

    #[test]
    fn test_parse_signal_prices() {
        let text = "근거\n**止损: 61,250.5**\n**TAKE PROFIT: $66000**\n**最终决策: BUY**";
        let signal = parse_signal(text);

        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.rationale, text);
        assert_eq!(signal.stop_loss, Some(dec!(61250.5)));
        assert_eq!(signal.take_profit, Some(dec!(66000)));
    }

    #[test]
    fn test_parse_signal_bad_price_is_absent() {
        let signal = parse_signal("**STOP LOSS: around 60k**\n**最终决策: SELL**");
        assert_eq!(signal.action, TradeAction::Sell);
        assert_eq!(signal.stop_loss, None);
        assert_eq!(signal.take_profit, None);
    }
}
