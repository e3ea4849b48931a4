//! 포지션 스냅샷 어댑터.
//!
//! 거래소 원시 포지션 목록에서 요청 심볼의 포지션을 찾아 정규화된
//! `PositionSnapshot`으로 변환합니다. 포지션이 없거나 수량이 정확히 0이면 `None`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;
use trader_core::{
    normalize_symbol, symbols_match, ExchangePosition, FuturesExchangeProvider, PositionSnapshot,
};
use trader_exchange::{with_retry, ExchangeError, RetryConfig};

/// 원시 포지션 목록 → 스냅샷.
///
/// 헤지 모드에서 레그가 둘 이상이면 수량이 0이 아닌 첫 레그를 사용합니다.
/// 선택 필드가 없으면 0 (레버리지는 1)으로 채웁니다.
pub fn snapshot_from_positions(
    symbol: &str,
    positions: &[ExchangePosition],
) -> Option<PositionSnapshot> {
    let position = positions
        .iter()
        .filter(|p| symbols_match(&p.symbol, symbol))
        .find(|p| !p.signed_size().is_zero())?;

    let leverage = position
        .leverage
        .and_then(|l| l.trunc().to_u32())
        .filter(|l| *l > 0)
        .unwrap_or(1);

    let mut snapshot =
        PositionSnapshot::from_signed_size(normalize_symbol(symbol), position.signed_size());
    snapshot.entry_price = position.entry_price.unwrap_or(Decimal::ZERO);
    snapshot.unrealized_pnl = position.unrealized_pnl.unwrap_or(Decimal::ZERO);
    snapshot.leverage = leverage;
    snapshot.liquidation_price = position.liquidation_price.unwrap_or(Decimal::ZERO);
    snapshot.mark_price = position.mark_price.unwrap_or(Decimal::ZERO);
    Some(snapshot)
}

/// 거래소에서 현재 포지션 스냅샷 조회 (재시도 포함).
pub async fn fetch_position_snapshot(
    provider: &dyn FuturesExchangeProvider,
    symbol: &str,
    retry: &RetryConfig,
) -> Result<Option<PositionSnapshot>, ExchangeError> {
    let positions = with_retry(retry, "fetch_positions", || provider.fetch_positions(symbol)).await?;
    let snapshot = snapshot_from_positions(symbol, &positions);

    debug!(
        symbol,
        side = %snapshot.as_ref().map(|s| s.side.to_string()).unwrap_or_else(|| "NONE".to_string()),
        "포지션 스냅샷 조회"
    );
    Ok(snapshot)
}
