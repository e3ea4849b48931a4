//! 실행 엔진 통합 테스트 (MockFuturesExchange 사용).
//!
//! 정착/재조회 대기가 있으므로 모든 비동기 테스트는 일시정지된 시계로 실행합니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{
    OrderSide, PositionMode, PositionModeSetting, PositionSide, PositionTag, ProviderError,
    TradeAction, TradeSignal,
};
use trader_exchange::{MockFuturesExchange, MockOperation, RetryConfig};
use trader_execution::{ExecutionConfig, ExecutionError, ExecutionReconciler, ExecutionStatus};

const SYMBOL: &str = "BTC/USDT";

fn live_config() -> ExecutionConfig {
    ExecutionConfig::live().with_retry(RetryConfig::fast())
}

async fn exchange_with(mode: PositionMode, side: PositionSide, size: Decimal) -> Arc<MockFuturesExchange> {
    let exchange = Arc::new(MockFuturesExchange::new(mode));
    if side != PositionSide::None {
        exchange.set_position(SYMBOL, side, size, dec!(50000)).await;
    }
    exchange
}

fn side_of(result: &trader_execution::ExecutionResult) -> PositionSide {
    result
        .new_position
        .as_ref()
        .map(|p| p.side)
        .unwrap_or(PositionSide::None)
}

// =============================================================================
// 전이 테이블
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_transition_table_all_sides_and_actions() {
    use ExecutionStatus::*;
    use PositionSide::{Long, None as Flat, Short};

    let cases = [
        (Flat, TradeAction::Buy, Executed, 1, Long),
        (Flat, TradeAction::Sell, Executed, 1, Short),
        (Flat, TradeAction::Hold, NoAction, 0, Flat),
        (Flat, TradeAction::Close, Info, 0, Flat),
        (Flat, TradeAction::Unknown, Rejected, 0, Flat),
        (Long, TradeAction::Buy, Rejected, 0, Long),
        (Long, TradeAction::Sell, Executed, 2, Short),
        (Long, TradeAction::Hold, NoAction, 0, Long),
        (Long, TradeAction::Close, Executed, 1, Flat),
        (Long, TradeAction::Unknown, Rejected, 0, Long),
        (Short, TradeAction::Sell, Rejected, 0, Short),
        (Short, TradeAction::Buy, Executed, 2, Long),
        (Short, TradeAction::Hold, NoAction, 0, Short),
        (Short, TradeAction::Close, Executed, 1, Flat),
        (Short, TradeAction::Unknown, Rejected, 0, Short),
    ];

    for (side, action, status, order_count, final_side) in cases {
        let exchange = exchange_with(PositionMode::OneWay, side, dec!(0.5)).await;
        let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

        let result = reconciler
            .execute_action(SYMBOL, action, dec!(0.1), None, None, None)
            .await
            .unwrap();

        assert_eq!(result.status, status, "{side} × {action}");
        assert_eq!(exchange.orders().await.len(), order_count, "{side} × {action}");
        assert_eq!(side_of(&result), final_side, "{side} × {action}");
        assert_eq!(
            result.success,
            matches!(status, Executed | NoAction | Info),
            "{side} × {action}"
        );
    }
}

// =============================================================================
// 중복 진입 방지 / 반전
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_second_buy_is_rejected_without_order() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let first = reconciler.execute_raw(SYMBOL, "BUY", dec!(0.1)).await.unwrap();
    assert!(first.success);

    let second = reconciler.execute_raw(SYMBOL, "buy", dec!(0.1)).await.unwrap();
    assert!(!second.success);
    assert_eq!(second.status, ExecutionStatus::Rejected);
    assert!(second.message.contains("HOLD"));
    assert!(second.message.contains("CLOSE"));

    assert_eq!(exchange.orders().await.len(), 1);
    assert_eq!(reconciler.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reversal_one_way_close_then_open() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Sell, dec!(0.2), None, None, None)
        .await
        .unwrap();

    let orders = exchange.orders().await;
    assert_eq!(orders.len(), 2);

    // 청산 수량은 요청 수량이 아니라 스냅샷 수량
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].quantity, dec!(0.5));
    assert!(orders[0].reduce_only);
    assert_eq!(orders[0].position_side, None);

    assert_eq!(orders[1].side, OrderSide::Sell);
    assert_eq!(orders[1].quantity, dec!(0.2));
    assert!(!orders[1].reduce_only);

    assert!(result.success);
    assert_eq!(result.orders.len(), 2);
    let position = result.new_position.unwrap();
    assert_eq!(position.side, PositionSide::Short);
    assert_eq!(position.size, dec!(0.2));
    assert_eq!(reconciler.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reversal_hedge_tags_every_order() {
    let exchange = exchange_with(PositionMode::Hedge, PositionSide::Long, dec!(0.5)).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Sell, dec!(0.3), None, None, None)
        .await
        .unwrap();
    assert!(result.success);

    let orders = exchange.orders().await;
    assert_eq!(orders[0].position_side, Some(PositionTag::Long));
    assert_eq!(orders[0].quantity, dec!(0.5));
    assert_eq!(orders[1].position_side, Some(PositionTag::Short));
    assert!(orders.iter().all(|o| !o.reduce_only));
    assert!(orders.iter().all(|o| o.client_order_id.is_some()));

    assert_eq!(side_of(&result), PositionSide::Short);
}

#[tokio::test(start_paused = true)]
async fn test_hold_when_flat_submits_nothing() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let signal = TradeSignal::new(TradeAction::Hold, "**最终决策: HOLD**");
    let result = reconciler.execute(SYMBOL, &signal, dec!(0.1)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, ExecutionStatus::NoAction);
    assert!(result.message.contains("관망"));
    assert_eq!(result.rationale.as_deref(), Some("**最终决策: HOLD**"));
    assert!(exchange.orders().await.is_empty());
    assert!(reconciler.history().is_empty());
}

// =============================================================================
// 실패 처리
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_partial_execution_when_reopen_fails() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Short, dec!(0.4)).await;
    exchange
        .fail_nth(
            MockOperation::PlaceOrder,
            2,
            ProviderError::Api("-2019 Margin is insufficient.".into()),
        )
        .await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.is_partial());
    let partial = result.partial.as_ref().unwrap();
    assert_eq!(partial.closed.side, OrderSide::Buy);
    assert_eq!(partial.closed.quantity, dec!(0.4));
    assert_eq!(partial.failed_order.side, OrderSide::Buy);
    assert!(partial.error.contains("Margin"));

    // 청산은 되돌리지 않음
    assert_eq!(side_of(&result), PositionSide::None);
    assert_eq!(reconciler.history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_order_failure_leaves_position() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    exchange
        .fail_next(
            MockOperation::PlaceOrder,
            ProviderError::Api("-1111 Precision is over the maximum.".into()),
        )
        .await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.orders.is_empty());
    assert_eq!(exchange.call_count(MockOperation::PlaceOrder).await, 1);
    assert!(reconciler.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_entry_response_is_not_resubmitted() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    exchange
        .lose_next_order_response(ProviderError::Timeout("read timed out".into()))
        .await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();

    // 거래소는 주문을 받았지만 응답이 유실됨: 재제출 없이 실패로 보고
    assert_eq!(exchange.call_count(MockOperation::PlaceOrder).await, 1);
    assert_eq!(exchange.orders().await.len(), 1);
    assert!(!result.success);
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(result.outcome_uncertain);

    // 재조회한 포지션은 실제 체결을 반영 (한 번만)
    let position = result.new_position.as_ref().unwrap();
    assert_eq!(position.side, PositionSide::Long);
    assert_eq!(position.size, dec!(0.1));
    assert_eq!(reconciler.history().len(), 1);

    // 다음 사이클의 BUY는 중복 진입 가드에 막힘
    let second = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();
    assert_eq!(second.status, ExecutionStatus::Rejected);
    assert_eq!(exchange.orders().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_snapshot_errors_are_retried() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    exchange
        .fail_times(
            MockOperation::FetchPositions,
            ProviderError::Timeout("positionRisk".into()),
            2,
        )
        .await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Hold, dec!(0.1), None, None, None)
        .await
        .unwrap();

    assert_eq!(side_of(&result), PositionSide::Long);
    assert_eq!(exchange.call_count(MockOperation::FetchPositions).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_snapshot_retries_abort_cycle() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    exchange
        .fail_times(
            MockOperation::FetchPositions,
            ProviderError::Network("connection refused".into()),
            10,
        )
        .await;
    let config = ExecutionConfig::live().with_retry(RetryConfig {
        max_retries: 3,
        ..RetryConfig::fast()
    });
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), config);

    let err = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap_err();

    match err {
        ExecutionError::Exchange(e) => assert!(e.is_exhausted()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(exchange.call_count(MockOperation::FetchPositions).await, 4);
    assert!(exchange.orders().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_action_string_is_configuration_error() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let err = reconciler.execute_raw(SYMBOL, "moon", dec!(0.1)).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Configuration(_)));

    let err = reconciler.execute_raw(SYMBOL, "LONG", Decimal::ZERO).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Configuration(_)));
    assert!(exchange.orders().await.is_empty());
}

// =============================================================================
// 테스트 모드
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_test_mode_plans_without_submitting() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), ExecutionConfig::default());

    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Sell, dec!(0.2), None, None, None)
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.test_mode);
    assert_eq!(result.status, ExecutionStatus::Simulated);
    assert_eq!(result.planned_orders.len(), 2);
    assert_eq!(result.planned_orders[0].quantity, dec!(0.5));
    assert_eq!(side_of(&result), PositionSide::Short);
    assert!(exchange.orders().await.is_empty());
    assert_eq!(reconciler.history().len(), 1);

    // 테스트 모드에서도 같은 가드 적용
    let duplicate = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.2), None, None, None)
        .await
        .unwrap();
    assert_eq!(duplicate.status, ExecutionStatus::Rejected);
}

// =============================================================================
// 손절/익절, 청산, 준비
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_entry_attaches_stop_orders() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let signal = TradeSignal::new(TradeAction::Buy, "breakout")
        .with_stop_loss(dec!(48000))
        .with_take_profit(dec!(53000));
    let result = reconciler.execute(SYMBOL, &signal, dec!(0.1)).await.unwrap();

    assert!(result.success);
    let report = result.stop_orders.as_ref().unwrap();
    assert_eq!(report.placed.len(), 2);
    assert!(report.is_complete());

    let orders = exchange.orders().await;
    assert_eq!(orders.len(), 3);
    assert!(orders[1..].iter().all(|o| o.side == OrderSide::Sell && o.reduce_only));
    assert_eq!(side_of(&result), PositionSide::Long);
}

#[tokio::test(start_paused = true)]
async fn test_close_does_not_attach_stop_orders() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler
        .execute_action(
            SYMBOL,
            TradeAction::Close,
            dec!(0.1),
            Some(dec!(48000)),
            None,
            None,
        )
        .await
        .unwrap();

    assert!(result.stop_orders.is_none());
    assert_eq!(exchange.orders().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_position_uses_snapshot_size() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Short, dec!(0.3)).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let result = reconciler.close_position(SYMBOL).await.unwrap();
    assert!(result.success);

    let orders = exchange.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].quantity, dec!(0.3));
    assert!(orders[0].reduce_only);

    let again = reconciler.close_position(SYMBOL).await.unwrap();
    assert_eq!(again.status, ExecutionStatus::Info);
    assert_eq!(exchange.orders().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_setup_sets_leverage_and_resolves_mode_once() {
    let exchange = exchange_with(PositionMode::Hedge, PositionSide::None, Decimal::ZERO).await;
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let mode = reconciler.setup(SYMBOL, 20).await.unwrap();
    assert_eq!(mode, PositionMode::Hedge);
    assert_eq!(exchange.leverage().await, 20);

    reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();
    assert_eq!(exchange.call_count(MockOperation::FetchPositionMode).await, 1);
    // 계정 모드는 변경하지 않음
    assert_eq!(exchange.position_mode().await, PositionMode::Hedge);
}

#[tokio::test(start_paused = true)]
async fn test_configured_mode_overrides_exchange() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::None, Decimal::ZERO).await;
    let config = live_config().with_position_mode(PositionModeSetting::Hedge);
    let mut reconciler = ExecutionReconciler::new(exchange.clone(), config);

    // 설정이 계정 모드와 다르면 거래소가 주문을 거부
    let result = reconciler
        .execute_action(SYMBOL, TradeAction::Buy, dec!(0.1), None, None, None)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(exchange.call_count(MockOperation::FetchPositionMode).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_account_info_and_summary() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    exchange.set_price(dec!(51000)).await;
    let reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let info = reconciler.account_info().await.unwrap();
    assert_eq!(info.unrealized_pnl, dec!(500));
    assert_eq!(info.total_equity, dec!(10500));

    let summary = reconciler.position_summary(SYMBOL).await;
    assert!(summary.contains("방향: LONG"));
    assert!(summary.contains("현재가: 51000.00"));
    assert!(summary.contains("(+2.00%)"));
}

#[tokio::test(start_paused = true)]
async fn test_summary_when_exchange_unreachable() {
    let exchange = exchange_with(PositionMode::OneWay, PositionSide::Long, dec!(0.5)).await;
    exchange
        .fail_next(
            MockOperation::FetchBalance,
            ProviderError::Authentication("Invalid API-key".into()),
        )
        .await;
    let reconciler = ExecutionReconciler::new(exchange.clone(), live_config());

    let summary = reconciler.position_summary(SYMBOL).await;
    assert!(summary.contains("조회할 수 없습니다"));
    assert!(summary.contains("신규 진입"));
}
