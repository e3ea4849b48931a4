//! 실행 결과.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{FuturesOrderRequest, OrderAck, PositionSnapshot, TradeAction};

use crate::stop_orders::StopOrderReport;

/// 실행 결과 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// 주문 실행 완료
    Executed,
    /// 관망 (주문 없음)
    NoAction,
    /// 정보 응답 (예: 청산할 포지션 없음)
    Info,
    /// 가드에 의해 거부
    Rejected,
    /// 청산은 성공했으나 신규 진입 실패
    Partial,
    /// 첫 주문부터 실패 (포지션 변화 없음)
    Failed,
    /// 테스트 모드 모의 실행
    Simulated,
}

/// 부분 실행 상세 (청산 성공 + 재진입 실패).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExecution {
    /// 성공한 청산 주문
    pub closed: OrderAck,
    /// 실패한 진입 주문
    pub failed_order: FuturesOrderRequest,
    /// 진입 실패 사유
    pub error: String,
}

/// 실행 결과.
///
/// 포지션을 변경한 결과는 `TradeHistory`에 추가됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub status: ExecutionStatus,
    pub action: TradeAction,
    pub symbol: String,
    /// 요청 수량
    pub amount: Decimal,
    /// 마지막 포지션 변경 주문 ID
    pub order_id: Option<String>,
    /// 마지막 포지션 변경 주문 체결 수량
    pub filled: Option<Decimal>,
    /// 마지막 포지션 변경 주문 평균 체결가
    pub average_price: Option<Decimal>,
    /// 제출된 주문 응답 (제출 순서)
    #[serde(default)]
    pub orders: Vec<OrderAck>,
    /// 계획된 주문 (테스트 모드에서는 제출되지 않음)
    #[serde(default)]
    pub planned_orders: Vec<FuturesOrderRequest>,
    /// 주문 후 재조회한 포지션
    pub new_position: Option<PositionSnapshot>,
    /// 손절/익절 주문 결과
    pub stop_orders: Option<StopOrderReport>,
    /// 부분 실행 상세
    pub partial: Option<PartialExecution>,
    /// 주문 응답이 유실되어 체결 여부를 알 수 없음 (`new_position`으로 확인)
    #[serde(default)]
    pub outcome_uncertain: bool,
    pub message: String,
    /// 결정 근거
    pub rationale: Option<String>,
    pub test_mode: bool,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// 기본 결과 (실패 상태로 시작).
    pub fn new(action: TradeAction, symbol: impl Into<String>, amount: Decimal, test_mode: bool) -> Self {
        Self {
            success: false,
            status: ExecutionStatus::Failed,
            action,
            symbol: symbol.into(),
            amount,
            order_id: None,
            filled: None,
            average_price: None,
            orders: Vec::new(),
            planned_orders: Vec::new(),
            new_position: None,
            stop_orders: None,
            partial: None,
            outcome_uncertain: false,
            message: String::new(),
            rationale: None,
            test_mode,
            timestamp: Utc::now(),
        }
    }

    /// 상태와 메시지 설정. `Executed`, `NoAction`, `Info`, `Simulated`는 성공으로 간주.
    pub fn with_status(mut self, status: ExecutionStatus, message: impl Into<String>) -> Self {
        self.success = matches!(
            status,
            ExecutionStatus::Executed
                | ExecutionStatus::NoAction
                | ExecutionStatus::Info
                | ExecutionStatus::Simulated
        );
        self.status = status;
        self.message = message.into();
        self
    }

    pub fn with_rationale(mut self, rationale: Option<String>) -> Self {
        self.rationale = rationale;
        self
    }

    /// 부분 실행 여부.
    pub fn is_partial(&self) -> bool {
        self.status == ExecutionStatus::Partial
    }

    /// 포지션이 변경되었을 수 있는지 여부 (재조회 및 이력 기록 대상).
    pub fn changed_position(&self) -> bool {
        !self.orders.is_empty()
            || self.outcome_uncertain
            || self.status == ExecutionStatus::Simulated
    }
}
