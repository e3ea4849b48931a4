//! 선물 주문 실행 및 포지션 조정.
//!
//! 이 crate는 다음을 제공합니다:
//! - 거래소 원시 포지션 → 정규화된 스냅샷 변환 ([`position`])
//! - 단방향/헤지 포지션 모드 감지 ([`position_mode`])
//! - (현재 포지션 × 매매 액션) → 주문 계획 변환 ([`plan`])
//! - 중복 진입 방지와 부분 실패 보고를 포함한 실행 엔진 ([`reconciler`])
//! - 진입 후 손절/익절 조건부 주문 ([`stop_orders`])
//! - ATR 기반 초기/추적 손절가 계산 ([`trailing_stop`])
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{ExecutionConfig, ExecutionReconciler};
//!
//! let mut reconciler = ExecutionReconciler::new(provider, ExecutionConfig::default());
//! reconciler.setup("BTC/USDT", 10).await?;
//! let result = reconciler.execute("BTC/USDT", &signal, dec!(0.01)).await?;
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod plan;
pub mod position;
pub mod position_mode;
pub mod reconciler;
pub mod result;
pub mod stop_orders;
pub mod summary;
pub mod trailing_stop;

// 주요 타입 재내보내기
pub use config::ExecutionConfig;
pub use error::ExecutionError;
pub use history::TradeHistory;
pub use plan::{plan_execution, ExecutionPlan, RejectReason};
pub use position::{fetch_position_snapshot, snapshot_from_positions};
pub use position_mode::PositionModeResolver;
pub use reconciler::ExecutionReconciler;
pub use result::{ExecutionResult, ExecutionStatus, PartialExecution};
pub use stop_orders::{PlacedStopOrder, StopOrderManager, StopOrderReport};
pub use summary::{format_position_summary, format_summary_unavailable};
pub use trailing_stop::{TrailingStopCalculator, TrailingStopConfig};
