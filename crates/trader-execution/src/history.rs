//! 거래 이력 (추가 전용).

use crate::result::ExecutionResult;

/// 프로세스 내 거래 이력.
///
/// 기록은 추가만 가능하며 삽입 순서대로 정렬됩니다.
#[derive(Debug, Clone, Default)]
pub struct TradeHistory {
    records: Vec<ExecutionResult>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: ExecutionResult) {
        self.records.push(result);
    }

    pub fn records(&self) -> &[ExecutionResult] {
        &self.records
    }

    pub fn last(&self) -> Option<&ExecutionResult> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
