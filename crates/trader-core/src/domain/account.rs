//! 선물 계정 잔고 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 자산별 선물 지갑 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// 자산 (예: USDT)
    pub asset: String,
    /// 총 잔고 (지갑 잔고 + 미실현 손익)
    pub total: Decimal,
    /// 주문 가능 잔고
    pub free: Decimal,
    /// 사용 중 증거금
    pub used: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
}

impl AccountBalance {
    /// 잔고가 없는 계정.
    pub fn empty(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            total: Decimal::ZERO,
            free: Decimal::ZERO,
            used: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        }
    }
}

/// 계정 요약 정보.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// 총 자산
    pub total_equity: Decimal,
    /// 주문 가능 잔고
    pub available_balance: Decimal,
    /// 증거금 잔고
    pub margin_balance: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
}

impl From<AccountBalance> for AccountInfo {
    fn from(balance: AccountBalance) -> Self {
        Self {
            total_equity: balance.total,
            available_balance: balance.free,
            margin_balance: balance.used,
            unrealized_pnl: balance.unrealized_pnl,
        }
    }
}
