//! 포지션 모드 감지.
//!
//! 감지 순서:
//! 1. 설정에서 명시한 모드 (`oneway` / `hedge`)
//! 2. 거래소 표준 포지션 모드 조회
//! 3. 원시 계정 설정 조회 (`dualSidePosition`)
//! 4. 모두 실패하면 단방향 (경고 로그)
//!
//! 결과는 실행기 수명 동안 한 번만 계산됩니다. 계정 설정을 변경하지 않습니다.

use tracing::{debug, info, warn};
use trader_core::{FuturesExchangeProvider, PositionMode, PositionModeSetting};

/// 메모이즈된 포지션 모드 감지기.
#[derive(Debug, Clone)]
pub struct PositionModeResolver {
    setting: PositionModeSetting,
    resolved: Option<PositionMode>,
}

impl PositionModeResolver {
    pub fn new(setting: PositionModeSetting) -> Self {
        Self {
            setting,
            resolved: None,
        }
    }

    /// 이미 감지된 모드.
    pub fn resolved(&self) -> Option<PositionMode> {
        self.resolved
    }

    /// 포지션 모드 감지 (첫 호출에만 거래소 조회).
    pub async fn resolve(&mut self, provider: &dyn FuturesExchangeProvider) -> PositionMode {
        if let Some(mode) = self.resolved {
            return mode;
        }

        let mode = self.detect(provider).await;
        self.resolved = Some(mode);
        mode
    }

    async fn detect(&self, provider: &dyn FuturesExchangeProvider) -> PositionMode {
        if let Some(mode) = self.setting.explicit() {
            info!(mode = %mode, "설정된 포지션 모드 사용");
            return mode;
        }

        match provider.fetch_position_mode().await {
            Ok(mode) => {
                info!(mode = %mode, "포지션 모드 감지");
                return mode;
            }
            Err(e) => debug!(error = %e, "표준 포지션 모드 조회 실패, 원시 설정 조회 시도"),
        }

        match provider.fetch_account_settings().await {
            Ok(settings) => {
                if let Some(mode) = parse_dual_side(&settings) {
                    info!(mode = %mode, "계정 설정에서 포지션 모드 감지");
                    return mode;
                }
                warn!(settings = %settings, "dualSidePosition 필드를 해석할 수 없음");
            }
            Err(e) => warn!(error = %e, "원시 계정 설정 조회 실패"),
        }

        warn!("포지션 모드를 감지할 수 없어 단방향 모드로 처리");
        PositionMode::OneWay
    }
}

/// `dualSidePosition` 값 해석 (bool 또는 문자열).
fn parse_dual_side(settings: &serde_json::Value) -> Option<PositionMode> {
    let hedge = match settings.get("dualSidePosition")? {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(if hedge {
        PositionMode::Hedge
    } else {
        PositionMode::OneWay
    })
}
