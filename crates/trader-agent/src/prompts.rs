//! 단계별 프롬프트.

use std::fmt::Write;

use crate::stage::Stage;
use crate::state::PipelineState;

/// 프롬프트에 들어가는 거래 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub leverage: u32,
    /// 거래당 리스크 비율 (0.02 = 2%)
    pub risk_per_trade: f64,
    pub timeframe: String,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            leverage: 10,
            risk_per_trade: 0.02,
            timeframe: "1h".to_string(),
        }
    }
}

pub fn system_prompt(stage: Stage) -> &'static str {
    match stage {
        Stage::MarketAnalysis => {
            "당신은 암호화폐 선물 기술적 분석가입니다. 제공된 도구로 캔들과 기술적 지표를 조회하고, \
             추세/모멘텀/변동성을 정리한 보고서를 작성하세요. 도구 결과에 없는 수치는 만들지 마세요."
        }
        Stage::CryptoAnalysis => {
            "당신은 암호화폐 파생상품 시장 분석가입니다. 펀딩비, 호가 깊이, 24시간 시세와 미결제약정을 \
             조회하고 롱/숏 포지셔닝과 유동성 상황을 정리한 보고서를 작성하세요."
        }
        Stage::SentimentAnalysis => "당신은 시장 감성 분석가입니다.",
        Stage::Trader => {
            "당신은 암호화폐 선물 트레이더입니다. 분석 보고서와 현재 포지션을 종합해 하나의 매매 결정을 내리고, \
             지정된 형식의 최종 결정 마커로 답변을 끝내세요."
        }
    }
}

/// 단계 작업 지시.
pub fn task_prompt(stage: Stage, state: &PipelineState, ctx: &PromptContext) -> String {
    match stage {
        Stage::Trader => trader_prompt(state, ctx),
        _ => format!(
            "{} {} 분석을 수행하세요. 기준일: {}, 타임프레임: {}.",
            state.symbol,
            stage.title(),
            state.trade_date,
            ctx.timeframe
        ),
    }
}

fn trader_prompt(state: &PipelineState, ctx: &PromptContext) -> String {
    let report = |stage: Stage| state.report(stage).unwrap_or("(보고서 없음)");
    let mut out = String::new();

    let _ = writeln!(out, "{} 매매 결정 (기준일 {})", state.symbol, state.trade_date);
    for stage in [Stage::MarketAnalysis, Stage::CryptoAnalysis, Stage::SentimentAnalysis] {
        let _ = writeln!(out, "\n## {}\n{}", stage.title(), report(stage));
    }
    let _ = writeln!(
        out,
        "\n## 현재 계정/포지션\n{}",
        state
            .position_summary
            .as_deref()
            .unwrap_or("(포지션 정보 없음, 신규 진입으로 간주)")
    );

    let _ = writeln!(out, "\n## 거래 조건");
    let _ = writeln!(out, "- 레버리지: {}x", ctx.leverage);
    let _ = writeln!(out, "- 거래당 리스크: 계정의 {:.1}%", ctx.risk_per_trade * 100.0);
    let _ = writeln!(
        out,
        "- 감성 지표는 보조 근거입니다. 기술적/선물 시장 분석과 충돌하면 가중치를 낮추세요."
    );

    let _ = writeln!(out, "\n## 포지션 관리 규칙");
    let _ = writeln!(out, "- 미실현 손실이 -5% 이하이면 청산(CLOSE)을 우선 검토하세요.");
    let _ = writeln!(out, "- 미실현 이익이 +3% 이상이면 익절 또는 보유 근거를 명시하세요.");
    let _ = writeln!(out, "- 같은 방향 포지션이 있으면 추가 진입하지 말고 HOLD 하세요 (물타기/불타기 금지).");
    let _ = writeln!(out, "- 반대 방향 신호면 BUY/SELL로 전환할 수 있습니다 (기존 포지션 청산 후 진입).");

    let _ = writeln!(out, "\n## 답변 형식");
    let _ = writeln!(out, "근거를 설명한 뒤 선택적으로 손절/익절 가격을 제시하세요:");
    let _ = writeln!(out, "**止损: <가격>**");
    let _ = writeln!(out, "**止盈: <가격>**");
    let _ = writeln!(out, "마지막 줄은 반드시 다음 중 하나여야 합니다:");
    for marker in ["BUY", "SELL", "HOLD", "CLOSE"] {
        let _ = writeln!(out, "**最终决策: {}**", marker);
    }
    out
}
