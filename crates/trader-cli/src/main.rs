//! 선물 결정-실행 사이클 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 분석 + (AUTO_EXECUTE=true면) 실행 1회
//! trader run
//!
//! # 주문 제출 없이 실행
//! trader run --dry-run --symbol ETH/USDT
//!
//! # 현재 계정/포지션 요약
//! trader status
//!
//! # 포지션 청산
//! trader close
//! ```

mod config;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trader_agent::tools::{crypto_tools, market_tools, MarketDataSource};
use trader_agent::{
    CryptoOracleClient, CryptoOracleConfig, CycleReport, LlmConfig, OpenAiReasoningStep,
    PipelineController, PromptContext, ResultSink, Stage, TracingResultSink,
};
use trader_core::{FuturesExchangeProvider, PositionSide, TradeAction, TradeSignal};
use trader_exchange::connector::binance::{BinanceFuturesClient, BinanceFuturesConfig};
use trader_exchange::{BinanceFuturesProvider, MockFuturesExchange};
use trader_execution::{ExecutionConfig, ExecutionReconciler, TrailingStopCalculator};

use crate::config::TradingConfig;

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "암호화폐 선물 분석-실행 파이프라인", long_about = None)]
#[command(version)]
struct Cli {
    /// 로그 레벨 (RUST_LOG가 있으면 무시)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 분석 파이프라인 1회 실행 후 결정 실행
    Run {
        /// 주문 제출 없이 모의 실행 (테스트 모드 강제)
        #[arg(long)]
        dry_run: bool,

        /// 거래 심볼 (기본: CRYPTO_SYMBOL)
        #[arg(short, long)]
        symbol: Option<String>,

        /// 거래 기준일 YYYY-MM-DD (기본: 오늘, UTC)
        #[arg(long)]
        trade_date: Option<String>,
    },

    /// 현재 계정/포지션 요약 출력
    Status {
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// 현재 포지션 전량 청산
    Close {
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long)]
        symbol: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &cli.log_level;
                format!(
                    "trader={level},trader_core={level},trader_exchange={level},\
                     trader_execution={level},trader_agent={level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = TradingConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Run {
            dry_run,
            symbol,
            trade_date,
        } => {
            apply_overrides(&mut config, dry_run, symbol);
            let trade_date =
                trade_date.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
            run_cycle(&config, &trade_date).await?;
        }
        Commands::Status { symbol } => {
            apply_overrides(&mut config, false, symbol);
            let (provider, _) = build_exchange(&config)?;
            let reconciler = ExecutionReconciler::new(provider, execution_config(&config));
            println!("{}", reconciler.position_summary(&config.symbol).await);
        }
        Commands::Close { dry_run, symbol } => {
            apply_overrides(&mut config, dry_run, symbol);
            let (provider, _) = build_exchange(&config)?;
            let mut reconciler = ExecutionReconciler::new(provider, execution_config(&config));
            reconciler.setup(&config.symbol, config.leverage).await?;
            let result = reconciler.close_position(&config.symbol).await?;
            println!("{}", result.message);
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut TradingConfig, dry_run: bool, symbol: Option<String>) {
    if dry_run {
        config.test_mode = true;
    }
    if let Some(symbol) = symbol {
        config.symbol = symbol;
    }
}

fn execution_config(config: &TradingConfig) -> ExecutionConfig {
    ExecutionConfig::default()
        .with_test_mode(config.test_mode)
        .with_position_mode(config.position_mode)
}

/// 거래소 Provider + 공개 시세 클라이언트.
///
/// 자격 증명이 없으면 테스트 모드에서만 인메모리 거래소로 대체합니다.
fn build_exchange(
    config: &TradingConfig,
) -> anyhow::Result<(Arc<dyn FuturesExchangeProvider>, Arc<BinanceFuturesClient>)> {
    let binance_config = |key: &str, secret: &str| {
        let cfg = BinanceFuturesConfig::new(key, secret);
        match &config.binance_base_url {
            Some(url) => cfg.with_base_url(url.as_str()),
            None => cfg,
        }
    };

    match &config.binance {
        Some(credentials) => {
            let client = Arc::new(BinanceFuturesClient::new(binance_config(
                credentials.api_key.expose_secret(),
                credentials.api_secret.expose_secret(),
            ))?);
            let provider: Arc<dyn FuturesExchangeProvider> =
                Arc::new(BinanceFuturesProvider::new(Arc::clone(&client)));
            Ok((provider, client))
        }
        None if config.test_mode => {
            warn!("Binance 자격 증명 없음, 인메모리 거래소로 테스트 모드 실행");
            // 공개 시세 API는 서명이 필요 없음
            let client = Arc::new(BinanceFuturesClient::new(binance_config("", ""))?);
            let provider: Arc<dyn FuturesExchangeProvider> = Arc::new(MockFuturesExchange::one_way());
            Ok((provider, client))
        }
        None => bail!("실거래 모드에는 BINANCE_API_KEY와 BINANCE_API_SECRET이 필요합니다"),
    }
}

/// 분석 → (선택적) 실행 → 결과 전달.
async fn run_cycle(config: &TradingConfig, trade_date: &str) -> anyhow::Result<()> {
    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        test_mode = config.test_mode,
        auto_execute = config.auto_execute,
        "결정 사이클 시작"
    );

    let (provider, client) = build_exchange(config)?;
    let mut reconciler = ExecutionReconciler::new(provider, execution_config(config));
    let mode = reconciler.setup(&config.symbol, config.leverage).await?;
    info!(exchange = reconciler.exchange_name(), mode = ?mode, "실행 엔진 준비 완료");

    let source = MarketDataSource::new(
        client,
        config.symbol.as_str(),
        config.timeframe.as_str(),
        config.lookback_days,
    );
    let market = market_tools(&source);
    let crypto = crypto_tools(&source);

    let mut llm = LlmConfig::new(config.llm.model.as_str()).with_base_url(config.llm.base_url.as_str());
    if let Some(key) = &config.llm.api_key {
        llm = llm.with_api_key(key.expose_secret());
    }
    let prompt = PromptContext {
        leverage: config.leverage,
        risk_per_trade: config.risk_per_trade,
        timeframe: config.timeframe.clone(),
    };
    let step = OpenAiReasoningStep::new(llm, prompt)?
        .with_tools(Stage::MarketAnalysis, market.definitions())
        .with_tools(Stage::CryptoAnalysis, crypto.definitions());

    let mut controller = PipelineController::new(Arc::new(step))
        .with_market_tools(market)
        .with_crypto_tools(crypto)
        .with_max_iterations(config.max_tool_iterations);
    match &config.sentiment {
        Some(sentiment) => {
            let client = CryptoOracleClient::new(CryptoOracleConfig::new(
                sentiment.url.as_str(),
                sentiment.api_key.expose_secret(),
            ))?;
            controller = controller.with_sentiment(Arc::new(client));
        }
        None => warn!("SENTIMENT_API_KEY 없음, 감성 분석 생략"),
    }

    let outcome = controller
        .run(&config.symbol, trade_date, &reconciler)
        .await?;
    println!("{}", outcome.decision_text);

    let signal = if config.atr_initial_stop {
        with_initial_stop(&config.symbol, &source, outcome.signal).await
    } else {
        outcome.signal
    };

    let execution = if !config.auto_execute {
        info!(action = %signal.action, "AUTO_EXECUTE 비활성화, 실행 생략");
        None
    } else if signal.action == TradeAction::Unknown {
        warn!("최종 결정 마커 없음, HOLD로 간주하고 실행 생략");
        None
    } else {
        let result = reconciler
            .execute(&config.symbol, &signal, config.position_size)
            .await?;
        info!(
            status = ?result.status,
            success = result.success,
            message = %result.message,
            "실행 결과"
        );
        println!("{}", result.message);
        Some(result)
    };

    let report = CycleReport {
        symbol: config.symbol.clone(),
        trade_date: trade_date.to_string(),
        reports: outcome.state.reports.clone(),
        decision_text: outcome.decision_text,
        signal,
        execution,
    };
    TracingResultSink.publish(&report).await?;

    Ok(())
}

/// 손절가 없는 진입 시그널에 ATR 기반 초기 손절가 부여.
///
/// 최근 종가를 진입가로 보고 계산하며, 조회 실패나 허용 거리 밖이면 시그널을 그대로 둡니다.
async fn with_initial_stop(
    symbol: &str,
    source: &MarketDataSource,
    signal: TradeSignal,
) -> TradeSignal {
    let side = match signal.action {
        TradeAction::Buy => PositionSide::Long,
        TradeAction::Sell => PositionSide::Short,
        _ => return signal,
    };
    if signal.stop_loss.is_some() {
        return signal;
    }

    let calculator = TrailingStopCalculator::default();
    let period = calculator.config_for(symbol).initial_atr_period;
    let reading = match source.latest_atr(period).await {
        Ok(reading) => reading,
        Err(e) => {
            warn!(symbol, error = %e, "ATR 조회 실패, 초기 손절가 생략");
            return signal;
        }
    };

    match calculator.checked_initial_stop(symbol, side, reading.close, reading.atr) {
        Some(stop) => {
            let stop = stop.round_dp(reading.close.scale());
            info!(
                symbol,
                close = %reading.close,
                atr = %reading.atr,
                stop_loss = %stop,
                "ATR 초기 손절가 설정"
            );
            signal.with_stop_loss(stop)
        }
        None => {
            warn!(symbol, atr = %reading.atr, "ATR 손절 거리가 허용 범위 밖, 초기 손절가 생략");
            signal
        }
    }
}
