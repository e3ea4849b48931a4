//! Binance FuturesExchangeProvider 구현.
//!
//! BinanceFuturesClient를 래핑하여 거래소 중립적인 인터페이스를 제공합니다.
//!
//! # 아키텍처
//!
//! ```text
//! BinanceFuturesProvider
//! ├── fetch_positions()        - positionRisk → ExchangePosition
//! ├── set_leverage()           - leverage
//! ├── place_order()            - order (MARKET / STOP_MARKET / TAKE_PROFIT_MARKET)
//! ├── fetch_balance()          - balance → AccountBalance
//! ├── fetch_last_price()       - ticker/price
//! ├── fetch_position_mode()    - positionSide/dual → PositionMode
//! └── fetch_account_settings() - positionSide/dual 원본 JSON
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;
use trader_core::{
    AccountBalance, ExchangePosition, FuturesExchangeProvider, FuturesOrderRequest, OrderAck,
    OrderSide, PositionMode, ProviderError,
};

use crate::connector::binance::{BinanceFuturesClient, BinancePositionRisk};

/// Binance 선물 Provider.
pub struct BinanceFuturesProvider {
    client: Arc<BinanceFuturesClient>,
}

impl BinanceFuturesProvider {
    pub fn new(client: Arc<BinanceFuturesClient>) -> Self {
        Self { client }
    }

    /// BinanceFuturesClient에서 생성.
    pub fn from_client(client: BinanceFuturesClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// 공개 시장 데이터 조회에 쓰는 클라이언트 참조.
    pub fn client(&self) -> Arc<BinanceFuturesClient> {
        Arc::clone(&self.client)
    }
}

fn to_exchange_position(risk: BinancePositionRisk) -> ExchangePosition {
    ExchangePosition {
        symbol: risk.symbol,
        position_amt: Some(risk.position_amt),
        contracts: Some(risk.position_amt.abs()),
        side: None,
        position_side: risk.position_side,
        entry_price: Some(risk.entry_price),
        unrealized_pnl: risk.un_realized_profit,
        leverage: risk.leverage,
        liquidation_price: risk.liquidation_price,
        mark_price: risk.mark_price,
    }
}

#[async_trait]
impl FuturesExchangeProvider for BinanceFuturesProvider {
    fn exchange_name(&self) -> &str {
        "binance"
    }

    async fn fetch_positions(&self, symbol: &str) -> Result<Vec<ExchangePosition>, ProviderError> {
        let risks = self.client.position_risk(symbol).await?;
        Ok(risks.into_iter().map(to_exchange_position).collect())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        self.client.change_leverage(symbol, leverage).await
    }

    async fn place_order(&self, request: &FuturesOrderRequest) -> Result<OrderAck, ProviderError> {
        let response = self.client.new_order(request).await?;
        debug!(
            order_id = response.order_id,
            status = %response.status,
            "Binance 주문 접수"
        );

        let side = match response.side.as_str() {
            "SELL" => OrderSide::Sell,
            _ => OrderSide::Buy,
        };
        let average_price = response.avg_price.filter(|p| !p.is_zero());

        Ok(OrderAck {
            order_id: response.order_id.to_string(),
            symbol: request.symbol.clone(),
            side,
            order_type: request.order_type,
            quantity: response.orig_qty,
            filled: Some(response.executed_qty),
            average_price,
            status: response.status,
        })
    }

    async fn fetch_balance(&self, asset: &str) -> Result<AccountBalance, ProviderError> {
        let balances = self.client.balances().await?;
        let Some(balance) = balances
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
        else {
            return Ok(AccountBalance::empty(asset));
        };

        let total = balance.balance + balance.cross_un_pnl;
        Ok(AccountBalance {
            asset: balance.asset,
            total,
            free: balance.available_balance,
            used: (total - balance.available_balance).max(Decimal::ZERO),
            unrealized_pnl: balance.cross_un_pnl,
        })
    }

    async fn fetch_last_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        self.client.ticker_price(symbol).await
    }

    async fn fetch_position_mode(&self) -> Result<PositionMode, ProviderError> {
        let settings = self.client.position_side_dual().await?;
        match settings.get("dualSidePosition").and_then(|v| v.as_bool()) {
            Some(true) => Ok(PositionMode::Hedge),
            Some(false) => Ok(PositionMode::OneWay),
            None => Err(ProviderError::Parse(format!(
                "dualSidePosition 필드 없음: {}",
                settings
            ))),
        }
    }

    async fn fetch_account_settings(&self) -> Result<serde_json::Value, ProviderError> {
        self.client.position_side_dual().await
    }
}
