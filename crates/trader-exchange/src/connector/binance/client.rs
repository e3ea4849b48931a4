//! Binance USDⓈ-M 선물 REST 클라이언트.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::debug;
use trader_core::{to_exchange_symbol, FuturesOrderRequest, ProviderError};

use super::types::{
    BinanceBalance, BinanceOrderResponse, BinancePositionRisk, FundingRateInfo, Kline,
    OpenInterest, OrderBookSnapshot, RawDepth, Ticker24h, TickerPrice,
};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";
const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";

// ============================================================================
// 설정
// ============================================================================

/// Binance 선물 API 설정.
///
/// API 키는 `SecretString`으로 보관되어 `Debug` 출력에 노출되지 않습니다.
#[derive(Debug, Clone)]
pub struct BinanceFuturesConfig {
    pub api_key: SecretString,
    pub api_secret: SecretString,
    pub base_url: String,
    /// 서명 요청 유효 시간 (ms)
    pub recv_window: u64,
    /// HTTP 요청 타임아웃
    pub timeout: Duration,
}

impl BinanceFuturesConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            api_secret: SecretString::from(api_secret.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            recv_window: 5000,
            timeout: Duration::from_secs(10),
        }
    }

    /// 테스트넷 엔드포인트 사용.
    pub fn testnet(mut self) -> Self {
        self.base_url = TESTNET_BASE_URL.to_string();
        self
    }

    /// 엔드포인트 변경.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// ============================================================================
// 클라이언트
// ============================================================================

pub struct BinanceFuturesClient {
    client: Client,
    config: BinanceFuturesConfig,
}

impl BinanceFuturesClient {
    pub fn new(config: BinanceFuturesConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn sign(&self, query: &str) -> Result<String, ProviderError> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.expose_secret().as_bytes())
            .map_err(|e| ProviderError::Authentication(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 서명이 필요한 요청.
    ///
    /// `timestamp`와 `recvWindow`를 붙인 쿼리 문자열에 HMAC-SHA256 서명을 추가합니다.
    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ProviderError> {
        params.push(("recvWindow", self.config.recv_window.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let signature = self.sign(&query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.config.base_url, path, query, signature
        );

        debug!(method = %method, path, "Binance 서명 요청");

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::handle_response(response).await
    }

    /// 공개 API 요청.
    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    // ==================== 인증 API ====================

    /// 포지션 조회 (`GET /fapi/v2/positionRisk`).
    pub async fn position_risk(&self, symbol: &str) -> Result<Vec<BinancePositionRisk>, ProviderError> {
        self.signed_request(
            Method::GET,
            "/fapi/v2/positionRisk",
            vec![("symbol", to_exchange_symbol(symbol))],
        )
        .await
    }

    /// 레버리지 변경 (`POST /fapi/v1/leverage`).
    pub async fn change_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .signed_request(
                Method::POST,
                "/fapi/v1/leverage",
                vec![
                    ("symbol", to_exchange_symbol(symbol)),
                    ("leverage", leverage.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// 주문 제출 (`POST /fapi/v1/order`).
    ///
    /// 헤지 모드 주문은 `positionSide`를, 단방향 청산 주문은 `reduceOnly`를 전송합니다.
    pub async fn new_order(
        &self,
        request: &FuturesOrderRequest,
    ) -> Result<BinanceOrderResponse, ProviderError> {
        self.signed_request(Method::POST, "/fapi/v1/order", order_params(request))
            .await
    }

    /// 선물 지갑 잔고 (`GET /fapi/v2/balance`).
    pub async fn balances(&self) -> Result<Vec<BinanceBalance>, ProviderError> {
        self.signed_request(Method::GET, "/fapi/v2/balance", Vec::new())
            .await
    }

    /// 포지션 모드 설정 원본 (`GET /fapi/v1/positionSide/dual`).
    pub async fn position_side_dual(&self) -> Result<serde_json::Value, ProviderError> {
        self.signed_request(Method::GET, "/fapi/v1/positionSide/dual", Vec::new())
            .await
    }

    // ==================== 공개 API ====================

    /// 최근 체결가 (`GET /fapi/v1/ticker/price`).
    pub async fn ticker_price(&self, symbol: &str) -> Result<rust_decimal::Decimal, ProviderError> {
        let ticker: TickerPrice = self
            .public_get(
                "/fapi/v1/ticker/price",
                &[("symbol", to_exchange_symbol(symbol))],
            )
            .await?;
        Ok(ticker.price)
    }

    /// 캔들 (`GET /fapi/v1/klines`).
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ProviderError> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", to_exchange_symbol(symbol)),
                    ("interval", interval.to_string()),
                    ("limit", limit.min(1500).to_string()),
                ],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Kline::from_row(row)
                    .ok_or_else(|| ProviderError::Parse(format!("잘못된 캔들 데이터: {:?}", row)))
            })
            .collect()
    }

    /// 펀딩비 + 마크 가격 (`GET /fapi/v1/premiumIndex`).
    pub async fn premium_index(&self, symbol: &str) -> Result<FundingRateInfo, ProviderError> {
        self.public_get(
            "/fapi/v1/premiumIndex",
            &[("symbol", to_exchange_symbol(symbol))],
        )
        .await
    }

    /// 호가 (`GET /fapi/v1/depth`).
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<OrderBookSnapshot, ProviderError> {
        let raw: RawDepth = self
            .public_get(
                "/fapi/v1/depth",
                &[
                    ("symbol", to_exchange_symbol(symbol)),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(raw.into())
    }

    /// 24시간 시세 (`GET /fapi/v1/ticker/24hr`).
    pub async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h, ProviderError> {
        self.public_get(
            "/fapi/v1/ticker/24hr",
            &[("symbol", to_exchange_symbol(symbol))],
        )
        .await
    }

    /// 미결제약정 (`GET /fapi/v1/openInterest`).
    pub async fn open_interest(&self, symbol: &str) -> Result<rust_decimal::Decimal, ProviderError> {
        let oi: OpenInterest = self
            .public_get(
                "/fapi/v1/openInterest",
                &[("symbol", to_exchange_symbol(symbol))],
            )
            .await?;
        Ok(oi.open_interest)
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

// ============================================================================
// 헬퍼
// ============================================================================

fn order_params(request: &FuturesOrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", to_exchange_symbol(&request.symbol)),
        ("side", request.side.as_str().to_string()),
        ("type", request.order_type.as_str().to_string()),
        ("quantity", request.quantity.normalize().to_string()),
        ("newOrderRespType", "RESULT".to_string()),
    ];
    if let Some(tag) = request.position_side {
        params.push(("positionSide", tag.as_str().to_string()));
    }
    if request.reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    if let Some(stop_price) = request.stop_price {
        params.push(("stopPrice", stop_price.normalize().to_string()));
        params.push(("workingType", "MARK_PRICE".to_string()));
    }
    if let Some(id) = &request.client_order_id {
        params.push(("newClientOrderId", id.clone()));
    }
    params
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// -1001 DISCONNECTED: 거래소 내부 오류, 처리 여부 불명
const BINANCE_INTERNAL_ERROR: i64 = -1001;
/// -1021: 타임스탬프가 recvWindow 밖. 새 타임스탬프로 다시 보내면 됨
const BINANCE_TIMESTAMP_OUTSIDE_WINDOW: i64 = -1021;

/// HTTP 상태 코드를 일시적/영구적 에러로 분류.
///
/// - 5xx: 거래소 이용 불가 (재시도)
/// - 408: 타임아웃 (재시도)
/// - 본문 코드 -1001, -1021: 상태 코드와 무관하게 일시적 에러
/// - 401: 인증 실패
/// - 그 외 4xx: API 에러 (Binance `{"code": -2019, "msg": "..."}` 본문 포함)
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let (code, message) = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match (json.get("code"), json.get("msg")) {
            (Some(code), Some(msg)) => (
                code.as_i64(),
                format!("{} {}", code, msg.as_str().unwrap_or_default()),
            ),
            _ => (None, body.to_string()),
        },
        Err(_) => (None, body.to_string()),
    };
    let message = format!("HTTP {}: {}", status.as_u16(), message);

    if status.is_server_error() || code == Some(BINANCE_INTERNAL_ERROR) {
        ProviderError::ExchangeUnavailable(message)
    } else if status == StatusCode::REQUEST_TIMEOUT
        || code == Some(BINANCE_TIMESTAMP_OUTSIDE_WINDOW)
    {
        ProviderError::Timeout(message)
    } else if status == StatusCode::UNAUTHORIZED {
        ProviderError::Authentication(message)
    } else {
        ProviderError::Api(message)
    }
}
