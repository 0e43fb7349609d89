//! OKX 거래소 커넥터.
//!
//! OKX v5 REST API 구현. OKX는 서명에 passphrase가 추가로 필요하며,
//! 모든 응답이 `{"code","msg","data"}` 봉투로 감싸져 있습니다.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info};

use pulse_core::{
    Balance, OrderBook, OrderBookLevel, OrderRequest, OrderResult, OrderStatusType, OrderType,
    Side, Symbol, Ticker, TradeTick, VenueKeys,
};

use crate::adapter::{VenueAdapter, VenueResult};
use crate::error::{VenueError, VenueErrorKind};

type HmacSha256 = Hmac<Sha256>;

const VENUE_NAME: &str = "okx";

// ============================================================================
// 설정
// ============================================================================

/// OKX 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(API 키, passphrase)를 마스킹합니다.
#[derive(Clone)]
pub struct OkxConfig {
    /// API 키 묶음 (None이면 익명 모드). passphrase 필수.
    pub keys: Option<VenueKeys>,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for OkxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxConfig")
            .field("keys", &self.keys.as_ref().map(|_| "***REDACTED***"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OkxConfig {
    /// 새 설정 생성.
    pub fn new(keys: Option<VenueKeys>) -> Self {
        Self {
            keys,
            base_url: "https://www.okx.com".to_string(),
            timeout_secs: 30,
        }
    }

    /// 요청 타임아웃 설정.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// 기본 URL 오버라이드 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

/// OKX 공통 응답 봉투.
#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    base_ccy: String,
    quote_ccy: String,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTicker {
    inst_id: String,
    last: String,
    bid_px: String,
    ask_px: String,
    #[serde(default)]
    open24h: String,
    #[serde(default)]
    high24h: String,
    #[serde(default)]
    low24h: String,
    vol24h: String,
}

#[derive(Debug, Deserialize)]
struct OkxBook {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTrade {
    trade_id: String,
    px: String,
    sz: String,
    side: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxBalanceDetail {
    ccy: String,
    avail_bal: String,
    frozen_bal: String,
}

#[derive(Debug, Deserialize)]
struct OkxBalance {
    details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxOrderAck {
    ord_id: String,
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

// ============================================================================
// 어댑터
// ============================================================================

/// OKX 거래소 어댑터.
pub struct OkxAdapter {
    config: OkxConfig,
    client: Client,
}

impl OkxAdapter {
    /// 새 OKX 어댑터 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `Network` 에러를 반환합니다.
    pub fn new(config: OkxConfig) -> Result<Self, VenueError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        Ok(Self { config, client })
    }

    /// 인증 키 반환. 익명 모드이거나 passphrase가 없으면 Unauthorized.
    fn keys(&self) -> VenueResult<(&VenueKeys, &str)> {
        let keys = self.config.keys.as_ref().ok_or_else(|| {
            VenueError::new(
                VENUE_NAME,
                VenueErrorKind::Unauthorized("anonymous adapter".to_string()),
            )
        })?;
        let passphrase = keys.passphrase.as_deref().ok_or_else(|| {
            VenueError::new(
                VENUE_NAME,
                VenueErrorKind::Unauthorized("missing passphrase".to_string()),
            )
        })?;
        Ok((keys, passphrase))
    }

    /// OKX 서명 생성: Base64(HMAC-SHA256(timestamp + method + path + body)).
    fn sign(secret: &str, prehash: &str) -> VenueResult<String> {
        use base64::Engine;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
            VenueError::new(VENUE_NAME, VenueErrorKind::Unauthorized(e.to_string()))
        })?;
        mac.update(prehash.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// ISO8601 밀리초 타임스탬프 (OKX 요구 형식).
    fn timestamp_iso() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: DeserializeOwned>(&self, path_and_query: &str) -> VenueResult<Vec<T>> {
        let url = format!("{}{}", self.config.base_url, path_and_query);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        self.handle_response(response).await
    }

    /// 서명된 API 요청 (인증 필요).
    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path_and_query: &str,
        body: Option<serde_json::Value>,
    ) -> VenueResult<Vec<T>> {
        let (keys, passphrase) = self.keys()?;
        let timestamp = Self::timestamp_iso();

        let body_str = match &body {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| VenueError::parse(VENUE_NAME, e.to_string()))?,
            None => String::new(),
        };

        let prehash = format!("{}{}{}{}", timestamp, method, path_and_query, body_str);
        let signature = Self::sign(&keys.api_secret, &prehash)?;

        let url = format!("{}{}", self.config.base_url, path_and_query);
        debug!("{} (signed) {}", method, path_and_query);

        let mut builder = self
            .client
            .request(method, &url)
            .header("OK-ACCESS-KEY", &keys.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", passphrase)
            .header("Content-Type", "application/json");

        if !body_str.is_empty() {
            builder = builder.body(body_str);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        self.handle_response(response).await
    }

    /// 응답 봉투 처리. `code != "0"`은 에러입니다.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> VenueResult<Vec<T>> {
        let body = response
            .text()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        let envelope: OkxEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse OKX response: {} - Body: {}", e, body);
            VenueError::parse(VENUE_NAME, e.to_string())
        })?;

        if envelope.code != "0" {
            return Err(Self::map_error_code(&envelope.code, &envelope.msg));
        }

        Ok(envelope.data)
    }

    /// OKX 에러 코드를 VenueError로 매핑.
    fn map_error_code(code: &str, msg: &str) -> VenueError {
        let kind = match code {
            "50011" => VenueErrorKind::RateLimited,
            "50111" | "50113" | "50114" => VenueErrorKind::Unauthorized(msg.to_string()),
            "51001" | "51000" => VenueErrorKind::SymbolNotFound(msg.to_string()),
            "51008" => VenueErrorKind::InsufficientBalance(msg.to_string()),
            _ => VenueErrorKind::Api {
                code: code.parse().unwrap_or(-1),
                message: msg.to_string(),
            },
        };
        VenueError::new(VENUE_NAME, kind)
    }

    /// 내부 Symbol을 OKX instId로 변환 ("BTC/USDT" -> "BTC-USDT").
    fn to_inst_id(symbol: &Symbol) -> String {
        symbol.joined_with('-')
    }

    /// OKX instId를 내부 Symbol로 분해.
    fn from_inst_id(inst_id: &str) -> Option<Symbol> {
        let (base, quote) = inst_id.split_once('-')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Symbol::new(base, quote))
    }

    /// 필수 수치 필드 파싱.
    fn parse_required(field: &str, value: &str) -> VenueResult<Decimal> {
        value
            .parse()
            .map_err(|_| VenueError::parse(VENUE_NAME, format!("{}: {:?}", field, value)))
    }

    /// 선택적 수치 필드 파싱. 부재/실패 시 0.
    fn parse_optional(value: &str) -> Decimal {
        value.parse().unwrap_or(Decimal::ZERO)
    }

    /// OKX 티커를 내부 Ticker로 정규화.
    ///
    /// OKX는 변화율을 직접 주지 않으므로 24시간 시가 대비로 계산합니다.
    fn normalize_ticker(raw: &OkxTicker, symbol: Symbol) -> VenueResult<Ticker> {
        let last = Self::parse_required("last", &raw.last)?;
        let open_24h = Self::parse_optional(&raw.open24h);

        let change_24h_percent = if open_24h > Decimal::ZERO {
            (last - open_24h) / open_24h * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Ok(Ticker {
            symbol,
            venue: VENUE_NAME.to_string(),
            last,
            bid: Self::parse_required("bidPx", &raw.bid_px)?,
            ask: Self::parse_required("askPx", &raw.ask_px)?,
            change_24h_percent,
            volume_24h: Self::parse_required("vol24h", &raw.vol24h)?,
            high_24h: Self::parse_optional(&raw.high24h),
            low_24h: Self::parse_optional(&raw.low24h),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl VenueAdapter for OkxAdapter {
    fn name(&self) -> &str {
        VENUE_NAME
    }

    async fn load_markets(&self) -> VenueResult<Vec<Symbol>> {
        let data: Vec<OkxInstrument> = self
            .public_get("/api/v5/public/instruments?instType=SPOT")
            .await?;

        let markets = data
            .into_iter()
            .filter(|m| m.state == "live")
            .map(|m| Symbol::new(m.base_ccy, m.quote_ccy))
            .collect::<Vec<_>>();

        info!("Loaded {} OKX markets", markets.len());
        Ok(markets)
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> VenueResult<Ticker> {
        let path = format!("/api/v5/market/ticker?instId={}", Self::to_inst_id(symbol));
        let data: Vec<OkxTicker> = self.public_get(&path).await?;

        let raw = data.first().ok_or_else(|| {
            VenueError::new(
                VENUE_NAME,
                VenueErrorKind::SymbolNotFound(symbol.to_string()),
            )
        })?;

        Self::normalize_ticker(raw, symbol.clone())
    }

    async fn fetch_tickers(&self) -> VenueResult<Vec<Ticker>> {
        let data: Vec<OkxTicker> = self.public_get("/api/v5/market/tickers?instType=SPOT").await?;

        let mut tickers = Vec::with_capacity(data.len());
        for raw in &data {
            let Some(symbol) = Self::from_inst_id(&raw.inst_id) else {
                continue;
            };
            match Self::normalize_ticker(raw, symbol) {
                Ok(ticker) => tickers.push(ticker),
                Err(e) => debug!("Skipping malformed ticker {}: {}", raw.inst_id, e),
            }
        }

        Ok(tickers)
    }

    async fn fetch_order_book(&self, symbol: &Symbol, depth: u32) -> VenueResult<OrderBook> {
        let path = format!(
            "/api/v5/market/books?instId={}&sz={}",
            Self::to_inst_id(symbol),
            depth
        );
        let data: Vec<OkxBook> = self.public_get(&path).await?;

        let book = data.into_iter().next().ok_or_else(|| {
            VenueError::new(
                VENUE_NAME,
                VenueErrorKind::SymbolNotFound(symbol.to_string()),
            )
        })?;

        // OKX 호가 레벨: [가격, 수량, ...부가 필드]
        let parse_levels = |levels: Vec<Vec<String>>| -> VenueResult<Vec<OrderBookLevel>> {
            levels
                .into_iter()
                .map(|level| {
                    let price = level
                        .first()
                        .ok_or_else(|| VenueError::parse(VENUE_NAME, "empty book level"))?;
                    let qty = level
                        .get(1)
                        .ok_or_else(|| VenueError::parse(VENUE_NAME, "book level missing size"))?;
                    Ok(OrderBookLevel {
                        price: Self::parse_required("price", price)?,
                        quantity: Self::parse_required("size", qty)?,
                    })
                })
                .collect()
        };

        Ok(OrderBook {
            symbol: symbol.clone(),
            venue: VENUE_NAME.to_string(),
            bids: parse_levels(book.bids)?,
            asks: parse_levels(book.asks)?,
            timestamp: Utc::now(),
        })
    }

    async fn fetch_trades(&self, symbol: &Symbol, limit: u32) -> VenueResult<Vec<TradeTick>> {
        let path = format!(
            "/api/v5/market/trades?instId={}&limit={}",
            Self::to_inst_id(symbol),
            limit
        );
        let data: Vec<OkxTrade> = self.public_get(&path).await?;

        data.into_iter()
            .map(|t| {
                let timestamp = t
                    .ts
                    .parse::<i64>()
                    .ok()
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .unwrap_or_else(Utc::now);

                Ok(TradeTick {
                    symbol: symbol.clone(),
                    venue: VENUE_NAME.to_string(),
                    id: t.trade_id,
                    price: Self::parse_required("px", &t.px)?,
                    quantity: Self::parse_required("sz", &t.sz)?,
                    side: if t.side == "buy" { Side::Buy } else { Side::Sell },
                    timestamp,
                })
            })
            .collect()
    }

    async fn fetch_balance(&self) -> VenueResult<Vec<Balance>> {
        let data: Vec<OkxBalance> = self
            .signed_request(reqwest::Method::GET, "/api/v5/account/balance", None)
            .await?;

        let account = data.into_iter().next().unwrap_or(OkxBalance {
            details: Vec::new(),
        });

        Ok(account
            .details
            .into_iter()
            .filter_map(|d| {
                let free = Self::parse_optional(&d.avail_bal);
                let locked = Self::parse_optional(&d.frozen_bal);
                if free > Decimal::ZERO || locked > Decimal::ZERO {
                    Some(Balance {
                        asset: d.ccy,
                        free,
                        locked,
                    })
                } else {
                    None
                }
            })
            .collect())
    }

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<OrderResult> {
        let inst_id = Self::to_inst_id(&request.symbol);

        let side = match request.side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        };
        let ord_type = match request.order_type {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        };

        let mut body = serde_json::json!({
            "instId": inst_id,
            "tdMode": "cash",
            "side": side,
            "ordType": ord_type,
            "sz": request.quantity.to_string(),
        });

        match request.order_type {
            OrderType::Limit => {
                if let Some(price) = request.price {
                    body["px"] = serde_json::Value::String(price.to_string());
                }
            }
            OrderType::Market => {
                // 시장가 매수의 sz 단위를 기준 자산으로 고정
                body["tgtCcy"] = serde_json::Value::String("base_ccy".to_string());
            }
        }

        info!(
            "Placing {} {} order for {} {} @ {:?}",
            side, ord_type, request.quantity, request.symbol, request.price
        );

        let data: Vec<OkxOrderAck> = self
            .signed_request(reqwest::Method::POST, "/api/v5/trade/order", Some(body))
            .await?;

        let ack = data.into_iter().next().ok_or_else(|| {
            VenueError::parse(VENUE_NAME, "empty order response")
        })?;

        if ack.s_code != "0" {
            return Err(Self::map_error_code(&ack.s_code, &ack.s_msg));
        }

        info!("Order placed successfully: {}", ack.ord_id);

        let now = Utc::now();
        Ok(OrderResult {
            venue: VENUE_NAME.to_string(),
            venue_order_id: ack.ord_id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            filled_quantity: Decimal::ZERO,
            status: OrderStatusType::Open,
            created_at: now,
            updated_at: now,
        })
    }

    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> VenueResult<()> {
        let body = serde_json::json!({
            "instId": Self::to_inst_id(symbol),
            "ordId": order_id,
        });

        let data: Vec<OkxOrderAck> = self
            .signed_request(
                reqwest::Method::POST,
                "/api/v5/trade/cancel-order",
                Some(body),
            )
            .await?;

        if let Some(ack) = data.first() {
            if ack.s_code != "0" {
                return Err(Self::map_error_code(&ack.s_code, &ack.s_msg));
            }
        }

        info!("Order {} cancelled", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_inst_id_conversion() {
        let symbol = Symbol::new("BTC", "USDT");
        assert_eq!(OkxAdapter::to_inst_id(&symbol), "BTC-USDT");

        let parsed = OkxAdapter::from_inst_id("ETH-USDT").unwrap();
        assert_eq!(parsed.base, "ETH");
        assert_eq!(parsed.quote, "USDT");

        assert!(OkxAdapter::from_inst_id("BTCUSDT").is_none());
    }

    #[test]
    fn test_change_percent_computed_from_open() {
        let raw = OkxTicker {
            inst_id: "BTC-USDT".to_string(),
            last: "110".to_string(),
            bid_px: "109".to_string(),
            ask_px: "111".to_string(),
            open24h: "100".to_string(),
            high24h: "112".to_string(),
            low24h: "99".to_string(),
            vol24h: "1000".to_string(),
        };

        let ticker = OkxAdapter::normalize_ticker(&raw, Symbol::new("BTC", "USDT")).unwrap();
        assert_eq!(ticker.change_24h_percent, dec!(10));
        assert_eq!(ticker.high_24h, dec!(112));
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v5/market/ticker")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"51001","msg":"Instrument ID does not exist","data":[]}"#)
            .create_async()
            .await;

        let config = OkxConfig::new(None).with_base_url(server.url());
        let adapter = OkxAdapter::new(config).unwrap();

        let err = adapter
            .fetch_ticker(&Symbol::new("FAKE", "USDT"))
            .await
            .unwrap_err();

        assert_eq!(err.venue, "okx");
        assert!(matches!(err.kind, VenueErrorKind::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn test_anonymous_order_fails() {
        let config = OkxConfig::new(None);
        let adapter = OkxAdapter::new(config).unwrap();

        let request = OrderRequest::limit(
            Symbol::new("BTC", "USDT"),
            Side::Buy,
            dec!(0.01),
            dec!(50000),
        );
        let err = adapter.place_order(&request).await.unwrap_err();
        assert!(matches!(err.kind, VenueErrorKind::Unauthorized(_)));
    }
}
