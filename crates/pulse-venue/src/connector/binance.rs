//! Binance 거래소 커넥터.
//!
//! Binance Spot REST API 구현. 익명 모드(공개 데이터 전용)와
//! 인증 모드(잔고/주문)를 모두 지원합니다.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
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

const VENUE_NAME: &str = "binance";

/// 일반적인 호가 자산. 결합 심볼("BTCUSDT")을 분해할 때 사용합니다.
const KNOWN_QUOTES: [&str; 6] = ["USDT", "USDC", "FDUSD", "BTC", "ETH", "BNB"];

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(API 키)를 마스킹합니다.
#[derive(Clone)]
pub struct BinanceConfig {
    /// API 키 묶음 (None이면 익명 모드)
    pub keys: Option<VenueKeys>,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("keys", &self.keys.as_ref().map(|_| "***REDACTED***"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl BinanceConfig {
    /// 새 설정 생성.
    pub fn new(keys: Option<VenueKeys>) -> Self {
        Self {
            keys,
            base_url: "https://api.binance.com".to_string(),
            timeout_secs: 30,
            recv_window: 5000,
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceMarket {
    base_asset: String,
    quote_asset: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    price_change_percent: String,
    last_price: String,
    bid_price: String,
    ask_price: String,
    high_price: String,
    low_price: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct BinanceDepth {
    last_update_id: i64,
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTrade {
    id: i64,
    price: String,
    qty: String,
    time: i64,
    is_buyer_maker: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountInfo {
    balances: Vec<BinanceAccountBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct BinanceOrderResponse {
    symbol: String,
    order_id: i64,
    client_order_id: String,
    transact_time: Option<i64>,
    price: String,
    orig_qty: String,
    executed_qty: String,
    status: String,
    #[serde(rename = "type")]
    order_type: String,
    side: String,
}

#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i32,
    msg: String,
}

// ============================================================================
// 어댑터
// ============================================================================

/// Binance 거래소 어댑터.
pub struct BinanceAdapter {
    config: BinanceConfig,
    client: Client,
}

impl BinanceAdapter {
    /// 새 Binance 어댑터 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `Network` 에러를 반환합니다.
    pub fn new(config: BinanceConfig) -> Result<Self, VenueError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        Ok(Self { config, client })
    }

    /// 현재 타임스탬프(밀리초) 반환.
    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// 인증 키 반환. 익명 모드이면 Unauthorized 에러.
    fn keys(&self) -> VenueResult<&VenueKeys> {
        self.config.keys.as_ref().ok_or_else(|| {
            VenueError::new(
                VENUE_NAME,
                VenueErrorKind::Unauthorized("anonymous adapter".to_string()),
            )
        })
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    fn sign(&self, secret: &str, query: &str) -> VenueResult<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
            VenueError::new(VENUE_NAME, VenueErrorKind::Unauthorized(e.to_string()))
        })?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> VenueResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let query = Self::build_query(params);

        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let response = self
            .client
            .get(&full_url)
            .send()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        self.handle_response(response).await
    }

    /// 서명된 API 요청 (인증 필요).
    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> VenueResult<T> {
        let keys = self.keys()?;
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut all_params = params.to_vec();
        all_params.push(("timestamp", Self::timestamp_ms().to_string()));
        all_params.push(("recvWindow", self.config.recv_window.to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.sign(&keys.api_secret, &query)?;
        let full_url = format!("{}?{}&signature={}", url, query, signature);

        debug!("{} (signed) {}", method, endpoint);

        let response = self
            .client
            .request(method, &full_url)
            .header("X-MBX-APIKEY", &keys.api_key)
            .send()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> VenueResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VenueError::network(VENUE_NAME, e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                VenueError::parse(VENUE_NAME, e.to_string())
            })
        } else if let Ok(api_err) = serde_json::from_str::<BinanceApiError>(&body) {
            Err(Self::map_error_code(api_err.code, &api_err.msg))
        } else {
            Err(VenueError::new(
                VENUE_NAME,
                VenueErrorKind::Api {
                    code: status.as_u16() as i32,
                    message: body,
                },
            ))
        }
    }

    /// Binance 에러 코드를 VenueError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> VenueError {
        let kind = match code {
            -1002 | -2014 | -2015 => VenueErrorKind::Unauthorized(msg.to_string()),
            -1003 => VenueErrorKind::RateLimited,
            -1013 | -2011 => VenueErrorKind::OrderRejected(msg.to_string()),
            -1121 => VenueErrorKind::SymbolNotFound(msg.to_string()),
            -2010 => VenueErrorKind::InsufficientBalance(msg.to_string()),
            _ => VenueErrorKind::Api {
                code,
                message: msg.to_string(),
            },
        };
        VenueError::new(VENUE_NAME, kind)
    }

    /// 내부 Symbol을 Binance 심볼 형식으로 변환 ("BTC/USDT" -> "BTCUSDT").
    fn to_venue_symbol(symbol: &Symbol) -> String {
        symbol.joined()
    }

    /// 결합 심볼을 내부 Symbol로 분해.
    ///
    /// 알 수 없는 호가 자산이면 `None`을 반환합니다 (합성하지 않음).
    fn from_venue_symbol(venue_symbol: &str) -> Option<Symbol> {
        for quote in KNOWN_QUOTES {
            if let Some(base) = venue_symbol.strip_suffix(quote) {
                if !base.is_empty() {
                    return Some(Symbol::new(base, quote));
                }
            }
        }
        None
    }

    /// 필수 수치 필드 파싱. 실패 시 파싱 에러.
    fn parse_required(field: &str, value: &str) -> VenueResult<Decimal> {
        value
            .parse()
            .map_err(|_| VenueError::parse(VENUE_NAME, format!("{}: {:?}", field, value)))
    }

    /// 선택적 수치 필드 파싱. 부재/실패 시 0.
    fn parse_optional(value: &str) -> Decimal {
        value.parse().unwrap_or(Decimal::ZERO)
    }

    /// 24시간 티커 응답을 내부 Ticker로 정규화.
    fn normalize_ticker(resp: &BinanceTicker24h, symbol: Symbol) -> VenueResult<Ticker> {
        Ok(Ticker {
            symbol,
            venue: VENUE_NAME.to_string(),
            last: Self::parse_required("lastPrice", &resp.last_price)?,
            bid: Self::parse_required("bidPrice", &resp.bid_price)?,
            ask: Self::parse_required("askPrice", &resp.ask_price)?,
            change_24h_percent: Self::parse_required(
                "priceChangePercent",
                &resp.price_change_percent,
            )?,
            volume_24h: Self::parse_required("volume", &resp.volume)?,
            high_24h: Self::parse_optional(&resp.high_price),
            low_24h: Self::parse_optional(&resp.low_price),
            timestamp: Utc::now(),
        })
    }

    /// 주문 응답을 내부 OrderResult로 정규화.
    fn normalize_order(&self, resp: &BinanceOrderResponse, request: &OrderRequest) -> OrderResult {
        let status = match resp.status.as_str() {
            "NEW" => OrderStatusType::Open,
            "PARTIALLY_FILLED" => OrderStatusType::PartiallyFilled,
            "FILLED" => OrderStatusType::Filled,
            "CANCELED" => OrderStatusType::Cancelled,
            "REJECTED" => OrderStatusType::Rejected,
            "EXPIRED" => OrderStatusType::Expired,
            _ => OrderStatusType::Open,
        };

        let created_at = resp
            .transact_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        OrderResult {
            venue: VENUE_NAME.to_string(),
            venue_order_id: resp.order_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            filled_quantity: Self::parse_optional(&resp.executed_qty),
            status,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl VenueAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        VENUE_NAME
    }

    async fn load_markets(&self) -> VenueResult<Vec<Symbol>> {
        let resp: BinanceExchangeInfo = self.public_get("/api/v3/exchangeInfo", &[]).await?;

        let markets = resp
            .symbols
            .into_iter()
            .filter(|m| m.status == "TRADING")
            .map(|m| Symbol::new(m.base_asset, m.quote_asset))
            .collect::<Vec<_>>();

        info!("Loaded {} Binance markets", markets.len());
        Ok(markets)
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> VenueResult<Ticker> {
        let venue_symbol = Self::to_venue_symbol(symbol);
        let resp: BinanceTicker24h = self
            .public_get("/api/v3/ticker/24hr", &[("symbol", venue_symbol)])
            .await?;

        Self::normalize_ticker(&resp, symbol.clone())
    }

    async fn fetch_tickers(&self) -> VenueResult<Vec<Ticker>> {
        let resp: Vec<BinanceTicker24h> = self.public_get("/api/v3/ticker/24hr", &[]).await?;

        // 알 수 없는 호가 자산의 결합 심볼은 분해할 수 없으므로 건너뜀
        let mut tickers = Vec::with_capacity(resp.len());
        for raw in &resp {
            let Some(symbol) = Self::from_venue_symbol(&raw.symbol) else {
                continue;
            };
            match Self::normalize_ticker(raw, symbol) {
                Ok(ticker) => tickers.push(ticker),
                Err(e) => debug!("Skipping malformed ticker {}: {}", raw.symbol, e),
            }
        }

        Ok(tickers)
    }

    async fn fetch_order_book(&self, symbol: &Symbol, depth: u32) -> VenueResult<OrderBook> {
        let venue_symbol = Self::to_venue_symbol(symbol);
        let resp: BinanceDepth = self
            .public_get(
                "/api/v3/depth",
                &[("symbol", venue_symbol), ("limit", depth.to_string())],
            )
            .await?;

        let parse_levels = |levels: Vec<[String; 2]>| -> VenueResult<Vec<OrderBookLevel>> {
            levels
                .into_iter()
                .map(|[price, qty]| {
                    Ok(OrderBookLevel {
                        price: Self::parse_required("price", &price)?,
                        quantity: Self::parse_required("qty", &qty)?,
                    })
                })
                .collect()
        };

        Ok(OrderBook {
            symbol: symbol.clone(),
            venue: VENUE_NAME.to_string(),
            bids: parse_levels(resp.bids)?,
            asks: parse_levels(resp.asks)?,
            timestamp: Utc::now(),
        })
    }

    async fn fetch_trades(&self, symbol: &Symbol, limit: u32) -> VenueResult<Vec<TradeTick>> {
        let venue_symbol = Self::to_venue_symbol(symbol);
        let resp: Vec<BinanceTrade> = self
            .public_get(
                "/api/v3/trades",
                &[("symbol", venue_symbol), ("limit", limit.to_string())],
            )
            .await?;

        resp.into_iter()
            .map(|t| {
                Ok(TradeTick {
                    symbol: symbol.clone(),
                    venue: VENUE_NAME.to_string(),
                    id: t.id.to_string(),
                    price: Self::parse_required("price", &t.price)?,
                    quantity: Self::parse_required("qty", &t.qty)?,
                    // 매수자가 maker면 테이커는 매도
                    side: if t.is_buyer_maker {
                        Side::Sell
                    } else {
                        Side::Buy
                    },
                    timestamp: DateTime::from_timestamp_millis(t.time).unwrap_or_else(Utc::now),
                })
            })
            .collect()
    }

    async fn fetch_balance(&self) -> VenueResult<Vec<Balance>> {
        let resp: BinanceAccountInfo = self
            .signed_request(reqwest::Method::GET, "/api/v3/account", &[])
            .await?;

        Ok(resp
            .balances
            .into_iter()
            .filter_map(|b| {
                let free = Self::parse_optional(&b.free);
                let locked = Self::parse_optional(&b.locked);
                if free > Decimal::ZERO || locked > Decimal::ZERO {
                    Some(Balance {
                        asset: b.asset,
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
        let venue_symbol = Self::to_venue_symbol(&request.symbol);

        let side = match request.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let order_type = match request.order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        };

        let mut params = vec![
            ("symbol", venue_symbol),
            ("side", side.to_string()),
            ("type", order_type.to_string()),
            ("quantity", request.quantity.to_string()),
        ];

        if let Some(price) = request.price {
            params.push(("price", price.to_string()));
            params.push(("timeInForce", "GTC".to_string()));
        }

        info!(
            "Placing {} {} order for {} {} @ {:?}",
            side, order_type, request.quantity, request.symbol, request.price
        );

        let resp: BinanceOrderResponse = self
            .signed_request(reqwest::Method::POST, "/api/v3/order", &params)
            .await?;

        info!("Order placed successfully: {}", resp.order_id);
        Ok(self.normalize_order(&resp, request))
    }

    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> VenueResult<()> {
        let params = vec![
            ("symbol", Self::to_venue_symbol(symbol)),
            ("orderId", order_id.to_string()),
        ];

        let _: BinanceOrderResponse = self
            .signed_request(reqwest::Method::DELETE, "/api/v3/order", &params)
            .await?;

        info!("Order {} cancelled", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn anonymous_adapter(base_url: &str) -> BinanceAdapter {
        let config = BinanceConfig::new(None).with_base_url(base_url);
        BinanceAdapter::new(config).unwrap()
    }

    #[test]
    fn test_symbol_conversion() {
        let symbol = Symbol::new("BTC", "USDT");
        assert_eq!(BinanceAdapter::to_venue_symbol(&symbol), "BTCUSDT");

        let parsed = BinanceAdapter::from_venue_symbol("ETHUSDT").unwrap();
        assert_eq!(parsed.base, "ETH");
        assert_eq!(parsed.quote, "USDT");

        // 알 수 없는 호가 자산은 분해하지 않음
        assert!(BinanceAdapter::from_venue_symbol("BTCXYZ").is_none());
    }

    #[test]
    fn test_sign() {
        let config = BinanceConfig::new(Some(VenueKeys::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A".to_string(),
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string(),
        )));
        let adapter = BinanceAdapter::new(config).unwrap();

        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        let signature = adapter
            .sign("NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j", query)
            .unwrap();

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[tokio::test]
    async fn test_anonymous_signed_call_fails() {
        let adapter = anonymous_adapter("http://localhost:1");
        let err = adapter.fetch_balance().await.unwrap_err();
        assert!(matches!(err.kind, VenueErrorKind::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_fetch_tickers_normalization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/ticker/24hr")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"symbol":"BTCUSDT","priceChangePercent":"2.5","lastPrice":"50000.0",
                     "bidPrice":"49999.0","askPrice":"50001.0","highPrice":"51000.0",
                     "lowPrice":"49000.0","volume":"1200.5"},
                    {"symbol":"UNKNOWNPAIR","priceChangePercent":"0","lastPrice":"1",
                     "bidPrice":"1","askPrice":"1","highPrice":"1","lowPrice":"1","volume":"1"}
                ]"#,
            )
            .create_async()
            .await;

        let adapter = anonymous_adapter(&server.url());
        let tickers = adapter.fetch_tickers().await.unwrap();

        mock.assert_async().await;

        // 분해 불가능한 심볼은 제외됨
        assert_eq!(tickers.len(), 1);
        let ticker = &tickers[0];
        assert_eq!(ticker.symbol.to_string(), "BTC/USDT");
        assert_eq!(ticker.venue, "binance");
        assert_eq!(ticker.last, dec!(50000.0));
        assert_eq!(ticker.volume_24h, dec!(1200.5));
    }

    #[tokio::test]
    async fn test_error_code_mapping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/ticker/24hr")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let adapter = anonymous_adapter(&server.url());
        let err = adapter
            .fetch_ticker(&Symbol::new("FAKE", "USDT"))
            .await
            .unwrap_err();

        assert_eq!(err.venue, "binance");
        assert!(matches!(err.kind, VenueErrorKind::SymbolNotFound(_)));
    }
}
