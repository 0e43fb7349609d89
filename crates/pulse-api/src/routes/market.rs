//! 공개 시장 조회 라우트.
//!
//! 익명 어댑터를 그대로 노출합니다. 인증이 필요 없습니다.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use pulse_core::{OrderBook, Symbol, Ticker, TradeTick};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_DEPTH: u32 = 20;
const DEFAULT_TRADE_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    pub depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<u32>,
}

/// GET /api/market/{venue}/tickers
pub async fn get_tickers(
    State(state): State<AppState>,
    Path(venue): Path<String>,
) -> Result<Json<Vec<Ticker>>, ApiError> {
    let adapter = state
        .registry
        .anonymous(&venue)
        .await
        .map_err(ApiError::from_market_query)?;
    let tickers = adapter
        .fetch_tickers()
        .await
        .map_err(ApiError::from_market_query)?;
    Ok(Json(tickers))
}

/// GET /api/market/{venue}/ticker/{base}/{quote}
pub async fn get_ticker(
    State(state): State<AppState>,
    Path((venue, base, quote)): Path<(String, String, String)>,
) -> Result<Json<Ticker>, ApiError> {
    let adapter = state
        .registry
        .anonymous(&venue)
        .await
        .map_err(ApiError::from_market_query)?;
    let ticker = adapter
        .fetch_ticker(&Symbol::new(base, quote))
        .await
        .map_err(ApiError::from_market_query)?;
    Ok(Json(ticker))
}

/// GET /api/market/{venue}/orderbook/{base}/{quote}?depth=
pub async fn get_orderbook(
    State(state): State<AppState>,
    Path((venue, base, quote)): Path<(String, String, String)>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<OrderBook>, ApiError> {
    let adapter = state
        .registry
        .anonymous(&venue)
        .await
        .map_err(ApiError::from_market_query)?;
    let book = adapter
        .fetch_order_book(&Symbol::new(base, quote), query.depth.unwrap_or(DEFAULT_DEPTH))
        .await
        .map_err(ApiError::from_market_query)?;
    Ok(Json(book))
}

/// GET /api/market/{venue}/trades/{base}/{quote}?limit=
pub async fn get_trades(
    State(state): State<AppState>,
    Path((venue, base, quote)): Path<(String, String, String)>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<Vec<TradeTick>>, ApiError> {
    let adapter = state
        .registry
        .anonymous(&venue)
        .await
        .map_err(ApiError::from_market_query)?;
    let trades = adapter
        .fetch_trades(
            &Symbol::new(base, quote),
            query.limit.unwrap_or(DEFAULT_TRADE_LIMIT),
        )
        .await
        .map_err(ApiError::from_market_query)?;
    Ok(Json(trades))
}
