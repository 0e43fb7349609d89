//! 주문 라우트 (인증 필요).

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use pulse_core::{OrderRequest, OrderResult, OrderType, Side, Symbol};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct OrderPayload {
    pub venue: String,
    /// "BASE/QUOTE" 형식
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    Symbol::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid symbol {:?}, expected BASE/QUOTE", raw)))
}

/// POST /api/orders
pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<OrderPayload>,
) -> Result<Json<OrderResult>, ApiError> {
    let symbol = parse_symbol(&payload.symbol)?;

    if payload.quantity <= Decimal::ZERO {
        return Err(ApiError::BadRequest("quantity must be positive".to_string()));
    }

    let request = match payload.order_type {
        OrderType::Market => OrderRequest::market(symbol, payload.side, payload.quantity),
        OrderType::Limit => {
            let price = payload.price.ok_or_else(|| {
                ApiError::BadRequest("limit orders require a price".to_string())
            })?;
            if price <= Decimal::ZERO {
                return Err(ApiError::BadRequest("price must be positive".to_string()));
            }
            OrderRequest::limit(symbol, payload.side, payload.quantity, price)
        }
    };

    let result = state
        .gateway
        .place_order(&user_id, &payload.venue, request)
        .await?;
    Ok(Json(result))
}

/// DELETE /api/orders/{venue}/{order_id}?symbol=BASE/QUOTE
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((venue, order_id)): Path<(String, String)>,
    Query(query): Query<CancelQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = parse_symbol(&query.symbol)?;

    state
        .gateway
        .cancel_order(&user_id, &venue, &order_id, &symbol)
        .await?;
    Ok(Json(serde_json::json!({ "cancelled": order_id })))
}

/// GET /api/orders?limit=
pub async fn recent_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<OrderResult>>, ApiError> {
    let orders = state
        .cascade
        .recent_orders(&user_id, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(orders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_payload_shape() {
        let payload: OrderPayload = serde_json::from_str(
            r#"{
                "venue": "binance",
                "symbol": "BTC/USDT",
                "side": "buy",
                "type": "limit",
                "quantity": "0.01",
                "price": "50000"
            }"#,
        )
        .unwrap();

        assert_eq!(payload.side, Side::Buy);
        assert_eq!(payload.order_type, OrderType::Limit);
        assert!(payload.price.is_some());
    }

    #[test]
    fn test_symbol_validation() {
        assert!(parse_symbol("BTC/USDT").is_ok());
        assert!(parse_symbol("BTCUSDT").is_err());
    }
}
