//! 라우터 구성.

pub mod market;
pub mod orders;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws;

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// 전체 라우터 생성.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/orders", post(orders::place_order))
        .route("/api/orders", get(orders::recent_orders))
        .route(
            "/api/orders/{venue}/{order_id}",
            delete(orders::cancel_order),
        )
        .route("/api/market/{venue}/tickers", get(market::get_tickers))
        .route(
            "/api/market/{venue}/ticker/{base}/{quote}",
            get(market::get_ticker),
        )
        .route(
            "/api/market/{venue}/orderbook/{base}/{quote}",
            get(market::get_orderbook),
        )
        .route(
            "/api/market/{venue}/trades/{base}/{quote}",
            get(market::get_trades),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
