//! API 에러 응답.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use pulse_gateway::GatewayError;
use pulse_venue::{VenueError, VenueErrorKind};

/// API 계층 에러.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 토큰 없음/무효
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 형식 오류
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 잔고 부족
    #[error("{0}")]
    InsufficientBalance(String),

    /// 거래소 미연결
    #[error("{0}")]
    VenueNotConnected(String),

    /// 심볼 없음
    #[error("{0}")]
    SymbolNotFound(String),

    /// 거래소 거부
    #[error("{0}")]
    VenueRejected(String),

    /// 그 외 거래소 에러
    #[error("{0}")]
    VenueError(String),

    /// 실시간 데이터 전면 불가
    #[error("live data unavailable")]
    LiveDataRequired,

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::InsufficientBalance(_) => "insufficient_balance",
            ApiError::VenueNotConnected(_) => "venue_not_connected",
            ApiError::SymbolNotFound(_) => "symbol_not_found",
            ApiError::VenueRejected(_) => "venue_rejected",
            ApiError::VenueError(_) => "venue_error",
            ApiError::LiveDataRequired => "live_data_required",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientBalance(_) | ApiError::VenueRejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::VenueNotConnected(_) => StatusCode::CONFLICT,
            ApiError::SymbolNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::VenueError(_) => StatusCode::BAD_GATEWAY,
            ApiError::LiveDataRequired => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 공개 시장 조회용 매핑: 거래소에 닿지 못한 실패는 모두
    /// LIVE_DATA_REQUIRED로 뭉뚱그립니다.
    pub fn from_market_query(e: VenueError) -> Self {
        match &e.kind {
            VenueErrorKind::SymbolNotFound(symbol) => ApiError::SymbolNotFound(symbol.clone()),
            VenueErrorKind::Network(_)
            | VenueErrorKind::Timeout(_)
            | VenueErrorKind::NotConnected(_)
            | VenueErrorKind::RateLimited => ApiError::LiveDataRequired,
            _ => ApiError::VenueError(e.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::VenueNotConnected(venue) => {
                ApiError::VenueNotConnected(format!("not connected to venue '{}'", venue))
            }
            GatewayError::InsufficientBalance { .. } => {
                ApiError::InsufficientBalance(e.to_string())
            }
            GatewayError::SymbolNotFound(symbol) => ApiError::SymbolNotFound(symbol),
            GatewayError::VenueRejected(reason) => ApiError::VenueRejected(reason),
            GatewayError::Venue(inner) => ApiError::VenueError(inner.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            // 총체적 실패는 고정 문구의 단일 필드로 내려감
            ApiError::LiveDataRequired => json!({ "error": "LIVE_DATA_REQUIRED" }),
            ref e => json!({ "kind": e.kind(), "message": e.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_mapping() {
        let err: ApiError = GatewayError::VenueNotConnected("okx".to_string()).into();
        assert_eq!(err.kind(), "venue_not_connected");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_market_query_total_failure_is_live_data_required() {
        let err = ApiError::from_market_query(VenueError::network("binance", "refused"));
        assert!(matches!(err, ApiError::LiveDataRequired));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
