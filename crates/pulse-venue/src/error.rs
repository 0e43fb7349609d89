//! 거래소 에러 타입.
//!
//! 모든 어댑터 실패는 거래소 이름이 태깅된 `VenueError`로 반환됩니다.

use thiserror::Error;

/// 거래소 에러의 세부 종류.
#[derive(Debug, Error)]
pub enum VenueErrorKind {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 잔고 부족 (거래소 측 판정)
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 활성화되지 않은 연결 (자격증명 없음 또는 연결 probe 실패)
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// 거래소 이름이 태깅된 거래소 에러.
#[derive(Debug, Error)]
#[error("[{venue}] {kind}")]
pub struct VenueError {
    /// 거래소 이름
    pub venue: String,
    /// 에러 종류
    #[source]
    pub kind: VenueErrorKind,
}

impl VenueError {
    /// 새 에러를 생성합니다.
    pub fn new(venue: impl Into<String>, kind: VenueErrorKind) -> Self {
        Self {
            venue: venue.into(),
            kind,
        }
    }

    /// 네트워크 에러 헬퍼.
    pub fn network(venue: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(venue, VenueErrorKind::Network(msg.into()))
    }

    /// 파싱 에러 헬퍼.
    pub fn parse(venue: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(venue, VenueErrorKind::Parse(msg.into()))
    }

    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            VenueErrorKind::Network(_) | VenueErrorKind::RateLimited | VenueErrorKind::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_venue_tag() {
        let err = VenueError::network("binance", "connection refused");
        assert_eq!(err.venue, "binance");
        assert!(err.to_string().contains("[binance]"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VenueError::new("okx", VenueErrorKind::RateLimited).is_retryable());
        assert!(!VenueError::new(
            "okx",
            VenueErrorKind::OrderRejected("bad qty".to_string())
        )
        .is_retryable());
    }
}
