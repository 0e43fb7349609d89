//! 실시간 채널 메시지 타입.
//!
//! 웹소켓으로 오가는 JSON 프레임입니다. `type` 필드로 구분합니다.

use chrono::{DateTime, Utc};
use pulse_core::{OrderResult, Price, Symbol, Ticker};
use serde::{Deserialize, Serialize};

/// 클라이언트 → 서버 메시지.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 연결 직후 보내야 하는 인증 요청
    Auth { token: String },
}

/// 주요 페어 가격 요약 항목.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDelta {
    pub symbol: Symbol,
    pub last: Price,
    pub change_24h_percent: Price,
}

impl From<&Ticker> for PriceDelta {
    fn from(ticker: &Ticker) -> Self {
        Self {
            symbol: ticker.symbol.clone(),
            last: ticker.last,
            change_24h_percent: ticker.change_24h_percent,
        }
    }
}

/// 서버 → 클라이언트 메시지.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 인증 성공
    AuthSuccess { user_id: String },
    /// 인증 실패 (연결이 곧 닫힘)
    AuthError { message: String },
    /// 사이클 전체 티커 스냅샷
    MarketUpdate {
        venue: String,
        tickers: Vec<Ticker>,
        timestamp: DateTime<Utc>,
    },
    /// 주요 페어 가격 요약
    PriceUpdate {
        venue: String,
        majors: Vec<PriceDelta>,
        timestamp: DateTime<Utc>,
    },
    /// 이번 사이클에 실시간 데이터 없음
    MarketError { message: String },
    /// 주문 체결 알림 (해당 사용자에게만)
    OrderExecuted { order: OrderResult },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_auth_frame() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"auth","token":"abc"}"#).unwrap();
        let ClientMessage::Auth { token } = msg;
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_server_message_tags() {
        let json = serde_json::to_string(&ServerMessage::AuthSuccess {
            user_id: "u1".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"auth_success""#));

        let json = serde_json::to_string(&ServerMessage::MarketError {
            message: "LIVE_DATA_REQUIRED".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"market_error""#));
    }
}
