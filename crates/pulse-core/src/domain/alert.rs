//! 알림 레코드.
//!
//! 주문 실행/실패에서 파생되는 사람이 읽을 수 있는 알림입니다.
//! 감사 및 히스토리 용도로 저장됩니다.

use crate::domain::order::{OrderResult, Side};
use crate::types::{Quantity, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 알림 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// 주문이 거래소에서 수락/체결됨
    OrderExecuted,
    /// 주문이 실패함
    OrderFailed,
}

/// 저장되는 알림 레코드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// 레코드 ID
    pub id: Uuid,
    /// 대상 사용자 ID
    pub user_id: String,
    /// 관련 거래소
    pub venue: String,
    /// 알림 종류
    pub kind: AlertKind,
    /// 사람이 읽을 수 있는 메시지
    pub message: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    /// 실행된 주문에 대한 알림을 생성합니다.
    pub fn order_executed(user_id: impl Into<String>, result: &OrderResult) -> Self {
        let action = match result.side {
            Side::Buy => "매수",
            Side::Sell => "매도",
        };
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            venue: result.venue.clone(),
            kind: AlertKind::OrderExecuted,
            message: format!(
                "{} {} {} 주문 체결 (주문 ID: {})",
                result.symbol, result.quantity, action, result.venue_order_id
            ),
            created_at: Utc::now(),
        }
    }

    /// 실패한 주문에 대한 알림을 생성합니다.
    pub fn order_failed(
        user_id: impl Into<String>,
        venue: impl Into<String>,
        symbol: &Symbol,
        quantity: Quantity,
        reason: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            venue: venue.into(),
            kind: AlertKind::OrderFailed,
            message: format!("{} {} 주문 실패: {}", symbol, quantity, reason),
            created_at: Utc::now(),
        }
    }
}
