//! 주문 타입.
//!
//! 이 모듈은 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가/지정가)
//! - `OrderStatusType` - 주문 상태
//! - `OrderRequest` - 주문 요청
//! - `OrderResult` - 거래소가 수락한 주문의 결과

use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문 - 현재 시장 가격으로 즉시 체결
    Market,
    /// 지정가 주문 - 지정 가격 이상/이하에서 체결
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 거래소에 제출됨 (대기 중)
    Open,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
    /// 거래소에서 거부됨
    Rejected,
    /// 유효 기간 만료
    Expired,
}

impl OrderStatusType {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Filled
                | OrderStatusType::Cancelled
                | OrderStatusType::Rejected
                | OrderStatusType::Expired
        )
    }
}

/// 주문 요청.
///
/// 지정가 주문은 `price`가 필수이며, 시장가 주문은 무시됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (기준 자산 단위)
    pub quantity: Quantity,
    /// 지정가 (지정가 주문에만 해당)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl OrderRequest {
    /// 시장가 주문 요청을 생성합니다.
    pub fn market(symbol: Symbol, side: Side, quantity: Quantity) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }

    /// 지정가 주문 요청을 생성합니다.
    pub fn limit(symbol: Symbol, side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }
}

/// 거래소가 수락한 주문의 결과.
///
/// 거래소가 주문 수락을 확인한 이후에만 생성됩니다.
/// 제출 전에 미리 저장되는 일은 없습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// 주문을 수락한 거래소
    pub venue: String,
    /// 거래소 주문 ID
    pub venue_order_id: String,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량
    pub quantity: Quantity,
    /// 주문 가격 (지정가)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 체결된 수량
    pub filled_quantity: Quantity,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_order_request_constructors() {
        let symbol = Symbol::new("BTC", "USDT");

        let market = OrderRequest::market(symbol.clone(), Side::Buy, dec!(0.01));
        assert_eq!(market.order_type, OrderType::Market);
        assert!(market.price.is_none());

        let limit = OrderRequest::limit(symbol, Side::Sell, dec!(0.01), dec!(50000));
        assert_eq!(limit.order_type, OrderType::Limit);
        assert_eq!(limit.price, Some(dec!(50000)));
    }

    #[test]
    fn test_status_finality() {
        assert!(OrderStatusType::Filled.is_final());
        assert!(OrderStatusType::Rejected.is_final());
        assert!(!OrderStatusType::Open.is_final());
        assert!(!OrderStatusType::PartiallyFilled.is_final());
    }
}
