//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Ticker` - 실시간 시세 데이터 (출처 거래소 포함)
//! - `OrderBook` - 호가창 데이터
//! - `TradeTick` - 체결 틱 데이터

use crate::domain::order::Side;
use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 실시간 시세 데이터.
///
/// 어그리게이터 사이클마다 새로 생성되며, 생성 후 변경되지 않습니다.
/// `venue`는 이 시세를 제공한 거래소 이름입니다. 한 사이클의 티커 집합은
/// 전부 동일한 거래소에서 나옵니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 출처 거래소
    pub venue: String,
    /// 현재가
    pub last: Price,
    /// 최우선 매수 호가
    pub bid: Price,
    /// 최우선 매도 호가
    pub ask: Price,
    /// 24시간 변화율 (%)
    pub change_24h_percent: Decimal,
    /// 24시간 거래량
    pub volume_24h: Quantity,
    /// 24시간 최고가
    pub high_24h: Price,
    /// 24시간 최저가
    pub low_24h: Price,
    /// 생성 시각
    pub timestamp: DateTime<Utc>,
}

/// 호가창의 단일 레벨.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// 가격
    pub price: Price,
    /// 수량
    pub quantity: Quantity,
}

/// 호가창 데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 출처 거래소
    pub venue: String,
    /// 매수 호가 (가격 내림차순)
    pub bids: Vec<OrderBookLevel>,
    /// 매도 호가 (가격 오름차순)
    pub asks: Vec<OrderBookLevel>,
    /// 생성 시각
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// 최우선 매수 호가를 반환합니다.
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    /// 최우선 매도 호가를 반환합니다.
    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }
}

/// 체결 틱 데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTick {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 출처 거래소
    pub venue: String,
    /// 거래소 체결 ID
    pub id: String,
    /// 체결 가격
    pub price: Price,
    /// 체결 수량
    pub quantity: Quantity,
    /// 테이커 방향
    pub side: Side,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}
