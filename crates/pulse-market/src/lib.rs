//! 시장 데이터 집계와 실시간 팬아웃.
//!
//! - [`MarketAggregator`]: 거래소 우선순위 페일오버 스윕으로 사이클당
//!   정본 티커 집합을 만드는 주기 태스크
//! - [`BroadcastHub`]: 구독자별 단일 핸들 팬아웃
//! - 메시지 타입: 실시간 채널의 JSON 프레임

pub mod aggregator;
pub mod hub;
pub mod messages;

pub use aggregator::{CycleOutcome, MarketAggregator};
pub use hub::{BroadcastHub, SubscriptionId};
pub use messages::{ClientMessage, PriceDelta, ServerMessage};
