//! 도메인 모델.
//!
//! 시스템 전반에서 공유되는 도메인 레코드를 정의합니다.

pub mod alert;
pub mod balance;
pub mod credential;
pub mod market;
pub mod order;

pub use alert::{AlertKind, AlertRecord};
pub use balance::Balance;
pub use credential::Credential;
pub use market::{OrderBook, OrderBookLevel, Ticker, TradeTick};
pub use order::{OrderRequest, OrderResult, OrderStatusType, OrderType, Side};
