//! 주문 게이트웨이.
//!
//! 실 잔고 기반 사전 검증, 거래소 제출, 베스트에포트 영속화와
//! 실시간 체결 통지를 담당합니다.

pub mod error;
pub mod gateway;

pub use error::GatewayError;
pub use gateway::{required_quote, OrderGateway};
