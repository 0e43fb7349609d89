//! 공통 기본 타입.

mod symbol;

pub use symbol::Symbol;

/// 가격 타입 (Decimal).
pub type Price = rust_decimal::Decimal;

/// 수량 타입 (Decimal).
pub type Quantity = rust_decimal::Decimal;
