//! 계층형 영속성.
//!
//! 레코드 단위 연산을 정의하는 [`StorageTier`] 트레이트와
//! Postgres / 파일 / 메모리 세 계층, 그리고 이들을 순서대로 시도하는
//! [`PersistenceCascade`]를 제공합니다.

pub mod cascade;
pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;
pub mod tier;

pub use cascade::PersistenceCascade;
pub use error::StoreError;
pub use file::FileTier;
pub use memory::MemoryTier;
pub use postgres::PostgresTier;
pub use tier::StorageTier;
