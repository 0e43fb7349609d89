//! 거래소 연결 및 시장 데이터 정규화.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - VenueAdapter trait: 통합 거래소 인터페이스
//! - Binance 커넥터 (Spot REST)
//! - OKX 커넥터 (v5 REST)
//! - VenueRegistry: 사용자별 인증 어댑터 및 공용 익명 어댑터 관리
//! - 거래소 응답의 엄격한 정규화 (원시 응답 형식은 이 크레이트 밖으로
//!   나가지 않음)

pub mod adapter;
pub mod connector;
pub mod error;
pub mod registry;

pub use adapter::{VenueAdapter, VenueResult};
pub use connector::{build_adapter, BinanceAdapter, BinanceConfig, OkxAdapter, OkxConfig};
pub use error::{VenueError, VenueErrorKind};
pub use registry::{AdapterFactory, CredentialSource, SourceError, VenueRegistry};
