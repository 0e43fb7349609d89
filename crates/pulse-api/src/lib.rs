//! HTTP/웹소켓 표면.
//!
//! 공개 시장 조회, 인증 주문 라우트, 실시간 채널을 axum 라우터 하나로
//! 묶습니다.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use auth::{AuthUser, IdentityVerifier, JwtVerifier};
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, CascadeCredentialSource};
