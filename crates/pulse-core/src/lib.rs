//! # Pulse Core
//!
//! 시장 데이터 코어의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시세/호가/체결 시장 데이터 구조체
//! - 주문 요청 및 주문 결과 타입
//! - 잔고 및 알림 레코드
//! - 심볼 정의
//! - 설정 관리
//! - 로깅 인프라
//! - 자격증명 암호화 (버전 봉투)

pub mod config;
pub mod crypto;
pub mod domain;
pub mod logging;
pub mod types;

pub use config::*;
pub use crypto::{CredentialEncryptor, CredentialEnvelope, CryptoError, VenueKeys};
pub use domain::*;
pub use logging::*;
pub use types::*;
