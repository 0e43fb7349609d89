//! 거래소 자격증명 레코드.
//!
//! 자격증명은 항상 암호화된 봉투 형태로 저장/전달됩니다.
//! 평문 키는 VenueRegistry 내부에서만 일시적으로 존재합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 저장된 거래소 자격증명.
///
/// `envelope`는 [`crate::crypto::CredentialEnvelope`]를 직렬화한 JSON입니다.
/// 평문 API 키/시크릿은 이 레코드에 절대 저장되지 않으며 로그에도 남기지
/// 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// 레코드 ID
    pub id: Uuid,
    /// 소유자 사용자 ID
    pub user_id: String,
    /// 거래소 이름 (예: "binance")
    pub venue: String,
    /// 암호화 봉투 (버전 태그 + nonce + 암호문)
    pub envelope: String,
    /// 활성 여부
    pub active: bool,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// 새 자격증명 레코드를 생성합니다.
    pub fn new(user_id: impl Into<String>, venue: impl Into<String>, envelope: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            venue: venue.into(),
            envelope,
            active: true,
            created_at: Utc::now(),
        }
    }
}
