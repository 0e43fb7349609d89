//! 저장 계층 에러 타입.

use thiserror::Error;

/// 저장 계층 에러.
#[derive(Error, Debug)]
pub enum StoreError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파일 I/O 에러
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화/역직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 유니크 제약 위반
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// 잘못된 저장 데이터 (파싱 불가 등)
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// 모든 계층 실패
    #[error("All storage tiers failed for {operation}: {last_error}")]
    AllTiersFailed {
        operation: String,
        last_error: String,
    },
}

impl StoreError {
    /// sqlx 에러를 매핑합니다. 유니크 위반(23505)은 Duplicate로 구분합니다.
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(e)
    }
}
