//! 저장 계층 추상화.

use async_trait::async_trait;

use pulse_core::{AlertRecord, Credential, OrderResult, Ticker};

use crate::error::StoreError;

/// 단일 저장 계층.
///
/// Postgres, 파일, 메모리 계층이 모두 이 트레이트를 구현하며
/// [`crate::cascade::PersistenceCascade`]가 순서대로 시도합니다.
#[async_trait]
pub trait StorageTier: Send + Sync {
    /// 계층 이름 (로그용).
    fn name(&self) -> &str;

    /// 주문 결과 저장.
    async fn insert_order(&self, user_id: &str, order: &OrderResult) -> Result<(), StoreError>;

    /// 알림 레코드 저장.
    async fn insert_alert(&self, alert: &AlertRecord) -> Result<(), StoreError>;

    /// 티커 스냅샷 일괄 저장.
    async fn insert_tickers(&self, tickers: &[Ticker]) -> Result<(), StoreError>;

    /// 사용자의 최근 주문 조회 (최신순).
    async fn recent_orders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<OrderResult>, StoreError>;

    /// 사용자/거래소의 활성 자격증명 조회.
    async fn fetch_credential(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<Credential>, StoreError>;

    /// 자격증명 저장 또는 교체.
    async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError>;
}
