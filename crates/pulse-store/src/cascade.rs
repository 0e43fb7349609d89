//! 계층형 저장 캐스케이드.
//!
//! 모든 호출(읽기/쓰기)은 고정된 순서로 계층을 시도합니다. 1차 계층이
//! 복구되면 다음 호출부터 자동으로 1차가 다시 쓰입니다. 하위 계층에
//! 기록된 레코드를 1차로 되올리는 재동기화는 하지 않으며, 강등 사실을
//! 로그로 남기는 것으로 대신합니다.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use pulse_core::{AlertRecord, Credential, OrderResult, Ticker};

use crate::error::StoreError;
use crate::tier::StorageTier;

type OpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// 순서대로 시도하는 저장 계층 묶음.
pub struct PersistenceCascade {
    tiers: Vec<Arc<dyn StorageTier>>,
}

impl PersistenceCascade {
    /// 계층 순서 그대로 캐스케이드 생성. 앞이 1차입니다.
    pub fn new(tiers: Vec<Arc<dyn StorageTier>>) -> Self {
        Self { tiers }
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// 계층을 순서대로 시도합니다. 1차가 아닌 계층이 처리하면 강등
    /// 경고를 남깁니다.
    async fn attempt<'s, T>(
        &'s self,
        operation: &'static str,
        op: impl Fn(&'s dyn StorageTier) -> OpFuture<'s, T>,
    ) -> Result<T, StoreError> {
        let mut last_error: Option<StoreError> = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            match op(tier.as_ref()).await {
                Ok(value) => {
                    if index > 0 {
                        warn!(
                            "Persistence degraded: {} served by tier '{}' (level {})",
                            operation,
                            tier.name(),
                            index
                        );
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Tier '{}' failed for {}: {}", tier.name(), operation, e);
                    last_error = Some(e);
                }
            }
        }

        Err(StoreError::AllTiersFailed {
            operation: operation.to_string(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no tiers configured".to_string()),
        })
    }

    pub async fn insert_order(
        &self,
        user_id: &str,
        order: &OrderResult,
    ) -> Result<(), StoreError> {
        self.attempt("insert_order", |tier| {
            Box::pin(tier.insert_order(user_id, order))
        })
        .await
    }

    pub async fn insert_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        self.attempt("insert_alert", |tier| Box::pin(tier.insert_alert(alert)))
            .await
    }

    pub async fn insert_tickers(&self, tickers: &[Ticker]) -> Result<(), StoreError> {
        self.attempt("insert_tickers", |tier| {
            Box::pin(tier.insert_tickers(tickers))
        })
        .await
    }

    pub async fn recent_orders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<OrderResult>, StoreError> {
        self.attempt("recent_orders", |tier| {
            Box::pin(tier.recent_orders(user_id, limit))
        })
        .await
    }

    pub async fn fetch_credential(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<Credential>, StoreError> {
        self.attempt("fetch_credential", |tier| {
            Box::pin(tier.fetch_credential(user_id, venue))
        })
        .await
    }

    pub async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.attempt("upsert_credential", |tier| {
            Box::pin(tier.upsert_credential(credential))
        })
        .await
    }
}
