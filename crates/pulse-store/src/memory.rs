//! 인메모리 저장 계층 (최종 계층).
//!
//! 프로세스 수명에 묶인 최후의 보루입니다. 무한히 자라지 않도록
//! 레코드 수를 제한합니다.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pulse_core::{AlertRecord, Credential, OrderResult, Ticker};

use crate::error::StoreError;
use crate::tier::StorageTier;

const MAX_ORDERS_PER_USER: usize = 500;
const MAX_ALERTS: usize = 1_000;

#[derive(Default)]
struct MemoryState {
    // user_id -> 최신이 뒤에 오는 주문 목록
    orders: HashMap<String, VecDeque<OrderResult>>,
    alerts: VecDeque<AlertRecord>,
    // (venue, symbol 표기) -> 마지막 스냅샷
    tickers: HashMap<(String, String), Ticker>,
    // (user_id, venue) -> 자격증명
    credentials: HashMap<(String, String), Credential>,
}

/// 인메모리 저장 계층.
#[derive(Default)]
pub struct MemoryTier {
    state: RwLock<MemoryState>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageTier for MemoryTier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_order(&self, user_id: &str, order: &OrderResult) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let orders = state.orders.entry(user_id.to_string()).or_default();
        orders.push_back(order.clone());
        while orders.len() > MAX_ORDERS_PER_USER {
            orders.pop_front();
        }
        Ok(())
    }

    async fn insert_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.alerts.push_back(alert.clone());
        while state.alerts.len() > MAX_ALERTS {
            state.alerts.pop_front();
        }
        Ok(())
    }

    async fn insert_tickers(&self, tickers: &[Ticker]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for ticker in tickers {
            let key = (ticker.venue.clone(), ticker.symbol.to_string());
            state.tickers.insert(key, ticker.clone());
        }
        Ok(())
    }

    async fn recent_orders(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<OrderResult>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(user_id)
            .map(|orders| {
                orders
                    .iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_credential(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .credentials
            .get(&(user_id.to_string(), venue.to_string()))
            .filter(|c| c.active)
            .cloned())
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.credentials.insert(
            (credential.user_id.clone(), credential.venue.clone()),
            credential.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::{OrderStatusType, OrderType, Side, Symbol};
    use rust_decimal_macros::dec;

    fn sample_order(id: &str) -> OrderResult {
        OrderResult {
            venue: "okx".to_string(),
            venue_order_id: id.to_string(),
            symbol: Symbol::new("ETH", "USDT"),
            side: Side::Sell,
            order_type: OrderType::Market,
            quantity: dec!(1),
            price: None,
            filled_quantity: dec!(1),
            status: OrderStatusType::Filled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_order_bound_evicts_oldest() {
        let tier = MemoryTier::new();
        for i in 0..(MAX_ORDERS_PER_USER + 10) {
            tier.insert_order("u1", &sample_order(&i.to_string()))
                .await
                .unwrap();
        }

        let orders = tier.recent_orders("u1", u32::MAX).await.unwrap();
        assert_eq!(orders.len(), MAX_ORDERS_PER_USER);
        // 최신이 먼저
        assert_eq!(
            orders[0].venue_order_id,
            (MAX_ORDERS_PER_USER + 9).to_string()
        );
    }

    #[tokio::test]
    async fn test_inactive_credential_hidden() {
        let tier = MemoryTier::new();
        let mut cred = Credential::new("u1", "okx", "env".to_string());
        tier.upsert_credential(&cred).await.unwrap();
        assert!(tier.fetch_credential("u1", "okx").await.unwrap().is_some());

        cred.active = false;
        tier.upsert_credential(&cred).await.unwrap();
        assert!(tier.fetch_credential("u1", "okx").await.unwrap().is_none());
    }
}
