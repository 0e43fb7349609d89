//! 구독자 팬아웃 허브.
//!
//! 사용자당 하나의 전송 핸들만 유지합니다. 전송은 발사 후 망각이며,
//! 실패한 구독자는 즉시 제거됩니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info};

use crate::messages::ServerMessage;

/// 구독 등록마다 발급되는 토큰. 해제 시 본인의 등록만 지울 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

/// 구독자 팬아웃 허브.
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    next_id: AtomicU64,
    count_tx: watch::Sender<usize>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            count_tx,
        }
    }

    /// 구독 등록. 같은 사용자가 이미 있으면 기존 핸들을 교체하며,
    /// 교체된 쪽의 수신 스트림은 그대로 끊어집니다.
    pub async fn register(
        &self,
        user_id: &str,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subscribers = self.subscribers.write().await;
        if subscribers
            .insert(user_id.to_string(), Subscriber { id, tx })
            .is_some()
        {
            info!("Replaced existing subscription for user {}", user_id);
        } else {
            info!("User {} subscribed", user_id);
        }
        let _ = self.count_tx.send(subscribers.len());
        (id, rx)
    }

    /// 구독 해제. 재접속으로 이미 교체된 등록이면 아무것도 하지 않아
    /// 새 구독이 유지됩니다.
    pub async fn unregister(&self, user_id: &str, id: SubscriptionId) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.get(user_id).is_some_and(|s| s.id == id) {
            subscribers.remove(user_id);
            info!("User {} unsubscribed", user_id);
            let _ = self.count_tx.send(subscribers.len());
        }
    }

    /// 현재 구독자 수.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// 구독자 수 변경을 구독하는 watch 채널.
    pub fn subscriber_watch(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    /// 모든 구독자에게 전송. 전송에 실패한 구독자는 제거합니다.
    pub async fn broadcast(&self, message: ServerMessage) {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();

        subscribers.retain(|user_id, subscriber| {
            if subscriber.tx.send(message.clone()).is_ok() {
                true
            } else {
                debug!("Dropping dead subscriber {}", user_id);
                false
            }
        });

        if subscribers.len() != before {
            let _ = self.count_tx.send(subscribers.len());
        }
    }

    /// 특정 사용자에게만 전송. 구독 중이 아니면 false.
    pub async fn notify_user(&self, user_id: &str, message: ServerMessage) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get(user_id) {
            Some(subscriber) => {
                if subscriber.tx.send(message).is_ok() {
                    true
                } else {
                    subscribers.remove(user_id);
                    let _ = self.count_tx.send(subscribers.len());
                    false
                }
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market_error() -> ServerMessage {
        ServerMessage::MarketError {
            message: "LIVE_DATA_REQUIRED".to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let hub = BroadcastHub::new();
        let (_, mut rx1) = hub.register("u1").await;
        let (_, mut rx2) = hub.register("u2").await;

        hub.broadcast(market_error()).await;

        assert!(matches!(rx1.recv().await, Some(ServerMessage::MarketError { .. })));
        assert!(matches!(rx2.recv().await, Some(ServerMessage::MarketError { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces_handle() {
        let hub = BroadcastHub::new();
        let (_, mut old_rx) = hub.register("u1").await;
        let (_, mut new_rx) = hub.register("u1").await;

        assert_eq!(hub.subscriber_count().await, 1);

        hub.broadcast(market_error()).await;

        // 교체된 옛 핸들의 스트림은 끊어짐
        assert!(old_rx.recv().await.is_none());
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_replacement() {
        let hub = BroadcastHub::new();
        let (old_id, _old_rx) = hub.register("u1").await;
        let (_, mut new_rx) = hub.register("u1").await;

        // 끊어진 옛 세션의 해제가 재접속한 새 구독을 지우면 안 됨
        hub.unregister("u1", old_id).await;
        assert_eq!(hub.subscriber_count().await, 1);

        hub.broadcast(market_error()).await;
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_failed_send_removes_subscriber() {
        let hub = BroadcastHub::new();
        let (_, rx) = hub.register("u1").await;
        drop(rx);

        hub.broadcast(market_error()).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_watch_tracks_count() {
        let hub = BroadcastHub::new();
        let watch = hub.subscriber_watch();
        assert_eq!(*watch.borrow(), 0);

        let (id, _rx) = hub.register("u1").await;
        assert_eq!(*watch.borrow(), 1);

        hub.unregister("u1", id).await;
        assert_eq!(*watch.borrow(), 0);
    }

    #[tokio::test]
    async fn test_notify_user_targets_one_subscriber() {
        let hub = BroadcastHub::new();
        let (_, mut rx1) = hub.register("u1").await;
        let (_, mut rx2) = hub.register("u2").await;

        assert!(hub.notify_user("u1", market_error()).await);
        assert!(!hub.notify_user("unknown", market_error()).await);

        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }
}
