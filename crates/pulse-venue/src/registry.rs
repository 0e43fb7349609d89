//! 사용자별 거래소 어댑터 레지스트리.
//!
//! 인증 어댑터는 (user_id, venue) 키로, 익명 어댑터는 venue 키로 캐시합니다.
//! 인증 어댑터는 최초 요청 시 자격증명을 복호화하고 활성화 프로브를
//! 통과해야 캐시에 올라갑니다.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use pulse_core::config::VenueConfig;
use pulse_core::crypto::CredentialEncryptor;

use crate::adapter::VenueAdapter;
use crate::connector::build_adapter;
use crate::error::{VenueError, VenueErrorKind};

/// 자격증명 소스 에러 (저장 계층 에러를 그대로 운반).
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// 암호화된 자격증명 봉투를 조회하는 소스.
///
/// 저장 계층이 구현합니다. 봉투는 암호문 그대로 반환하며
/// 복호화는 레지스트리가 수행합니다.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// 사용자/거래소 조합의 활성 자격증명 봉투 조회.
    async fn fetch_envelope(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Option<String>, SourceError>;
}

/// 어댑터 생성 훅. 기본값은 [`build_adapter`].
pub type AdapterFactory = Arc<
    dyn Fn(&str, Option<pulse_core::VenueKeys>, u64) -> Result<Arc<dyn VenueAdapter>, VenueError>
        + Send
        + Sync,
>;

/// 거래소 어댑터 레지스트리.
pub struct VenueRegistry {
    source: Arc<dyn CredentialSource>,
    encryptor: CredentialEncryptor,
    venues: HashMap<String, VenueConfig>,
    factory: AdapterFactory,
    authenticated: RwLock<HashMap<(String, String), Arc<dyn VenueAdapter>>>,
    anonymous: RwLock<HashMap<String, Arc<dyn VenueAdapter>>>,
}

impl VenueRegistry {
    /// 새 레지스트리 생성.
    pub fn new(
        source: Arc<dyn CredentialSource>,
        encryptor: CredentialEncryptor,
        venues: HashMap<String, VenueConfig>,
    ) -> Self {
        Self::with_factory(
            source,
            encryptor,
            venues,
            Arc::new(|venue, keys, timeout| build_adapter(venue, keys, timeout)),
        )
    }

    /// 어댑터 생성 훅을 주입하는 생성자 (테스트용).
    pub fn with_factory(
        source: Arc<dyn CredentialSource>,
        encryptor: CredentialEncryptor,
        venues: HashMap<String, VenueConfig>,
        factory: AdapterFactory,
    ) -> Self {
        Self {
            source,
            encryptor,
            venues,
            factory,
            authenticated: RwLock::new(HashMap::new()),
            anonymous: RwLock::new(HashMap::new()),
        }
    }

    /// 거래소별 요청 타임아웃(초). 비활성 거래소는 거부합니다.
    ///
    /// 설정에 없는 거래소는 기본값으로 취급합니다. 알려지지 않은 이름
    /// 자체는 어댑터 팩토리가 거릅니다.
    fn venue_timeout(&self, venue: &str) -> Result<u64, VenueError> {
        match self.venues.get(venue) {
            Some(config) if !config.enabled => Err(VenueError::new(
                venue,
                VenueErrorKind::NotConnected("venue disabled".to_string()),
            )),
            Some(config) => Ok(config.timeout_secs),
            None => Ok(VenueConfig::default().timeout_secs),
        }
    }

    /// 익명(공개 데이터 전용) 어댑터 반환. 최초 요청 시 생성 후 캐시.
    pub async fn anonymous(&self, venue: &str) -> Result<Arc<dyn VenueAdapter>, VenueError> {
        let timeout_secs = self.venue_timeout(venue)?;

        if let Some(adapter) = self.anonymous.read().await.get(venue) {
            return Ok(adapter.clone());
        }

        let mut cache = self.anonymous.write().await;
        // 쓰기 락 대기 중 다른 태스크가 생성했을 수 있음
        if let Some(adapter) = cache.get(venue) {
            return Ok(adapter.clone());
        }

        let adapter = (self.factory)(venue, None, timeout_secs)?;
        cache.insert(venue.to_string(), adapter.clone());
        Ok(adapter)
    }

    /// 사용자의 인증 어댑터 반환. 캐시에 없으면 활성화를 시도합니다.
    pub async fn for_user(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Arc<dyn VenueAdapter>, VenueError> {
        let key = (user_id.to_string(), venue.to_string());

        if let Some(adapter) = self.authenticated.read().await.get(&key) {
            return Ok(adapter.clone());
        }

        self.activate(user_id, venue).await
    }

    /// 자격증명 복호화 + 프로브를 거쳐 인증 어댑터 활성화.
    ///
    /// 어댑터 생성과 프로브는 쓰기 락 안에서 수행해 동일 사용자의
    /// 동시 활성화가 중복 프로브를 만들지 않게 합니다.
    async fn activate(
        &self,
        user_id: &str,
        venue: &str,
    ) -> Result<Arc<dyn VenueAdapter>, VenueError> {
        let timeout_secs = self.venue_timeout(venue)?;
        let key = (user_id.to_string(), venue.to_string());
        let mut cache = self.authenticated.write().await;

        if let Some(adapter) = cache.get(&key) {
            return Ok(adapter.clone());
        }

        let envelope = self
            .source
            .fetch_envelope(user_id, venue)
            .await
            .map_err(|e| {
                warn!("Credential lookup failed for {}/{}: {}", user_id, venue, e);
                VenueError::new(
                    venue,
                    VenueErrorKind::NotConnected("credential lookup failed".to_string()),
                )
            })?
            .ok_or_else(|| {
                VenueError::new(
                    venue,
                    VenueErrorKind::NotConnected("no credential registered".to_string()),
                )
            })?;

        let keys = self.encryptor.open_keys(&envelope).map_err(|e| {
            warn!("Credential decryption failed for {}/{}: {}", user_id, venue, e);
            VenueError::new(
                venue,
                VenueErrorKind::Unauthorized("credential decryption failed".to_string()),
            )
        })?;

        let adapter = (self.factory)(venue, Some(keys), timeout_secs)?;

        // 활성화 프로브: 공개 + 서명 호출이 모두 성공해야 등록
        adapter.load_markets().await?;
        adapter.fetch_balance().await?;

        info!("Activated {} adapter for user {}", venue, user_id);
        cache.insert(key, adapter.clone());
        Ok(adapter)
    }

    /// 사용자의 어댑터 제거 (자격증명 변경/삭제 시 호출).
    pub async fn deactivate(&self, user_id: &str, venue: &str) {
        let key = (user_id.to_string(), venue.to_string());
        if self.authenticated.write().await.remove(&key).is_some() {
            info!("Deactivated {} adapter for user {}", venue, user_id);
        }
    }

    /// 사용자가 현재 연결된 거래소 목록.
    pub async fn connected_venues(&self, user_id: &str) -> Vec<String> {
        self.authenticated
            .read()
            .await
            .keys()
            .filter(|(uid, _)| uid == user_id)
            .map(|(_, venue)| venue.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pulse_core::crypto::generate_master_key;
    use pulse_core::{
        Balance, OrderBook, OrderRequest, OrderResult, Symbol, Ticker, TradeTick, VenueKeys,
    };

    use crate::adapter::VenueResult;

    struct StaticSource {
        envelope: Option<String>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl CredentialSource for StaticSource {
        async fn fetch_envelope(
            &self,
            _user_id: &str,
            _venue: &str,
        ) -> Result<Option<String>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.envelope.clone())
        }
    }

    struct StubAdapter {
        fail_probe: bool,
    }

    #[async_trait]
    impl VenueAdapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        async fn load_markets(&self) -> VenueResult<Vec<Symbol>> {
            if self.fail_probe {
                return Err(VenueError::new(
                    "stub",
                    VenueErrorKind::Unauthorized("bad keys".to_string()),
                ));
            }
            Ok(vec![Symbol::new("BTC", "USDT")])
        }

        async fn fetch_ticker(&self, _symbol: &Symbol) -> VenueResult<Ticker> {
            unimplemented!()
        }

        async fn fetch_tickers(&self) -> VenueResult<Vec<Ticker>> {
            Ok(Vec::new())
        }

        async fn fetch_order_book(&self, _symbol: &Symbol, _depth: u32) -> VenueResult<OrderBook> {
            unimplemented!()
        }

        async fn fetch_trades(&self, _symbol: &Symbol, _limit: u32) -> VenueResult<Vec<TradeTick>> {
            unimplemented!()
        }

        async fn fetch_balance(&self) -> VenueResult<Vec<Balance>> {
            Ok(Vec::new())
        }

        async fn place_order(&self, _request: &OrderRequest) -> VenueResult<OrderResult> {
            unimplemented!()
        }

        async fn cancel_order(&self, _order_id: &str, _symbol: &Symbol) -> VenueResult<()> {
            Ok(())
        }
    }

    fn registry_with(
        envelope: Option<String>,
        encryptor: CredentialEncryptor,
        fail_probe: bool,
    ) -> (VenueRegistry, Arc<StaticSource>) {
        let source = Arc::new(StaticSource {
            envelope,
            fetches: AtomicUsize::new(0),
        });
        let registry = VenueRegistry::with_factory(
            source.clone(),
            encryptor,
            HashMap::new(),
            Arc::new(move |_venue, _keys, _timeout| {
                Ok(Arc::new(StubAdapter { fail_probe }) as Arc<dyn VenueAdapter>)
            }),
        );
        (registry, source)
    }

    fn encryptor() -> CredentialEncryptor {
        CredentialEncryptor::new(&generate_master_key()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_is_not_connected() {
        let (registry, _) = registry_with(None, encryptor(), false);
        let err = registry.for_user("u1", "binance").await.err().unwrap();
        assert!(matches!(err.kind, VenueErrorKind::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_undecryptable_envelope_is_unauthorized() {
        // 다른 마스터 키로 봉인된 봉투
        let other = encryptor();
        let envelope = other
            .seal_keys(&VenueKeys::new("key".to_string(), "secret".to_string()))
            .unwrap();

        let (registry, _) = registry_with(Some(envelope), encryptor(), false);
        let err = registry.for_user("u1", "binance").await.err().unwrap();
        assert!(matches!(err.kind, VenueErrorKind::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_activation_caches_adapter() {
        let enc = encryptor();
        let envelope = enc
            .seal_keys(&VenueKeys::new("key".to_string(), "secret".to_string()))
            .unwrap();

        let (registry, source) = registry_with(Some(envelope), enc, false);

        registry.for_user("u1", "binance").await.unwrap();
        registry.for_user("u1", "binance").await.unwrap();

        // 두 번째 호출은 캐시를 타므로 소스 조회는 한 번뿐
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(registry.connected_venues("u1").await, vec!["binance"]);
    }

    #[tokio::test]
    async fn test_failed_probe_is_not_cached() {
        let enc = encryptor();
        let envelope = enc
            .seal_keys(&VenueKeys::new("key".to_string(), "secret".to_string()))
            .unwrap();

        let (registry, source) = registry_with(Some(envelope), enc, true);

        assert!(registry.for_user("u1", "binance").await.is_err());
        assert!(registry.for_user("u1", "binance").await.is_err());

        // 실패한 활성화는 캐시되지 않아 매번 다시 시도
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(registry.connected_venues("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_removes_adapter() {
        let enc = encryptor();
        let envelope = enc
            .seal_keys(&VenueKeys::new("key".to_string(), "secret".to_string()))
            .unwrap();

        let (registry, _) = registry_with(Some(envelope), enc, false);
        registry.for_user("u1", "binance").await.unwrap();
        registry.deactivate("u1", "binance").await;
        assert!(registry.connected_venues("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_adapter_cached_per_venue() {
        let (registry, _) = registry_with(None, encryptor(), false);
        let a = registry.anonymous("binance").await.unwrap();
        let b = registry.anonymous("binance").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_disabled_venue_is_rejected() {
        let venues = HashMap::from([(
            "binance".to_string(),
            VenueConfig {
                enabled: false,
                timeout_secs: 10,
            },
        )]);
        let registry = VenueRegistry::with_factory(
            Arc::new(StaticSource {
                envelope: None,
                fetches: AtomicUsize::new(0),
            }),
            encryptor(),
            venues,
            Arc::new(|_venue, _keys, _timeout| {
                Ok(Arc::new(StubAdapter { fail_probe: false }) as Arc<dyn VenueAdapter>)
            }),
        );

        let err = registry.anonymous("binance").await.err().unwrap();
        assert!(matches!(err.kind, VenueErrorKind::NotConnected(_)));
        let err = registry.for_user("u1", "binance").await.err().unwrap();
        assert!(matches!(err.kind, VenueErrorKind::NotConnected(_)));
        // 설정에 없는 거래소는 기본값(활성)으로 동작
        assert!(registry.anonymous("okx").await.is_ok());
    }

    #[tokio::test]
    async fn test_per_venue_timeout_reaches_factory() {
        let venues = HashMap::from([
            (
                "binance".to_string(),
                VenueConfig {
                    enabled: true,
                    timeout_secs: 7,
                },
            ),
            (
                "okx".to_string(),
                VenueConfig {
                    enabled: true,
                    timeout_secs: 12,
                },
            ),
        ]);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in_factory = seen.clone();
        let registry = VenueRegistry::with_factory(
            Arc::new(StaticSource {
                envelope: None,
                fetches: AtomicUsize::new(0),
            }),
            encryptor(),
            venues,
            Arc::new(move |venue, _keys, timeout| {
                seen_in_factory
                    .lock()
                    .unwrap()
                    .push((venue.to_string(), timeout));
                Ok(Arc::new(StubAdapter { fail_probe: false }) as Arc<dyn VenueAdapter>)
            }),
        );

        registry.anonymous("binance").await.unwrap();
        registry.anonymous("okx").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), [
            ("binance".to_string(), 7),
            ("okx".to_string(), 12),
        ]);
    }
}
