//! 시장 데이터 집계 사이클.
//!
//! 우선순위 목록의 거래소를 차례로 시도해 사이클마다 정확히 한
//! 거래소의 티커 집합을 채택합니다. 모든 거래소가 실패하면 데이터를
//! 지어내지 않고 market_error 한 건만 내보냅니다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pulse_core::config::MarketConfig;
use pulse_core::{Symbol, Ticker};
use pulse_store::PersistenceCascade;
use pulse_venue::VenueRegistry;

use crate::hub::BroadcastHub;
use crate::messages::{PriceDelta, ServerMessage};

/// 한 사이클의 결과.
#[derive(Debug)]
pub enum CycleOutcome {
    /// 채택된 거래소와 큐레이션된 티커 집합
    Data {
        venue: String,
        tickers: Vec<Ticker>,
        majors: Vec<Ticker>,
    },
    /// 사용 가능한 실시간 데이터 없음
    Unavailable,
}

/// 주기적 시장 데이터 집계기.
pub struct MarketAggregator {
    registry: Arc<VenueRegistry>,
    cascade: Arc<PersistenceCascade>,
    hub: Arc<BroadcastHub>,
    config: MarketConfig,
    major_pairs: Vec<Symbol>,
    in_flight: Arc<AtomicBool>,
}

impl MarketAggregator {
    pub fn new(
        registry: Arc<VenueRegistry>,
        cascade: Arc<PersistenceCascade>,
        hub: Arc<BroadcastHub>,
        config: MarketConfig,
    ) -> Self {
        let major_pairs = config
            .major_pairs
            .iter()
            .filter_map(|pair| {
                let parsed = Symbol::parse(pair);
                if parsed.is_none() {
                    warn!("Ignoring malformed major pair {:?}", pair);
                }
                parsed
            })
            .collect();

        Self {
            registry,
            cascade,
            hub,
            config,
            major_pairs,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 집계 루프를 별도 태스크로 시작합니다.
    ///
    /// 구독자가 없거나 이전 사이클이 아직 진행 중인 틱은 건너뜁니다.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let subscribers = self.hub.subscriber_watch();
            info!(
                "Market aggregator started (interval {}s, venues {:?})",
                self.config.interval_secs, self.config.venue_priority
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Market aggregator stopping");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                // 구독자가 없으면 거래소를 건드리지 않음
                if *subscribers.borrow() == 0 {
                    continue;
                }
                if self
                    .in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!("Previous aggregation cycle still in flight, skipping tick");
                    continue;
                }

                let aggregator = self.clone();
                tokio::spawn(async move {
                    aggregator.run_cycle().await;
                    aggregator.in_flight.store(false, Ordering::SeqCst);
                });
            }
        })
    }

    /// 사이클 하나를 수행하고 결과를 허브로 내보냅니다.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = match self.sweep().await {
            Some((venue, tickers)) => {
                let (curated, majors) = self.curate(tickers);
                self.persist_top(&curated).await;
                CycleOutcome::Data {
                    venue,
                    tickers: curated,
                    majors,
                }
            }
            None => CycleOutcome::Unavailable,
        };

        match &outcome {
            CycleOutcome::Data {
                venue,
                tickers,
                majors,
            } => {
                let timestamp = Utc::now();
                self.hub
                    .broadcast(ServerMessage::MarketUpdate {
                        venue: venue.clone(),
                        tickers: tickers.clone(),
                        timestamp,
                    })
                    .await;
                if !majors.is_empty() {
                    self.hub
                        .broadcast(ServerMessage::PriceUpdate {
                            venue: venue.clone(),
                            majors: majors.iter().map(PriceDelta::from).collect(),
                            timestamp,
                        })
                        .await;
                }
            }
            CycleOutcome::Unavailable => {
                self.hub
                    .broadcast(ServerMessage::MarketError {
                        message: "LIVE_DATA_REQUIRED".to_string(),
                    })
                    .await;
            }
        }

        outcome
    }

    /// 우선순위 순서의 페일오버 스윕. 비어 있지 않은 집합을 돌려준
    /// 첫 거래소가 이깁니다.
    async fn sweep(&self) -> Option<(String, Vec<Ticker>)> {
        for venue in &self.config.venue_priority {
            let adapter = match self.registry.anonymous(venue).await {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!("Skipping venue {}: {}", venue, e);
                    continue;
                }
            };

            match adapter.fetch_tickers().await {
                Ok(tickers) if !tickers.is_empty() => {
                    debug!("Cycle sourced from {} ({} tickers)", venue, tickers.len());
                    return Some((venue.clone(), tickers));
                }
                Ok(_) => warn!("Venue {} returned an empty ticker set", venue),
                Err(e) => warn!("Venue {} sweep failed: {}", venue, e),
            }
        }
        None
    }

    /// 큐레이션: 주요 페어 우선 포함, 남는 자리는 거래량 내림차순.
    fn curate(&self, tickers: Vec<Ticker>) -> (Vec<Ticker>, Vec<Ticker>) {
        let mut selected: Vec<Ticker> = Vec::new();
        let mut seen: HashSet<Symbol> = HashSet::new();

        let majors: Vec<Ticker> = self
            .major_pairs
            .iter()
            .filter_map(|pair| tickers.iter().find(|t| &t.symbol == pair).cloned())
            .collect();

        for ticker in &majors {
            if seen.insert(ticker.symbol.clone()) {
                selected.push(ticker.clone());
            }
        }

        let mut rest: Vec<Ticker> = tickers
            .into_iter()
            .filter(|t| !seen.contains(&t.symbol))
            .collect();
        rest.sort_by(|a, b| b.volume_24h.cmp(&a.volume_24h));

        for ticker in rest {
            if selected.len() >= self.config.top_cap {
                break;
            }
            seen.insert(ticker.symbol.clone());
            selected.push(ticker);
        }

        (selected, majors)
    }

    /// 상위 N 티커를 베스트에포트로 저장합니다. 실패해도 사이클은
    /// 계속됩니다.
    async fn persist_top(&self, curated: &[Ticker]) {
        let top = &curated[..curated.len().min(self.config.persist_top)];
        if top.is_empty() {
            return;
        }
        if let Err(e) = self.cascade.insert_tickers(top).await {
            debug!("Ticker persistence skipped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use pulse_core::crypto::{generate_master_key, CredentialEncryptor};
    use pulse_core::{Balance, OrderBook, OrderRequest, OrderResult, TradeTick};
    use pulse_store::MemoryTier;
    use pulse_venue::{
        CredentialSource, SourceError, VenueAdapter, VenueError, VenueErrorKind, VenueResult,
    };

    struct NoCredentials;

    #[async_trait]
    impl CredentialSource for NoCredentials {
        async fn fetch_envelope(
            &self,
            _user_id: &str,
            _venue: &str,
        ) -> Result<Option<String>, SourceError> {
            Ok(None)
        }
    }

    /// 고정 응답 어댑터. `fail`이면 모든 조회가 실패합니다.
    struct FixedAdapter {
        venue: &'static str,
        fail: bool,
        tickers: Vec<Ticker>,
    }

    #[async_trait]
    impl VenueAdapter for FixedAdapter {
        fn name(&self) -> &str {
            self.venue
        }

        async fn load_markets(&self) -> VenueResult<Vec<Symbol>> {
            Ok(Vec::new())
        }

        async fn fetch_ticker(&self, _symbol: &Symbol) -> VenueResult<Ticker> {
            unimplemented!()
        }

        async fn fetch_tickers(&self) -> VenueResult<Vec<Ticker>> {
            if self.fail {
                return Err(VenueError::new(
                    self.venue,
                    VenueErrorKind::Network("connection refused".to_string()),
                ));
            }
            Ok(self.tickers.clone())
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

    fn ticker(venue: &str, base: &str, volume: Decimal) -> Ticker {
        Ticker {
            symbol: Symbol::new(base, "USDT"),
            venue: venue.to_string(),
            last: dec!(100),
            bid: dec!(99),
            ask: dec!(101),
            change_24h_percent: dec!(1.5),
            volume_24h: volume,
            high_24h: dec!(110),
            low_24h: dec!(90),
            timestamp: Utc::now(),
        }
    }

    fn test_config() -> MarketConfig {
        MarketConfig {
            interval_secs: 5,
            venue_priority: vec!["binance".to_string(), "okx".to_string()],
            major_pairs: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            top_cap: 3,
            persist_top: 2,
        }
    }

    fn registry_of(binance_fail: bool, okx_tickers: Vec<Ticker>) -> Arc<VenueRegistry> {
        Arc::new(VenueRegistry::with_factory(
            Arc::new(NoCredentials),
            CredentialEncryptor::new(&generate_master_key()).unwrap(),
            std::collections::HashMap::new(),
            Arc::new(move |venue, _keys, _timeout| {
                let adapter: Arc<dyn VenueAdapter> = match venue {
                    "binance" => Arc::new(FixedAdapter {
                        venue: "binance",
                        fail: binance_fail,
                        tickers: vec![ticker("binance", "BTC", dec!(1000))],
                    }),
                    _ => Arc::new(FixedAdapter {
                        venue: "okx",
                        fail: false,
                        tickers: okx_tickers.clone(),
                    }),
                };
                Ok(adapter)
            }),
        ))
    }

    fn aggregator_with(registry: Arc<VenueRegistry>) -> (Arc<MarketAggregator>, Arc<BroadcastHub>) {
        let hub = Arc::new(BroadcastHub::new());
        let cascade = Arc::new(PersistenceCascade::new(vec![Arc::new(MemoryTier::new())
            as Arc<dyn pulse_store::StorageTier>]));
        let aggregator = Arc::new(MarketAggregator::new(
            registry,
            cascade,
            hub.clone(),
            test_config(),
        ));
        (aggregator, hub)
    }

    #[tokio::test]
    async fn test_failover_to_second_venue() {
        // 1순위 거래소가 죽으면 2순위의 전체 집합이 그 사이클의 정본
        let okx_set = vec![
            ticker("okx", "BTC", dec!(500)),
            ticker("okx", "DOGE", dec!(50)),
        ];
        let (aggregator, hub) = aggregator_with(registry_of(true, okx_set));
        let (_, mut rx) = hub.register("u1").await;

        let outcome = aggregator.run_cycle().await;
        let CycleOutcome::Data { venue, .. } = outcome else {
            panic!("expected data outcome");
        };
        assert_eq!(venue, "okx");

        let Some(ServerMessage::MarketUpdate { venue, .. }) = rx.recv().await else {
            panic!("expected market_update first");
        };
        assert_eq!(venue, "okx");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_waits_for_subscribers() {
        let okx_set = vec![ticker("okx", "BTC", dec!(500))];
        let (aggregator, hub) = aggregator_with(registry_of(true, okx_set));
        let cancel = CancellationToken::new();
        let handle = aggregator.spawn(cancel.clone());

        // 구독자가 없는 동안 틱은 조용히 지나감
        tokio::time::sleep(Duration::from_secs(12)).await;

        // 구독이 생기면 다음 틱부터 사이클이 돌기 시작
        let (_, mut rx) = hub.register("u1").await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MarketUpdate { .. })
        ));

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_disabled_venue_skipped_in_sweep() {
        // 1순위 거래소가 설정에서 비활성이면 정상이어도 건너뜀
        let venues = std::collections::HashMap::from([(
            "binance".to_string(),
            pulse_core::config::VenueConfig {
                enabled: false,
                timeout_secs: 5,
            },
        )]);
        let registry = Arc::new(VenueRegistry::with_factory(
            Arc::new(NoCredentials),
            CredentialEncryptor::new(&generate_master_key()).unwrap(),
            venues,
            Arc::new(|venue, _keys, _timeout| {
                let adapter: Arc<dyn VenueAdapter> = match venue {
                    "binance" => Arc::new(FixedAdapter {
                        venue: "binance",
                        fail: false,
                        tickers: vec![ticker("binance", "BTC", dec!(1000))],
                    }),
                    _ => Arc::new(FixedAdapter {
                        venue: "okx",
                        fail: false,
                        tickers: vec![ticker("okx", "BTC", dec!(500))],
                    }),
                };
                Ok(adapter)
            }),
        ));
        let (aggregator, _) = aggregator_with(registry);

        let outcome = aggregator.run_cycle().await;
        let CycleOutcome::Data { venue, .. } = outcome else {
            panic!("expected data outcome");
        };
        assert_eq!(venue, "okx");
    }

    #[tokio::test]
    async fn test_all_venues_down_emits_single_market_error() {
        let (aggregator, hub) = aggregator_with(registry_of(true, Vec::new()));
        let (_, mut rx) = hub.register("u1").await;

        let outcome = aggregator.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Unavailable));

        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::MarketError { .. })
        ));
        // market_error 한 건 외에는 아무것도 오지 않음
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_curation_majors_first_then_volume() {
        let tickers = vec![
            ticker("okx", "SHIB", dec!(9_000)),
            ticker("okx", "BTC", dec!(10)),
            ticker("okx", "PEPE", dec!(8_000)),
            ticker("okx", "ETH", dec!(5)),
            ticker("okx", "SOL", dec!(7_000)),
        ];
        let (aggregator, _) = aggregator_with(registry_of(true, tickers));

        let (curated, majors) = aggregator.curate(vec![
            ticker("okx", "SHIB", dec!(9_000)),
            ticker("okx", "BTC", dec!(10)),
            ticker("okx", "PEPE", dec!(8_000)),
            ticker("okx", "ETH", dec!(5)),
            ticker("okx", "SOL", dec!(7_000)),
        ]);

        // 주요 페어는 거래량과 무관하게 포함, 남는 한 자리는 최고 거래량
        assert_eq!(majors.len(), 2);
        assert_eq!(curated.len(), 3);
        assert_eq!(curated[0].symbol, Symbol::new("BTC", "USDT"));
        assert_eq!(curated[1].symbol, Symbol::new("ETH", "USDT"));
        assert_eq!(curated[2].symbol, Symbol::new("SHIB", "USDT"));
    }

    #[tokio::test]
    async fn test_price_update_restricted_to_majors() {
        let okx_set = vec![
            ticker("okx", "BTC", dec!(500)),
            ticker("okx", "SHIB", dec!(9_000)),
        ];
        let (aggregator, hub) = aggregator_with(registry_of(true, okx_set));
        let (_, mut rx) = hub.register("u1").await;

        aggregator.run_cycle().await;

        let _market_update = rx.recv().await;
        let Some(ServerMessage::PriceUpdate { majors, .. }) = rx.recv().await else {
            panic!("expected price_update second");
        };
        assert_eq!(majors.len(), 1);
        assert_eq!(majors[0].symbol, Symbol::new("BTC", "USDT"));
    }
}
