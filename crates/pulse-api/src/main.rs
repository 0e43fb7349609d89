//! 서비스 엔트리포인트.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pulse_api::{router, AppState, CascadeCredentialSource, JwtVerifier};
use pulse_core::config::AppConfig;
use pulse_core::crypto::CredentialEncryptor;
use pulse_core::logging::{init_logging, LogConfig};
use pulse_gateway::OrderGateway;
use pulse_market::{BroadcastHub, MarketAggregator};
use pulse_store::{FileTier, MemoryTier, PersistenceCascade, PostgresTier, StorageTier};
use pulse_venue::VenueRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_default().context("failed to load configuration")?;

    let log_format = config.logging.format.parse().unwrap_or_default();
    init_logging(LogConfig::new(&config.logging.level).with_format(log_format))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    // 저장 계층: Postgres → 파일 → 메모리
    let postgres = PostgresTier::connect_lazy(&config.database.url, config.database.max_connections)
        .context("invalid database configuration")?;
    postgres.ensure_schema_best_effort().await;
    let file = FileTier::new(&config.file_store.dir)
        .await
        .context("failed to prepare file store directory")?;
    let cascade = Arc::new(PersistenceCascade::new(vec![
        Arc::new(postgres) as Arc<dyn StorageTier>,
        Arc::new(file),
        Arc::new(MemoryTier::new()),
    ]));

    let encryptor = CredentialEncryptor::new(&config.encryption.master_key)
        .context("invalid credential master key")?;
    let registry = Arc::new(VenueRegistry::new(
        Arc::new(CascadeCredentialSource::new(cascade.clone())),
        encryptor,
        config.venues.clone(),
    ));

    let hub = Arc::new(BroadcastHub::new());
    let aggregator = Arc::new(MarketAggregator::new(
        registry.clone(),
        cascade.clone(),
        hub.clone(),
        config.market.clone(),
    ));
    let cancel = CancellationToken::new();
    let aggregator_handle = aggregator.spawn(cancel.clone());

    let gateway = Arc::new(OrderGateway::new(
        registry.clone(),
        cascade.clone(),
        hub.clone(),
    ));

    let state = AppState {
        registry,
        cascade,
        hub,
        gateway,
        verifier: Arc::new(JwtVerifier::new(&config.auth.jwt_secret)),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutting down");
    cancel.cancel();
    let _ = aggregator_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
