use anyhow::Context as _;
use chrono::Duration as ChronoDuration;
use convoy_api::{app, AppState};
use convoy_booking::TripService;
use convoy_catalog::{CacheCoordinator, CacheSettings};
use convoy_core::{CacheStore, Clock, Notifier, SystemClock, TripRepository};
use convoy_rules::{ContextBuilder, ContextPolicy, RuleRegistry, ValidationGateway};
use convoy_store::app_config::{Config, StorageBackend};
use convoy_store::{
    DbClient, EventProducer, InMemoryCache, InMemoryTripRepository, LogNotifier, PostgresTripRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convoy_api=debug,convoy_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Convoy API on port {}", config.server.port);

    let registry = match &config.rules.path {
        Some(path) => {
            tracing::info!("Loading rule table from {}", path);
            RuleRegistry::from_path(path).with_context(|| format!("Failed to load rules from {}", path))?
        }
        None => RuleRegistry::builtin(),
    };

    let (store, cache, notifier, rules): (Arc<dyn TripRepository>, Arc<dyn CacheStore>, Arc<dyn Notifier>, _) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let db = DbClient::new(&config.database.url)
                    .await
                    .context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                let rules = db
                    .fetch_business_rules(config.business_rules.clone())
                    .await
                    .context("Failed to load business rules")?;

                let redis = RedisClient::new(&config.redis.url)
                    .await
                    .context("Failed to connect to Redis")?;
                let kafka = EventProducer::new(&config.kafka.brokers, config.kafka.topic.clone())
                    .context("Failed to create Kafka producer")?;

                (
                    Arc::new(PostgresTripRepository::new(db.pool.clone())),
                    Arc::new(redis),
                    Arc::new(kafka),
                    rules,
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Running on the in-memory backend, nothing survives a restart");
                (
                    Arc::new(InMemoryTripRepository::new()),
                    Arc::new(InMemoryCache::new()),
                    Arc::new(LogNotifier),
                    config.business_rules.clone(),
                )
            }
        };

    let contexts = ContextBuilder::new(ContextPolicy {
        booking_limit: rules.booking_limit,
        conflict_window: ChronoDuration::minutes(rules.time_conflict_window_minutes),
    });
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let coordinator = Arc::new(CacheCoordinator::new(
        cache,
        store.clone(),
        clock.clone(),
        CacheSettings {
            listing_ttl_seconds: config.cache.listing_ttl_seconds,
            rider_ttl_seconds: config.cache.rider_ttl_seconds,
            op_timeout: Duration::from_millis(config.cache.op_timeout_ms),
        },
    ));
    coordinator.init().await;

    let service = TripService::new(
        store,
        ValidationGateway::new(Arc::new(registry)),
        contexts,
        coordinator.clone(),
        notifier,
        clock,
    )
    .with_claim_retries(rules.claim_retry_attempts);

    let state = AppState::new(Arc::new(service)).context("Failed to register metrics")?;
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.close();
    tracing::info!("Convoy API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
