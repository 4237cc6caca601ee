use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rush_api::{app, AppState, AuthConfig, Repositories};
use rush_booking::LedgerSettings;
use rush_store::app_config::{Config, StorageBackend};
use rush_store::{DbClient, EventProducer, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rush_api=debug,rush_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Campus Rush API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, all data is lost on restart");
            Repositories::in_memory()
        }
    };

    let kafka = if config.kafka.brokers.is_empty() {
        tracing::warn!("No Kafka brokers configured, ledger events stay in-process");
        None
    } else {
        let producer = EventProducer::new(&config.kafka.brokers, &config.kafka.topic_prefix)
            .context("Failed to create Kafka producer")?;
        Some(Arc::new(producer))
    };

    let settings = LedgerSettings {
        max_attempts: config.ledger.max_attempts,
        retry_backoff: config.ledger.retry_backoff(),
    };

    let mut app_state = AppState::new(
        repos,
        kafka,
        settings,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    )
    .with_cors(config.cors.clone());

    if !config.redis.url.is_empty() {
        let redis = RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?;
        app_state = app_state.with_rate_limit(Arc::new(redis), config.rate_limit.clone());
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
