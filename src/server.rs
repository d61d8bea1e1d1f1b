//! HTTP server initialization and runtime setup.
//!
//! Handles database and broker connections, background task spawning and the
//! Axum server lifecycle.

use crate::api::routes::ClickRateLimit;
use crate::application::services::{AdService, AnalyticsService, ClickPublisher};
use crate::config::Config;
use crate::domain::circuit_breaker::CircuitBreaker;
use crate::domain::click_worker::supervise_consumer;
use crate::domain::messaging::{EventPublisher, EventTransport};
use crate::infrastructure::cache::AnalyticsCache;
use crate::infrastructure::messaging::{RedisStreamConsumer, RedisStreamProducer, connect};
use crate::infrastructure::persistence::{
    PgAdRepository, PgAnalyticsRepository, PgClickRepository,
};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis Streams producer and consumer connections
/// - Circuit breaker and click publisher
/// - Supervised click consumer and analytics cache refresh
/// - Axum HTTP server with graceful shutdown
///
/// On shutdown the background tasks are signalled first, then the producer
/// is closed so queued clicks get flushed.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Redis is unreachable at startup
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    // Separate connections: a blocking XREADGROUP must not stall publishes.
    let producer_conn = connect(&config.redis_url, config.producer_response_timeout())
        .await
        .context("Failed to connect producer to Redis")?;
    let consumer_conn = connect(&config.redis_url, config.consumer_response_timeout())
        .await
        .context("Failed to connect consumer to Redis")?;
    tracing::info!("Connected to Redis");

    let producer = Arc::new(RedisStreamProducer::new(
        producer_conn,
        config.producer_settings(),
    ));
    let breaker = Arc::new(CircuitBreaker::new(config.breaker_settings()));
    let transport: Arc<dyn EventTransport> = producer.clone();
    let publisher: Arc<dyn EventPublisher> = Arc::new(ClickPublisher::new(
        transport,
        breaker,
        config.publisher_settings(),
    ));

    let pool = Arc::new(pool);
    let click_repository = Arc::new(PgClickRepository::new(pool.clone()));
    let analytics_repository = Arc::new(PgAnalyticsRepository::new(pool.clone()));
    let ad_repository = Arc::new(PgAdRepository::new(pool.clone()));

    let cache = Arc::new(AnalyticsCache::new(config.cache_settings()));
    let analytics_service = Arc::new(AnalyticsService::new(
        analytics_repository,
        cache,
        config.analytics_settings(),
    ));
    let ad_service = Arc::new(AdService::new(ad_repository));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_settings = config.consumer_settings();
    let consumer = tokio::spawn(supervise_consumer(
        move || RedisStreamConsumer::subscribe(consumer_conn.clone(), consumer_settings.clone()),
        click_repository,
        shutdown_rx.clone(),
        config.worker_settings(),
    ));
    tracing::info!("Click consumer started");

    let refresh = analytics_service.clone().spawn_cache_refresh(shutdown_rx);
    tracing::info!("Analytics cache refresh started");

    let state = AppState::new(
        pool,
        publisher,
        analytics_service,
        ad_service,
        config.behind_proxy,
    );

    let app = app_router(
        state,
        ClickRateLimit {
            per_second: config.click_rate_per_second,
            burst: config.click_rate_burst,
            behind_proxy: config.behind_proxy,
        },
    )?;

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    let served = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    tracing::info!("Shutting down background tasks");
    // Receivers may already be gone if both tasks exited on their own.
    let _ = shutdown_tx.send(true);

    if let Err(e) = consumer.await {
        tracing::error!(error = %e, "Click consumer task failed");
    }
    if let Err(e) = refresh.await {
        tracing::error!(error = %e, "Analytics refresh task failed");
    }

    match producer.close().await {
        Ok(()) => tracing::info!("Click producer closed"),
        Err(e) => tracing::error!(error = %e, "Click producer did not close cleanly"),
    }

    served?;
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
