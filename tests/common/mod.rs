#![allow(dead_code)]

use async_trait::async_trait;
use clickstream::application::services::{AdService, AnalyticsService, AnalyticsSettings};
use clickstream::domain::circuit_breaker::BreakerState;
use clickstream::domain::click_event::ClickEvent;
use clickstream::domain::messaging::{EventPublisher, PublishError};
use clickstream::infrastructure::cache::{AnalyticsCache, CacheSettings};
use clickstream::infrastructure::persistence::{PgAdRepository, PgAnalyticsRepository};
use clickstream::state::AppState;
use sqlx::PgPool;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Publisher that hands every event to a channel instead of a broker.
pub struct RecordingPublisher {
    tx: mpsc::UnboundedSender<ClickEvent>,
    pub breaker: Mutex<BreakerState>,
    pub healthy: Mutex<bool>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: ClickEvent) -> Result<(), PublishError> {
        let _ = self.tx.send(event);
        Ok(())
    }

    fn breaker_state(&self) -> BreakerState {
        *self.breaker.lock().unwrap()
    }

    async fn health_check(&self) -> bool {
        *self.healthy.lock().unwrap()
    }
}

pub struct TestContext {
    pub state: AppState,
    pub publisher: Arc<RecordingPublisher>,
    pub published: mpsc::UnboundedReceiver<ClickEvent>,
    pub cache: Arc<AnalyticsCache>,
}

/// Builds application state over a test database and a recording publisher.
///
/// Client IPs are read from `X-Forwarded-For`, since test requests carry no
/// peer address.
pub fn create_test_state(pool: PgPool) -> TestContext {
    let pool = Arc::new(pool);
    let (tx, published) = mpsc::unbounded_channel();

    let publisher = Arc::new(RecordingPublisher {
        tx,
        breaker: Mutex::new(BreakerState::Closed),
        healthy: Mutex::new(true),
    });

    let cache = Arc::new(AnalyticsCache::new(CacheSettings::default()));
    let analytics_service = Arc::new(AnalyticsService::new(
        Arc::new(PgAnalyticsRepository::new(pool.clone())),
        cache.clone(),
        AnalyticsSettings::default(),
    ));
    let ad_service = Arc::new(AdService::new(Arc::new(PgAdRepository::new(pool.clone()))));

    let state = AppState::new(
        pool,
        publisher.clone(),
        analytics_service,
        ad_service,
        true,
    );

    TestContext {
        state,
        publisher,
        published,
        cache,
    }
}

pub async fn create_test_ad(pool: &PgPool, title: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO ads (title, image_url, target_url) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(title)
    .bind("https://cdn.example.com/ad.png")
    .bind("https://example.com/landing")
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_test_click(
    pool: &PgPool,
    ad_id: i64,
    ip: &str,
    playback: f64,
    watched: f64,
) {
    sqlx::query(
        "INSERT INTO clicks (event_id, ad_id, user_ip, playback_time_sec, watched_percent) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(ad_id)
    .bind(ip)
    .bind(playback)
    .bind(watched)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn create_old_click(pool: &PgPool, ad_id: i64, ip: &str) {
    sqlx::query(
        "INSERT INTO clicks (event_id, ad_id, user_ip, created_at) \
         VALUES ($1, $2, $3, NOW() - INTERVAL '3 days')",
    )
    .bind(Uuid::new_v4())
    .bind(ad_id)
    .bind(ip)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn create_test_impressions(pool: &PgPool, ad_id: i64, count: usize) {
    for i in 0..count {
        sqlx::query("INSERT INTO impressions (event_id, ad_id, user_ip) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(ad_id)
            .bind(format!("10.0.0.{}", i))
            .execute(pool)
            .await
            .unwrap();
    }
}

pub async fn count_clicks(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM clicks")
        .fetch_one(pool)
        .await
        .unwrap()
}
