//! Ad analytics service with a read-through in-memory cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::entities::{AdMetrics, AnalyticsFilter};
use crate::domain::repositories::AnalyticsRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{AnalyticsCache, CacheStats};

#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Deadline for each storage query.
    pub query_timeout: Duration,
    /// Period of the background top-ads refresh.
    pub refresh_interval: Duration,
    /// Trailing window aggregated by the background refresh.
    pub refresh_window: TimeDelta,
    /// Number of most-clicked ads kept warm by the background refresh.
    pub refresh_top_n: i64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(60),
            refresh_window: TimeDelta::hours(1),
            refresh_top_n: 100,
        }
    }
}

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Store,
}

impl ResultSource {
    fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Cache => "cache",
            ResultSource::Store => "store",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsResult {
    pub items: Vec<AdMetrics>,
    pub source: ResultSource,
}

/// Serves per-ad aggregates, preferring the cache for real-time requests.
///
/// # Resolution
///
/// 1. Real-time requests read fresh cache entries (one ad, or all fresh
///    entries when unscoped). Any cached data is a hit and is paginated
///    in memory; nothing cached falls through.
/// 2. Otherwise the click aggregation runs against PostgreSQL, optionally
///    enriched with CTR from impressions. The rows are written back to the
///    cache on a detached task.
///
/// Cached results are approximate: they ignore the request's time bounds and
/// reflect whatever range last populated each entry.
pub struct AnalyticsService<R: AnalyticsRepository> {
    repository: Arc<R>,
    cache: Arc<AnalyticsCache>,
    settings: AnalyticsSettings,
}

impl<R: AnalyticsRepository + 'static> AnalyticsService<R> {
    pub fn new(repository: Arc<R>, cache: Arc<AnalyticsCache>, settings: AnalyticsSettings) -> Self {
        Self {
            repository,
            cache,
            settings,
        }
    }

    /// Returns aggregated metrics matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an inverted time range,
    /// [`AppError::Unavailable`] when the query exceeds its deadline and
    /// [`AppError::Internal`] on database errors. CTR enrichment failures are
    /// not errors; the results are returned without CTR.
    pub async fn get_aggregates(&self, filter: AnalyticsFilter) -> Result<AnalyticsResult, AppError> {
        let filter = filter.normalize(Utc::now())?;

        if filter.real_time {
            if let Some(items) = self.from_cache(&filter).await {
                debug!(
                    ad_id = ?filter.ad_id,
                    results = items.len(),
                    "Serving analytics from cache"
                );
                return Ok(self.finish(items, ResultSource::Cache));
            }
            debug!(ad_id = ?filter.ad_id, "Cache miss, falling back to database");
        }

        let items = self.query_store(&filter).await?;

        let cache = self.cache.clone();
        let snapshot = items.clone();
        tokio::spawn(async move {
            cache.store_all(snapshot).await;
        });

        Ok(self.finish(items, ResultSource::Store))
    }

    fn finish(&self, items: Vec<AdMetrics>, source: ResultSource) -> AnalyticsResult {
        metrics::counter!("analytics_requests_total", "source" => source.as_str()).increment(1);
        AnalyticsResult { items, source }
    }

    /// `None` on a miss; `Some` (possibly empty after pagination) on a hit.
    async fn from_cache(&self, filter: &AnalyticsFilter) -> Option<Vec<AdMetrics>> {
        let cached = match filter.ad_id {
            Some(ad_id) => self.cache.get_fresh(ad_id).await.into_iter().collect(),
            None => self.cache.fresh_entries().await,
        };

        if cached.is_empty() {
            return None;
        }

        Some(paginate(cached, filter.offset, filter.limit))
    }

    async fn query_store(&self, filter: &AnalyticsFilter) -> Result<Vec<AdMetrics>, AppError> {
        let mut results = tokio::time::timeout(
            self.settings.query_timeout,
            self.repository.aggregate_clicks(filter.to_query()),
        )
        .await
        .map_err(|_| {
            AppError::unavailable(
                "Analytics query timed out",
                json!({ "timeout_secs": self.settings.query_timeout.as_secs() }),
            )
        })?
        .inspect_err(|e| error!(ad_id = ?filter.ad_id, error = %e, "Failed to fetch analytics from database"))?;

        if filter.include_ctr {
            self.enrich_with_ctr(&mut results).await;
        }

        debug!(
            results = results.len(),
            ad_id = ?filter.ad_id,
            "Analytics fetched from database"
        );
        Ok(results)
    }

    async fn enrich_with_ctr(&self, results: &mut [AdMetrics]) {
        if results.is_empty() {
            return;
        }

        let ad_ids = results.iter().map(|r| r.ad_id).collect();
        let impressions = match tokio::time::timeout(
            self.settings.query_timeout,
            self.repository.count_impressions(ad_ids),
        )
        .await
        {
            Ok(Ok(impressions)) => impressions,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to fetch impressions for CTR calculation");
                return;
            }
            Err(_) => {
                warn!("Impression query timed out, skipping CTR");
                return;
            }
        };

        for result in results.iter_mut() {
            if let Some(count) = impressions.get(&result.ad_id) {
                result.apply_impressions(*count);
            }
        }

        debug!(ads_with_ctr = impressions.len(), "CTR calculated for analytics results");
    }

    /// Recomputes the most-clicked ads over the refresh window and stores them.
    ///
    /// CTR is skipped to keep the refresh cheap.
    pub async fn refresh_top_ads(&self) -> Result<usize, AppError> {
        let filter = AnalyticsFilter::new(0, self.settings.refresh_top_n)
            .with_window(Some(self.settings.refresh_window))
            .normalize(Utc::now())?;

        let results = self.query_store(&filter).await?;
        Ok(self.cache.store_all(results).await)
    }

    /// Spawns the periodic cache refresh.
    ///
    /// The first refresh runs one interval after start. The task stops when
    /// `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn_cache_refresh(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.settings.refresh_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = period.as_secs(), "Analytics cache refresh started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.refresh_top_ads().await {
                            Ok(cached) => debug!(ads_cached = cached, "Analytics cache refreshed"),
                            Err(e) => error!(error = %e, "Failed to refresh analytics cache"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Analytics cache refresh stopped");
        })
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}
