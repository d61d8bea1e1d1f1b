//! In-memory, TTL-bounded cache of per-ad analytics.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::entities::AdMetrics;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// An entry is fresh while `now - last_updated < ttl`, where
    /// `last_updated` is the newest click the aggregate covers.
    pub ttl: Duration,
    /// Upper bound on entries; `0` means unbounded.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            max_entries: 10_000,
        }
    }
}

/// Snapshot of cache occupancy for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub expired_entries: usize,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    metrics: AdMetrics,
    /// Write time; orders eviction only.
    stored_at: Instant,
}

impl Entry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.metrics.last_updated < ttl
    }
}

/// Map from ad id to its latest aggregated metrics.
///
/// Reads take the shared lock, writes the exclusive one. Freshness follows
/// the wall clock against each aggregate's `last_updated`, so an ad without
/// recent clicks is never served as fresh however recently it was written.
/// Expired entries are kept and skipped by reads until overwritten; they are
/// only removed when the capacity bound forces eviction, oldest write first
/// and least clicked first among writes of the same batch. Concurrent writers
/// are not coordinated: the last write for an ad wins.
pub struct AnalyticsCache {
    entries: RwLock<HashMap<i64, Entry>>,
    settings: CacheSettings,
    ttl: TimeDelta,
}

impl AnalyticsCache {
    pub fn new(settings: CacheSettings) -> Self {
        let ttl = TimeDelta::from_std(settings.ttl).unwrap_or(TimeDelta::MAX);
        Self {
            entries: RwLock::new(HashMap::new()),
            settings,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.settings.ttl
    }

    /// Returns the entry for `ad_id` if present and fresh.
    pub async fn get_fresh(&self, ad_id: i64) -> Option<AdMetrics> {
        let now = Utc::now();
        let entries = self.entries.read().await;

        entries
            .get(&ad_id)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.metrics.clone())
    }

    /// All fresh entries, most clicked first (ties broken by ad id).
    pub async fn fresh_entries(&self) -> Vec<AdMetrics> {
        let now = Utc::now();
        let entries = self.entries.read().await;

        let mut fresh: Vec<AdMetrics> = entries
            .values()
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.metrics.clone())
            .collect();

        fresh.sort_by(|a, b| {
            b.click_count
                .cmp(&a.click_count)
                .then_with(|| a.ad_id.cmp(&b.ad_id))
        });
        fresh
    }

    /// Overwrites the entries for every ad in `results`.
    ///
    /// Returns the number of entries written.
    pub async fn store_all(&self, results: Vec<AdMetrics>) -> usize {
        if results.is_empty() {
            return 0;
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let written = results.len();
        for metrics in results {
            entries.insert(
                metrics.ad_id,
                Entry {
                    metrics,
                    stored_at: now,
                },
            );
        }

        let evicted = self.evict_overflow(&mut entries);
        debug!(ads_updated = written, evicted, "Analytics cache updated");

        written
    }

    fn evict_overflow(&self, entries: &mut HashMap<i64, Entry>) -> usize {
        let max = self.settings.max_entries;
        if max == 0 || entries.len() <= max {
            return 0;
        }

        let mut by_age: Vec<(Instant, i64, i64)> = entries
            .iter()
            .map(|(ad_id, entry)| (entry.stored_at, entry.metrics.click_count, *ad_id))
            .collect();
        by_age.sort_unstable();

        let overflow = entries.len() - max;
        for (_, _, ad_id) in by_age.into_iter().take(overflow) {
            entries.remove(&ad_id);
        }
        overflow
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().await;

        let fresh_entries = entries
            .values()
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .count();

        CacheStats {
            total_entries: entries.len(),
            fresh_entries,
            expired_entries: entries.len() - fresh_entries,
            ttl_seconds: self.settings.ttl.as_secs(),
        }
    }
}
