//! Caching layer for analytics reads.
//!
//! Provides [`AnalyticsCache`], a process-local map of per-ad metrics that
//! shields PostgreSQL from repeated aggregation queries. Each process keeps its
//! own cache; replicas do not share state.

mod analytics_cache;

pub use analytics_cache::{AnalyticsCache, CacheSettings, CacheStats};
