//! Analytics entities: aggregated per-ad metrics and query filters.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::FromRow;

use crate::error::AppError;

/// Default page size applied when the caller supplies none.
pub const DEFAULT_LIMIT: i64 = 50;
/// Hard upper bound on page size.
pub const MAX_LIMIT: i64 = 1000;

/// Aggregated click metrics for one ad.
///
/// Produced by the aggregation query and stored in the analytics cache.
/// `ctr` and `impressions` are only set when CTR enrichment was requested
/// and the ad has at least one impression.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AdMetrics {
    pub ad_id: i64,
    pub click_count: i64,
    /// Clicks from distinct origin addresses.
    pub unique_clicks: i64,
    pub avg_playback_time: f64,
    pub avg_watch_percent: f64,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctr: Option<f64>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impressions: Option<i64>,
    /// Timestamp of the most recent click in the aggregated range.
    pub last_updated: DateTime<Utc>,
}

impl AdMetrics {
    /// Sets CTR as `clicks / impressions * 100` when `impressions > 0`.
    ///
    /// Zero or negative impression counts leave both fields unset.
    pub fn apply_impressions(&mut self, impressions: i64) {
        if impressions > 0 {
            self.impressions = Some(impressions);
            self.ctr = Some(self.click_count as f64 / impressions as f64 * 100.0);
        }
    }
}

/// Caller-supplied analytics query.
///
/// Call [`AnalyticsFilter::normalize`] before use; it applies the defaulting
/// rules and rejects inverted time ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsFilter {
    pub ad_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Relative window ending now, used when `since` is absent.
    pub time_window: Option<TimeDelta>,
    pub limit: i64,
    pub offset: i64,
    /// Serve from the analytics cache when fresh entries exist.
    pub real_time: bool,
    pub include_ctr: bool,
}

impl AnalyticsFilter {
    /// Creates a filter with pagination parameters.
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    /// Restricts the query to one ad.
    pub fn with_ad(mut self, ad_id: Option<i64>) -> Self {
        self.ad_id = ad_id;
        self
    }

    /// Adds absolute time bounds.
    pub fn with_date_range(
        mut self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    /// Adds a relative time window.
    pub fn with_window(mut self, window: Option<TimeDelta>) -> Self {
        self.time_window = window;
        self
    }

    pub fn real_time(mut self, real_time: bool) -> Self {
        self.real_time = real_time;
        self
    }

    pub fn include_ctr(mut self, include_ctr: bool) -> Self {
        self.include_ctr = include_ctr;
        self
    }

    /// Applies defaults and validates the filter.
    ///
    /// - `limit <= 0` becomes 50, `limit > 1000` is clamped to 1000
    /// - negative `offset` becomes 0
    /// - a positive window without `since` sets `since = now - window`
    /// - with no bounds and no window at all, `since = now - 24h`
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `until` precedes `since`.
    pub fn normalize(mut self, now: DateTime<Utc>) -> Result<Self, AppError> {
        if self.limit <= 0 {
            self.limit = DEFAULT_LIMIT;
        }
        if self.limit > MAX_LIMIT {
            self.limit = MAX_LIMIT;
        }
        if self.offset < 0 {
            self.offset = 0;
        }

        let window = self.time_window.filter(|w| *w > TimeDelta::zero());

        if let Some(window) = window
            && self.since.is_none()
        {
            self.since = Some(now - window);
        }

        if self.since.is_none() && self.until.is_none() && window.is_none() {
            self.since = Some(now - TimeDelta::hours(24));
        }

        if let (Some(since), Some(until)) = (self.since, self.until)
            && until < since
        {
            return Err(AppError::bad_request(
                "until time cannot be before since time",
                json!({ "since": since, "until": until }),
            ));
        }

        Ok(self)
    }

    /// Storage query derived from a normalized filter.
    pub fn to_query(&self) -> AggregateQuery {
        AggregateQuery {
            ad_id: self.ad_id,
            since: self.since,
            until: self.until,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Parameters of the click aggregation query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub ad_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}
