//! DTOs for the analytics endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::api::dto::pagination::optional_rfc3339;
use crate::application::services::ResultSource;
use crate::domain::entities::{AdMetrics, AnalyticsFilter};
use crate::error::AppError;
use crate::utils::duration::parse_duration;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Query string of `GET /api/v1/ads/analytics`.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQueryParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub ad_id: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub offset: Option<i64>,

    #[serde(default, with = "optional_rfc3339")]
    pub since: Option<DateTime<Utc>>,

    #[serde(default, with = "optional_rfc3339")]
    pub until: Option<DateTime<Utc>>,

    /// Relative window such as `15m` or `1h30m`.
    pub time_window: Option<String>,

    pub real_time: Option<String>,
    pub include_ctr: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

impl AnalyticsQueryParams {
    /// Converts the query string into an [`AnalyticsFilter`].
    ///
    /// `limit` defaults to 20 and is clamped to 100, a negative `offset`
    /// becomes 0 and `ad_id=0` means "all ads". Flags are set only by the
    /// literal `true`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `time_window` is not a valid duration.
    pub fn into_filter(self) -> Result<AnalyticsFilter, AppError> {
        let limit = match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        let offset = self.offset.unwrap_or(0).max(0);

        let window = self
            .time_window
            .as_deref()
            .filter(|w| !w.is_empty())
            .map(parse_duration)
            .transpose()
            .map_err(|e| {
                AppError::bad_request(e.to_string(), json!({ "time_window": self.time_window }))
            })?;

        Ok(AnalyticsFilter::new(offset, limit)
            .with_ad(self.ad_id.filter(|id| *id != 0))
            .with_date_range(self.since, self.until)
            .with_window(window)
            .real_time(flag(&self.real_time))
            .include_ctr(flag(&self.include_ctr)))
    }
}

/// Analytics response envelope.
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub data: Vec<AdMetrics>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
    pub is_real_time: bool,
    pub source: ResultSource,
}
