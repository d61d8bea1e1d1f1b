//! Handler for per-ad analytics.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::Utc;
use serde_json::json;

use crate::api::dto::analytics::{AnalyticsQueryParams, AnalyticsResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Returns aggregated click metrics per ad.
///
/// # Endpoint
///
/// `GET /api/v1/ads/analytics`
///
/// # Query Parameters
///
/// - `ad_id` (optional): Restrict to one ad (`0` means all)
/// - `limit` (optional): Page size (default: 20, max: 100)
/// - `offset` (optional): Rows to skip (default: 0)
/// - `since`, `until` (optional): Absolute bounds (RFC3339)
/// - `time_window` (optional): Relative window ending now (`15m`, `1h30m`)
/// - `real_time` (optional): `true` to serve from the analytics cache
/// - `include_ctr` (optional): `true` to attach impressions and CTR
///
/// # Response
///
/// ```json
/// {
///   "data": [{ "ad_id": 1, "click_count": 10, "unique_clicks": 7, ... }],
///   "total": 1,
///   "generated_at": "2026-01-01T00:00:00Z",
///   "is_real_time": true,
///   "source": "cache"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request for unparsable parameters or `until` before `since`
/// - 503 Service Unavailable when the aggregation query times out
/// - 500 Internal Server Error when the query fails
pub async fn analytics_handler(
    State(state): State<AppState>,
    params: Result<Query<AnalyticsQueryParams>, QueryRejection>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let Query(params) = params.map_err(|rejection| {
        AppError::bad_request(
            "Invalid query parameters",
            json!({ "reason": rejection.body_text() }),
        )
    })?;

    let filter = params.into_filter()?;
    let is_real_time = filter.real_time;

    let result = state.analytics_service.get_aggregates(filter).await?;

    Ok(Json(AnalyticsResponse {
        total: result.items.len(),
        data: result.items,
        generated_at: Utc::now(),
        is_real_time,
        source: result.source,
    }))
}
