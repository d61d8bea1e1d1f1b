//! API route configuration.

use crate::api::handlers::{ads_list_handler, analytics_handler, click_handler};
use crate::api::middleware::rate_limit;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Per-IP limits applied to click submission.
#[derive(Debug, Clone, Copy)]
pub struct ClickRateLimit {
    pub per_second: u64,
    pub burst: u32,
    pub behind_proxy: bool,
}

/// Read endpoints, unthrottled.
///
/// # Endpoints
///
/// - `GET  /ads`            - Paginated ads catalogue
/// - `GET  /ads/analytics`  - Aggregated click metrics per ad
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", get(ads_list_handler))
        .route("/ads/analytics", get(analytics_handler))
}

/// Click submission, rate limited per client IP.
///
/// # Endpoints
///
/// - `POST /ads/click`      - Queue a click for recording
pub fn click_routes(limit: ClickRateLimit) -> anyhow::Result<Router<AppState>> {
    let router = Router::new().route("/ads/click", post(click_handler));
    rate_limit::apply(router, limit.per_second, limit.burst, limit.behind_proxy)
}

/// All `/api/v1` routes.
pub fn v1_routes(limit: ClickRateLimit) -> anyhow::Result<Router<AppState>> {
    Ok(read_routes().merge(click_routes(limit)?))
}
