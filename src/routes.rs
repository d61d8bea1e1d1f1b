//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`      - Health check: database, broker, breaker, cache
//! - `/api/v1/*`         - REST API
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-IP token bucket on click submission
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::tracing;
use crate::api::routes::ClickRateLimit;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `limit` - click endpoint rate limit; with `behind_proxy` the client IP is
///   read from `X-Forwarded-For` / `X-Real-IP` instead of the peer socket
///   address, so enable it only behind a trusted reverse proxy
///
/// # Errors
///
/// Returns an error if the rate limit configuration is invalid.
pub fn app_router(state: AppState, limit: ClickRateLimit) -> anyhow::Result<NormalizePath<Router>> {
    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api::routes::v1_routes(limit)?)
        .with_state(state)
        .layer(tracing::layer());

    Ok(NormalizePathLayer::trim_trailing_slash().layer(router))
}
