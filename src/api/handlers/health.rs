//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::domain::circuit_breaker::BreakerState;
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: Database or broker down, or breaker open
///
/// # Components Checked
///
/// 1. **Database**: `SELECT 1`
/// 2. **Broker**: Redis PING over the producer connection
/// 3. **Circuit breaker**: `open` counts as unhealthy, `half_open` does not
/// 4. **Analytics cache**: Entry counts, informational only
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "broker": { "status": "ok", "message": "Redis connected" },
///     "circuit_breaker": { "status": "ok", "message": "closed" },
///     "analytics_cache": { "status": "ok", "message": "12 entries (10 fresh, 2 expired), ttl 120s" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let database = check_database(&state).await;
    let broker = check_broker(&state).await;
    let circuit_breaker = check_breaker(&state);
    let analytics_cache = check_cache(&state).await;

    let all_healthy = database.is_ok() && broker.is_ok() && circuit_breaker.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            broker,
            circuit_breaker,
            analytics_cache,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    match sqlx::query("SELECT 1").execute(state.db.as_ref()).await {
        Ok(_) => CheckStatus::ok("Connected"),
        Err(e) => CheckStatus::error(format!("Database error: {}", e)),
    }
}

async fn check_broker(state: &AppState) -> CheckStatus {
    if state.publisher.health_check().await {
        CheckStatus::ok("Redis connected")
    } else {
        CheckStatus::error("Redis connection failed")
    }
}

fn check_breaker(state: &AppState) -> CheckStatus {
    let breaker_state = state.publisher.breaker_state();
    match breaker_state {
        BreakerState::Open => CheckStatus::error(breaker_state.as_str()),
        _ => CheckStatus::ok(breaker_state.as_str()),
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    let stats = state.analytics_service.cache_stats().await;
    CheckStatus::ok(format!(
        "{} entries ({} fresh, {} expired), ttl {}s",
        stats.total_entries, stats.fresh_entries, stats.expired_entries, stats.ttl_seconds
    ))
}
