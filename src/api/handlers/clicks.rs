//! Handler for click submission.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::clicks::{ClickAcceptedResponse, ClickRequest};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::ClientIp;

/// Accepts a click for asynchronous recording.
///
/// # Endpoint
///
/// `POST /api/v1/ads/click`
///
/// # Request Body
///
/// ```json
/// {
///   "ad_id": 42,
///   "playback_time_secs": 12.5,
///   "watched_percent": 80,
///   "timestamp": 1735689600,                              // optional
///   "event_id": "6f1c2d3e-4b5a-4c6d-8e7f-9a0b1c2d3e4f"    // optional
/// }
/// ```
///
/// # Response
///
/// `202 Accepted` as soon as the click is validated. Publishing to the broker
/// happens in the background and its outcome is never reported here.
///
/// ```json
/// { "status": "click queued", "event_id": "...", "timestamp": 1735689600 }
/// ```
///
/// # Errors
///
/// Returns 400 Bad Request for a malformed body or out-of-range values.
pub async fn click_handler(
    State(state): State<AppState>,
    ClientIp(user_ip): ClientIp,
    headers: HeaderMap,
    payload: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClickAcceptedResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::bad_request(
            "Invalid request body",
            json!({ "reason": rejection.body_text() }),
        )
    })?;
    payload.validate()?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let receipt = state
        .click_service
        .record_click(payload.into_submission(user_ip, user_agent))?;

    tracing::debug!(event_id = %receipt.event_id, "Click accepted");

    Ok((StatusCode::ACCEPTED, Json(receipt.into())))
}
