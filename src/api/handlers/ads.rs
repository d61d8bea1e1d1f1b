//! Handler for the ads catalogue.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde_json::json;

use crate::api::dto::ads::{AdItem, AdsListResponse};
use crate::api::dto::pagination::PaginationParams;
use crate::error::AppError;
use crate::state::AppState;

/// Lists ads, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/ads`
///
/// # Query Parameters
///
/// - `page` (optional): Page number (default: 1)
/// - `limit` (optional): Items per page (default: 10, max: 100)
///
/// # Errors
///
/// Returns 400 Bad Request if pagination parameters are invalid.
pub async fn ads_list_handler(
    State(state): State<AppState>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<AdsListResponse>, AppError> {
    let Query(params) = params.map_err(|rejection| {
        AppError::bad_request(
            "Invalid query parameters",
            json!({ "reason": rejection.body_text() }),
        )
    })?;

    let page = params
        .validate()
        .map_err(|e| AppError::bad_request(e, json!({ "page": params.page, "limit": params.limit })))?;

    let (ads, total) = state.ad_service.list_ads(page.page, page.limit).await?;

    Ok(Json(AdsListResponse {
        page: page.page,
        limit: page.limit,
        total,
        data: ads.into_iter().map(AdItem::from).collect(),
    }))
}
