//! Ad entity: a served advertisement.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// An advertisement available for serving.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ad {
    pub id: i64,
    pub title: String,
    pub image_url: String,
    pub target_url: String,
    /// One of `active`, `paused`, `archived`.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Input data for creating an ad.
#[derive(Debug, Clone)]
pub struct NewAd {
    pub title: String,
    pub image_url: String,
    pub target_url: String,
}
