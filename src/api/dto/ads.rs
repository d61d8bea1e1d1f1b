//! DTOs for the ads catalogue.

use serde::Serialize;

use crate::domain::entities::Ad;

/// One ad as listed by `GET /api/v1/ads`.
#[derive(Debug, Serialize)]
pub struct AdItem {
    pub id: i64,
    pub title: String,
    pub image_url: String,
    pub target_url: String,
    pub status: String,
}

impl From<Ad> for AdItem {
    fn from(ad: Ad) -> Self {
        Self {
            id: ad.id,
            title: ad.title,
            image_url: ad.image_url,
            target_url: ad.target_url,
            status: ad.status,
        }
    }
}

/// Paginated ads listing.
#[derive(Debug, Serialize)]
pub struct AdsListResponse {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub data: Vec<AdItem>,
}
