//! Ads catalogue service.

use std::sync::Arc;

use serde_json::json;

use crate::domain::entities::{Ad, NewAd};
use crate::domain::repositories::AdRepository;
use crate::error::AppError;

pub struct AdService<R: AdRepository> {
    repository: Arc<R>,
}

impl<R: AdRepository> AdService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Lists ads newest first, returning the page and the total ad count.
    ///
    /// `page` is 1-based.
    pub async fn list_ads(&self, page: i64, limit: i64) -> Result<(Vec<Ad>, i64), AppError> {
        let offset = (page.max(1) - 1) * limit;
        let total = self.repository.count().await?;
        let ads = self.repository.list(offset, limit).await?;
        Ok((ads, total))
    }

    /// Creates an ad.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the title is blank.
    pub async fn create_ad(&self, new_ad: NewAd) -> Result<Ad, AppError> {
        if new_ad.title.trim().is_empty() {
            return Err(AppError::bad_request(
                "Ad title cannot be empty",
                json!({ "field": "title" }),
            ));
        }

        self.repository.create(new_ad).await
    }
}
