//! Repository trait for the ads catalogue.

use crate::domain::entities::{Ad, NewAd};
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdRepository: Send + Sync {
    /// Lists ads newest first.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Ad>, AppError>;

    /// Counts all ads.
    async fn count(&self) -> Result<i64, AppError>;

    /// Creates a new ad with `active` status.
    async fn create(&self, new_ad: NewAd) -> Result<Ad, AppError>;
}
