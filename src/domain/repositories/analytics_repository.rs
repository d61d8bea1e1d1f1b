//! Repository trait for analytics aggregation queries.

use std::collections::HashMap;

use crate::domain::entities::{AdMetrics, AggregateQuery};
use crate::error::AppError;
use async_trait::async_trait;

/// Read side used by the analytics service.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgAnalyticsRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_analytics.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Groups clicks by ad within the query bounds.
    ///
    /// Rows are ordered by click count descending and paginated with the
    /// query's limit/offset. CTR fields are never set here.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn aggregate_clicks(&self, query: AggregateQuery) -> Result<Vec<AdMetrics>, AppError>;

    /// Counts impressions per ad for the given ad identities.
    ///
    /// Ads without impressions are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn count_impressions(&self, ad_ids: Vec<i64>) -> Result<HashMap<i64, i64>, AppError>;
}
