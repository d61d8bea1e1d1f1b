//! Repository trait for click persistence.

use crate::domain::entities::{InsertOutcome, NewClick};
use crate::error::AppError;
use async_trait::async_trait;

/// Write side of the click pipeline.
///
/// Insert is the only write the consumer performs. The `event_id` unique
/// constraint makes the insert idempotent under broker redelivery.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgClickRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickRepository: Send + Sync {
    /// Inserts a click.
    ///
    /// # Returns
    ///
    /// - `Ok(InsertOutcome::Inserted)` when a row was written
    /// - `Ok(InsertOutcome::Duplicate)` when the event identity already exists
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on any other database error.
    async fn insert_click(&self, new_click: NewClick) -> Result<InsertOutcome, AppError>;
}
