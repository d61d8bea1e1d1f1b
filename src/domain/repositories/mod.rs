//! Repository trait definitions for the domain layer.
//!
//! These traits abstract data access following the Repository pattern and are
//! implemented by concrete repositories in the infrastructure layer.
//!
//! # Architecture
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::persistence`
//! - Mock implementations are auto-generated via `mockall` for testing
//!
//! # Available Repositories
//!
//! - [`ClickRepository`] - Idempotent click inserts
//! - [`AnalyticsRepository`] - Click/impression aggregation
//! - [`AdRepository`] - Ads catalogue
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod ad_repository;
pub mod analytics_repository;
pub mod click_repository;

pub use ad_repository::AdRepository;
pub use analytics_repository::AnalyticsRepository;
pub use click_repository::ClickRepository;

#[cfg(test)]
pub use ad_repository::MockAdRepository;
#[cfg(test)]
pub use analytics_repository::MockAnalyticsRepository;
#[cfg(test)]
pub use click_repository::MockClickRepository;
