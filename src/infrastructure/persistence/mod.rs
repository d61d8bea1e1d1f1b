//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries mapped through `FromRow`.
//!
//! # Repositories
//!
//! - [`PgClickRepository`] - Idempotent click inserts
//! - [`PgAnalyticsRepository`] - Click aggregation and impression counts
//! - [`PgAdRepository`] - Ads catalogue

pub mod pg_ad_repository;
pub mod pg_analytics_repository;
pub mod pg_click_repository;

pub use pg_ad_repository::PgAdRepository;
pub use pg_analytics_repository::PgAnalyticsRepository;
pub use pg_click_repository::PgClickRepository;
