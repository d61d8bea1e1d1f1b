//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! validation, and business rules. Services consume repository and broker
//! traits and provide a clean API for HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::click_service::ClickService`] - Click validation and fire-and-forget publishing
//! - [`services::click_publisher::ClickPublisher`] - Breaker-guarded, retrying broker publisher
//! - [`services::analytics_service::AnalyticsService`] - Cached per-ad analytics
//! - [`services::ad_service::AdService`] - Ads catalogue

pub mod services;
