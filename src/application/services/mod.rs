//! Business logic services for the application layer.

pub mod ad_service;
pub mod analytics_service;
pub mod click_publisher;
pub mod click_service;

pub use ad_service::AdService;
pub use analytics_service::{AnalyticsResult, AnalyticsService, AnalyticsSettings, ResultSource};
pub use click_publisher::{ClickPublisher, PublisherSettings};
pub use click_service::{ClickReceipt, ClickService, ClickSubmission};
