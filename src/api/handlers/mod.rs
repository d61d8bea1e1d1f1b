//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod ads;
pub mod analytics;
pub mod clicks;
pub mod health;

pub use ads::ads_list_handler;
pub use analytics::analytics_handler;
pub use clicks::click_handler;
pub use health::health_handler;
