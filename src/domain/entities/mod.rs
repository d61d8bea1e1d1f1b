//! Core domain entities.
//!
//! Entities are plain data structures without business logic. Records that
//! are inserted have a separate `New*` input struct.
//!
//! # Entity Types
//!
//! - [`Ad`] - A served advertisement
//! - [`Click`] - A persisted click event
//! - [`AdMetrics`] - Aggregated per-ad analytics
//! - [`AnalyticsFilter`] - Caller-supplied analytics query

pub mod ad;
pub mod analytics;
pub mod click;

pub use ad::{Ad, NewAd};
pub use analytics::{AdMetrics, AggregateQuery, AnalyticsFilter};
pub use click::{Click, InsertOutcome, NewClick};
