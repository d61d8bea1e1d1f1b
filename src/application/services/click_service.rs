//! Click ingestion service.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domain::click_event::ClickEvent;
use crate::domain::messaging::EventPublisher;
use crate::error::AppError;

/// An inbound click as accepted from a caller.
#[derive(Debug, Clone)]
pub struct ClickSubmission {
    pub ad_id: i64,
    pub playback_time_secs: f64,
    pub watched_percent: f64,
    /// Client-supplied epoch seconds; the server clock is used when absent.
    pub timestamp: Option<i64>,
    /// Caller-supplied idempotency key; generated when absent.
    pub event_id: Option<Uuid>,
    pub user_ip: String,
    pub user_agent: String,
}

/// Acknowledgement returned to the caller once the click is queued.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickReceipt {
    pub event_id: Uuid,
    pub timestamp: i64,
}

/// Validates clicks and hands them to the publisher without waiting.
///
/// Publishing runs on a detached task that outlives the request. Its outcome
/// is logged and never reported back to the caller.
pub struct ClickService {
    publisher: Arc<dyn EventPublisher>,
}

impl ClickService {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Records a click.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the ad id is not positive, the
    /// playback time is negative, or the watched percentage is outside
    /// `[0, 100]`. Nothing is published in that case.
    pub fn record_click(&self, submission: ClickSubmission) -> Result<ClickReceipt, AppError> {
        let timestamp = submission
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp());

        let event = ClickEvent::new(
            submission.event_id,
            submission.ad_id,
            submission.user_ip,
            submission.user_agent,
            submission.playback_time_secs,
            submission.watched_percent,
            timestamp,
        );

        event.check().map_err(|reason| {
            AppError::bad_request(reason, json!({ "ad_id": event.ad_id }))
        })?;

        let receipt = ClickReceipt {
            event_id: event.event_id,
            timestamp,
        };

        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            let ad_id = event.ad_id;
            let event_id = event.event_id;

            match publisher.publish(event).await {
                Ok(()) => debug!(ad_id, %event_id, "Click handed to broker"),
                Err(e) if e.is_breaker() => {
                    warn!(ad_id, %event_id, error = %e, "Click dropped, broker circuit open")
                }
                Err(e) => error!(ad_id, %event_id, error = %e, "Click dropped, publish failed"),
            }
        });

        Ok(receipt)
    }
}
