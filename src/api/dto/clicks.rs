//! DTOs for click submission.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::services::{ClickReceipt, ClickSubmission};

/// Click reported by a player.
#[derive(Debug, Deserialize, Validate)]
pub struct ClickRequest {
    #[validate(range(min = 1, message = "ad_id must be a positive integer"))]
    pub ad_id: i64,

    #[validate(range(min = 0.0, message = "playback_time_secs must not be negative"))]
    #[serde(default)]
    pub playback_time_secs: f64,

    #[validate(range(min = 0.0, max = 100.0, message = "watched_percent must be between 0 and 100"))]
    #[serde(default)]
    pub watched_percent: f64,

    /// Epoch seconds on the client; the server clock is used when absent.
    pub timestamp: Option<i64>,

    /// Idempotency key. Resubmitting the same key never produces a second row.
    pub event_id: Option<Uuid>,
}

impl ClickRequest {
    pub fn into_submission(self, user_ip: String, user_agent: String) -> ClickSubmission {
        ClickSubmission {
            ad_id: self.ad_id,
            playback_time_secs: self.playback_time_secs,
            watched_percent: self.watched_percent,
            timestamp: self.timestamp,
            event_id: self.event_id,
            user_ip,
            user_agent,
        }
    }
}

/// Response for an accepted click.
#[derive(Debug, Serialize)]
pub struct ClickAcceptedResponse {
    pub status: &'static str,
    pub event_id: Uuid,
    pub timestamp: i64,
}

impl From<ClickReceipt> for ClickAcceptedResponse {
    fn from(receipt: ClickReceipt) -> Self {
        Self {
            status: "click queued",
            event_id: receipt.event_id,
            timestamp: receipt.timestamp,
        }
    }
}
