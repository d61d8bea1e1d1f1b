//! Click event envelope relayed through the message broker.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The canonical click record that travels from the ingestion path to the
/// consumer worker.
///
/// Serialized as a flat JSON object:
///
/// ```json
/// {
///   "event_id": "6f0d...",
///   "ad_id": 42,
///   "user_ip": "203.0.113.7",
///   "agent": "Mozilla/5.0",
///   "play_time_secs": 12.5,
///   "watched_percent": 80.0,
///   "timestamp": 1735689600
/// }
/// ```
///
/// `event_id` is the idempotency key: the `clicks` table carries a unique
/// constraint on it, so redelivered envelopes collapse into a single row.
/// Envelopes are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub event_id: Uuid,
    pub ad_id: i64,
    #[serde(default)]
    pub user_ip: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub play_time_secs: f64,
    #[serde(default)]
    pub watched_percent: f64,
    #[serde(default)]
    pub timestamp: i64,
}

impl ClickEvent {
    /// Builds an envelope, assigning a fresh identity when none was supplied.
    pub fn new(
        event_id: Option<Uuid>,
        ad_id: i64,
        user_ip: impl Into<String>,
        agent: impl Into<String>,
        play_time_secs: f64,
        watched_percent: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            event_id: event_id.filter(|id| !id.is_nil()).unwrap_or_else(Uuid::new_v4),
            ad_id,
            user_ip: user_ip.into(),
            agent: agent.into(),
            play_time_secs,
            watched_percent,
            timestamp,
        }
    }

    /// Broker message key.
    pub fn key(&self) -> String {
        self.event_id.to_string()
    }

    /// Encodes the envelope for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope received from the broker.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Checks the invariants a storable envelope must hold.
    ///
    /// Returns a short reason when the envelope must be rejected.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.event_id.is_nil() {
            return Err("event_id is nil");
        }
        if self.ad_id <= 0 {
            return Err("ad_id must be positive");
        }
        if !self.play_time_secs.is_finite() || self.play_time_secs < 0.0 {
            return Err("play_time_secs must be a non-negative number");
        }
        if !self.watched_percent.is_finite() || !(0.0..=100.0).contains(&self.watched_percent) {
            return Err("watched_percent must be within [0, 100]");
        }
        Ok(())
    }
}
