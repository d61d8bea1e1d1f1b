//! Click entity: a persisted click event.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::click_event::ClickEvent;

/// A click row as stored in the `clicks` table.
#[derive(Debug, Clone, FromRow)]
pub struct Click {
    pub id: i64,
    pub event_id: Uuid,
    pub ad_id: i64,
    pub user_ip: String,
    pub user_agent: String,
    pub playback_time_sec: f64,
    pub watched_percent: f64,
    pub client_timestamp: i64,
    pub is_fraudulent: bool,
    pub created_at: DateTime<Utc>,
}

/// Input data for recording a new click.
///
/// Built by the consumer worker from a validated [`ClickEvent`]. The
/// `created_at` timestamp is assigned by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClick {
    pub event_id: Uuid,
    pub ad_id: i64,
    pub user_ip: String,
    pub user_agent: String,
    pub playback_time_sec: f64,
    pub watched_percent: f64,
    pub client_timestamp: i64,
    /// Fraud classification hook; always `false` until a classifier exists.
    pub is_fraudulent: bool,
}

impl From<ClickEvent> for NewClick {
    fn from(event: ClickEvent) -> Self {
        Self {
            event_id: event.event_id,
            ad_id: event.ad_id,
            user_ip: event.user_ip,
            user_agent: event.agent,
            playback_time_sec: event.play_time_secs,
            watched_percent: event.watched_percent,
            client_timestamp: event.timestamp,
            is_fraudulent: false,
        }
    }
}

/// Result of inserting a click keyed by its event identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The event identity was already stored; nothing was written.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_click_from_event() {
        let event = ClickEvent::new(None, 7, "192.168.1.1", "Chrome/120", 3.5, 40.0, 1_700_000_000);
        let id = event.event_id;

        let click = NewClick::from(event);

        assert_eq!(click.event_id, id);
        assert_eq!(click.ad_id, 7);
        assert_eq!(click.user_ip, "192.168.1.1");
        assert_eq!(click.user_agent, "Chrome/120");
        assert_eq!(click.playback_time_sec, 3.5);
        assert_eq!(click.watched_percent, 40.0);
        assert_eq!(click.client_timestamp, 1_700_000_000);
        assert!(!click.is_fraudulent);
    }
}
