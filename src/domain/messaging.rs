//! Broker-facing traits for the click pipeline.
//!
//! The producer side ([`EventTransport`]) and the consumer side
//! ([`EventSource`]) are implemented over Redis Streams in
//! [`crate::infrastructure::messaging`]; tests substitute mocks.

use async_trait::async_trait;

use crate::domain::circuit_breaker::BreakerState;
use crate::domain::click_event::ClickEvent;

/// Errors raised by a broker connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker operation error: {0}")]
    Operation(String),
    /// The consumer group no longer exists, e.g. after the broker lost its
    /// data. Reads cannot succeed until the group is created again.
    #[error("consumer group missing: {0}")]
    GroupMissing(String),
    #[error("broker operation timed out")]
    Timeout,
    #[error("producer is closed")]
    Closed,
}

/// Errors surfaced by [`EventPublisher::publish`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The breaker rejected the call; nothing was sent.
    #[error("circuit breaker is open, skipping broker publish")]
    BreakerOpen,
    /// Half-Open probe budget exhausted; nothing was sent.
    #[error("too many requests, circuit breaker limiting calls")]
    BreakerSaturated,
    #[error("failed to encode click event: {0}")]
    Encode(#[from] serde_json::Error),
    /// All attempts failed; carries the last transport error.
    #[error("failed to publish click event after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: TransportError,
    },
}

impl PublishError {
    /// Whether the breaker, rather than the broker, refused the call.
    pub fn is_breaker(&self) -> bool {
        matches!(
            self,
            PublishError::BreakerOpen | PublishError::BreakerSaturated
        )
    }
}

/// Keyed, acknowledged delivery of one message to the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Sends one message and waits for the broker acknowledgement.
    async fn send(&self, key: String, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Checks broker reachability.
    async fn health_check(&self) -> bool;
}

/// A message read from the broker subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Broker-assigned id, used for acknowledgement.
    pub id: String,
    pub payload: Vec<u8>,
}

/// Consumer-group subscription.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next batch of messages. An empty batch means the wait
    /// timed out with nothing to read.
    async fn next_batch(&mut self) -> Result<Vec<StreamMessage>, TransportError>;

    /// Acknowledges handled messages so they are not redelivered.
    async fn ack(&mut self, ids: Vec<String>) -> Result<(), TransportError>;
}

/// Fire-and-forget publishing of click envelopes.
///
/// # Implementations
///
/// - [`crate::application::services::ClickPublisher`] - breaker-guarded,
///   retrying publisher over an [`EventTransport`]
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ClickEvent) -> Result<(), PublishError>;

    /// Current state of the guarding breaker.
    fn breaker_state(&self) -> BreakerState;

    /// Checks broker reachability.
    async fn health_check(&self) -> bool;
}
