//! Breaker-guarded, retrying publisher for click envelopes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::RetryIf;
use tracing::{debug, error, warn};

use crate::domain::circuit_breaker::{BreakerError, BreakerState, CircuitBreaker};
use crate::domain::click_event::ClickEvent;
use crate::domain::messaging::{EventPublisher, EventTransport, PublishError, TransportError};

/// Retry tuning for a single publish.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Delay after the first failed attempt; doubles after each further failure.
    pub initial_backoff: Duration,
    /// Deadline for one broker write.
    pub attempt_timeout: Duration,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// Publishes click envelopes to the broker.
///
/// Each call goes through the shared [`CircuitBreaker`]. When admitted, the
/// envelope is written with a per-attempt deadline and retried with
/// exponential backoff (`initial, 2*initial, 4*initial, ...`) until the
/// attempt budget is spent. An exhausted publish counts as one failure for
/// the breaker and is returned to the caller, which only logs it.
///
/// Worst-case latency is bounded by
/// `max_attempts * attempt_timeout + sum(backoff delays)`.
pub struct ClickPublisher {
    transport: Arc<dyn EventTransport>,
    breaker: Arc<CircuitBreaker>,
    settings: PublisherSettings,
}

impl ClickPublisher {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        breaker: Arc<CircuitBreaker>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            transport,
            breaker,
            settings,
        }
    }

    /// Delays slept between consecutive attempts.
    fn backoff_schedule(&self) -> impl Iterator<Item = Duration> + use<> {
        let initial = self.settings.initial_backoff;
        let retries = self.settings.max_attempts.saturating_sub(1) as u32;
        (0..retries).map(move |n| initial.saturating_mul(1u32 << n.min(31)))
    }

    async fn send_with_retry(&self, event: &ClickEvent, payload: &[u8]) -> Result<(), PublishError> {
        let key = event.key();
        let mut attempt = 0usize;

        let result = RetryIf::spawn(
            self.backoff_schedule(),
            || {
                attempt += 1;
                let current = attempt;
                let transport = self.transport.clone();
                let key = key.clone();
                let payload = payload.to_vec();
                let deadline = self.settings.attempt_timeout;
                let ad_id = event.ad_id;

                async move {
                    metrics::counter!("publish_attempts_total").increment(1);

                    let outcome = match tokio::time::timeout(deadline, transport.send(key, payload))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout),
                    };

                    if let Err(e) = &outcome {
                        warn!(ad_id, attempt = current, error = %e, "Broker publish attempt failed");
                    }
                    outcome
                }
            },
            |e: &TransportError| !matches!(e, TransportError::Closed),
        )
        .await;

        result.map_err(|source| PublishError::Exhausted { attempts: attempt, source })
    }
}

#[async_trait]
impl EventPublisher for ClickPublisher {
    async fn publish(&self, event: ClickEvent) -> Result<(), PublishError> {
        let payload = event.encode()?;

        let result = self
            .breaker
            .call(|| self.send_with_retry(&event, &payload))
            .await;

        match result {
            Ok(()) => {
                metrics::counter!("clicks_published_total").increment(1);
                debug!(
                    ad_id = event.ad_id,
                    event_id = %event.event_id,
                    "Click event published"
                );
                Ok(())
            }
            Err(BreakerError::Open) => {
                metrics::counter!("clicks_publish_failed_total", "reason" => "breaker_open")
                    .increment(1);
                Err(PublishError::BreakerOpen)
            }
            Err(BreakerError::TooManyRequests) => {
                metrics::counter!("clicks_publish_failed_total", "reason" => "breaker_saturated")
                    .increment(1);
                Err(PublishError::BreakerSaturated)
            }
            Err(BreakerError::Inner(e)) => {
                metrics::counter!("clicks_publish_failed_total", "reason" => "exhausted")
                    .increment(1);
                error!(
                    ad_id = event.ad_id,
                    event_id = %event.event_id,
                    error = %e,
                    "Giving up on click event"
                );
                Err(e)
            }
        }
    }

    fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    async fn health_check(&self) -> bool {
        self.transport.health_check().await
    }
}
