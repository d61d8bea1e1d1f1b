//! Circuit breaker guarding calls to the message broker.
//!
//! One breaker instance is created at startup and shared (via `Arc`) by every
//! publish task in the process. It moves between three states:
//!
//! - **Closed** - calls pass through; outcomes are counted in a rolling
//!   window that is cleared every `interval`.
//! - **Open** - calls fail fast with [`BreakerError::Open`] until
//!   `open_timeout` elapses.
//! - **Half-Open** - up to `half_open_max_requests` probes are admitted. A
//!   successful probe closes the breaker, a failed one reopens it with a fresh
//!   cooldown.
//!
//! Every state change starts a new generation with cleared counts. Outcomes
//! reported for an admission from an older generation are ignored.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    /// Trips when consecutive failures exceed this value.
    pub consecutive_failures: u32,
    /// Minimum requests in the window before the failure ratio applies.
    pub min_requests: u32,
    /// Trips when `failures / requests >= failure_ratio` (with enough requests).
    pub failure_ratio: f64,
    /// Closed-state counting window. Zero disables periodic clearing.
    pub interval: Duration,
    /// Cooldown spent in Open before probing.
    pub open_timeout: Duration,
    /// Concurrent probes admitted in Half-Open.
    pub half_open_max_requests: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: "broker-publish".to_string(),
            consecutive_failures: 5,
            min_requests: 10,
            failure_ratio: 0.5,
            interval: Duration::from_secs(60),
            open_timeout: Duration::from_secs(10),
            half_open_max_requests: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counters for the current generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the call was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// Half-Open probe budget is exhausted; the call was not attempted.
    #[error("circuit breaker is half-open and limiting calls")]
    TooManyRequests,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        let expiry = (!settings.interval.is_zero()).then(|| Instant::now() + settings.interval);
        metrics::gauge!("circuit_breaker_state", "name" => settings.name.clone()).set(0.0);

        Self {
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current state, advancing timers first.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Counts of the current generation.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Runs `f` if the breaker admits it and records the outcome.
    ///
    /// # Errors
    ///
    /// - [`BreakerError::Open`] / [`BreakerError::TooManyRequests`] when the
    ///   call was rejected without running `f`
    /// - [`BreakerError::Inner`] with the error returned by `f`
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.try_acquire()?;

        match f().await {
            Ok(value) => {
                admission.success();
                Ok(value)
            }
            Err(e) => {
                admission.failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Reserves a slot for one call.
    ///
    /// The returned guard must be resolved with [`Admission::success`] or
    /// [`Admission::failure`]; dropping it unresolved counts as a failure.
    pub fn try_acquire<E>(&self) -> Result<Admission<'_>, BreakerError<E>> {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        match inner.state {
            BreakerState::Open => return Err(BreakerError::Open),
            BreakerState::HalfOpen
                if inner.counts.requests >= self.settings.half_open_max_requests =>
            {
                return Err(BreakerError::TooManyRequests);
            }
            _ => {}
        }

        inner.counts.on_request();

        Ok(Admission {
            breaker: self,
            generation: inner.generation,
            resolved: false,
        })
    }

    fn record(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if inner.state == BreakerState::HalfOpen {
                self.transition(&mut inner, BreakerState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match inner.state {
                BreakerState::Closed if self.ready_to_trip(&inner.counts) => {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
                BreakerState::HalfOpen => {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
                _ => {}
            }
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.consecutive_failures > self.settings.consecutive_failures
            || (counts.requests >= self.settings.min_requests
                && f64::from(counts.total_failures)
                    >= f64::from(counts.requests) * self.settings.failure_ratio)
    }

    /// Applies timer-driven transitions: window reset in Closed, cooldown end in Open.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            BreakerState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        if inner.state == to {
            return;
        }

        let from = inner.state;
        let counts = inner.counts;
        inner.state = to;
        self.new_generation(inner, now);

        metrics::gauge!("circuit_breaker_state", "name" => self.settings.name.clone())
            .set(to.gauge_value());

        match to {
            BreakerState::Open => warn!(
                breaker = %self.settings.name,
                from = %from,
                to = %to,
                requests = counts.requests,
                failures = counts.total_failures,
                consecutive_failures = counts.consecutive_failures,
                "Circuit breaker state changed"
            ),
            _ => info!(
                breaker = %self.settings.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
    }

    fn new_generation(&self, inner: &mut Inner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            BreakerState::Closed => {
                (!self.settings.interval.is_zero()).then(|| now + self.settings.interval)
            }
            BreakerState::Open => Some(now + self.settings.open_timeout),
            BreakerState::HalfOpen => None,
        };
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A call slot granted by [`CircuitBreaker::try_acquire`].
#[must_use = "an unresolved admission is recorded as a failure"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    resolved: bool,
}

impl Admission<'_> {
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record(self.generation, true);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record(self.generation, false);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.record(self.generation, false);
        }
    }
}
