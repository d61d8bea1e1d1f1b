//! Consumer loop that persists click envelopes from the broker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::{InsertOutcome, NewClick};
use crate::domain::messaging::{EventSource, StreamMessage, TransportError};
use crate::domain::repositories::ClickRepository;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause after a failed broker read before polling again.
    pub read_retry_delay: Duration,
    /// Pause before restarting a consumer that panicked or failed to subscribe.
    pub restart_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            read_retry_delay: Duration::from_secs(1),
            restart_delay: Duration::from_secs(5),
        }
    }
}

/// What happened to one consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Stored,
    Duplicate,
    /// Undecodable payload.
    Poison,
    /// Decoded but failed validation.
    Invalid,
    /// Persistence failed; the message is dropped.
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Stored => "stored",
            Outcome::Duplicate => "duplicate",
            Outcome::Poison => "poison",
            Outcome::Invalid => "invalid",
            Outcome::Failed => "failed",
        }
    }
}

/// Decodes, validates and stores one message. Never fails: every problem is
/// logged and reported through the returned [`Outcome`].
pub async fn handle_message<R>(repository: &R, message: &StreamMessage) -> Outcome
where
    R: ClickRepository + ?Sized,
{
    let event = match ClickEvent::decode(&message.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(message_id = %message.id, error = %e, "Skipping malformed click event");
            return Outcome::Poison;
        }
    };

    if let Err(reason) = event.check() {
        warn!(
            message_id = %message.id,
            event_id = %event.event_id,
            ad_id = event.ad_id,
            reason,
            "Dropping invalid click event"
        );
        return Outcome::Invalid;
    }

    let event_id = event.event_id;
    let ad_id = event.ad_id;

    match repository.insert_click(NewClick::from(event)).await {
        Ok(InsertOutcome::Inserted) => {
            debug!(%event_id, ad_id, "Click stored");
            Outcome::Stored
        }
        Ok(InsertOutcome::Duplicate) => {
            debug!(%event_id, ad_id, "Click already stored, skipping redelivery");
            Outcome::Duplicate
        }
        Err(e) => {
            error!(%event_id, ad_id, error = %e, "Failed to store click, dropping");
            Outcome::Failed
        }
    }
}

/// Runs the consumer loop until `shutdown` flips to `true` or its sender is
/// dropped.
///
/// Read errors are logged and polling resumes after a short pause, except a
/// missing consumer group, which ends the run so the supervisor can
/// subscribe again. Every message in a batch is acknowledged after handling,
/// whatever its outcome.
pub async fn run_consumer<S, R>(
    mut source: S,
    repository: Arc<R>,
    mut shutdown: watch::Receiver<bool>,
    settings: WorkerSettings,
) where
    S: EventSource,
    R: ClickRepository + ?Sized,
{
    info!("Click consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            batch = source.next_batch() => batch,
        };

        let messages = match batch {
            Ok(messages) => messages,
            Err(TransportError::GroupMissing(reason)) => {
                error!(%reason, "Consumer group is gone, resubscribing");
                break;
            }
            Err(e) => {
                metrics::counter!("consumer_read_errors_total").increment(1);
                warn!(error = %e, "Failed to read click events, retrying");
                if wait_or_shutdown(&mut shutdown, settings.read_retry_delay).await {
                    break;
                }
                continue;
            }
        };

        if messages.is_empty() {
            continue;
        }

        let mut handled = Vec::with_capacity(messages.len());
        for message in messages {
            let outcome = handle_message(repository.as_ref(), &message).await;
            metrics::counter!("clicks_consumed_total", "outcome" => outcome.as_str()).increment(1);
            handled.push(message.id);
        }

        let count = handled.len();
        if let Err(e) = source.ack(handled).await {
            warn!(count, error = %e, "Failed to acknowledge click events");
        }
    }

    info!("Click consumer stopped");
}

/// Keeps a consumer running for the life of the process.
///
/// `subscribe` opens a fresh subscription for each run. A run that panics,
/// or a subscription that cannot be opened, is restarted after
/// `restart_delay`. Returns once `shutdown` is signalled.
pub async fn supervise_consumer<F, Fut, S, R>(
    subscribe: F,
    repository: Arc<R>,
    mut shutdown: watch::Receiver<bool>,
    settings: WorkerSettings,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<S, TransportError>>,
    S: EventSource + 'static,
    R: ClickRepository + 'static,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        let source = match subscribe().await {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, "Failed to subscribe to click stream");
                if wait_or_shutdown(&mut shutdown, settings.restart_delay).await {
                    break;
                }
                continue;
            }
        };

        let run = tokio::spawn(run_consumer(
            source,
            repository.clone(),
            shutdown.clone(),
            settings.clone(),
        ));

        match run.await {
            Ok(()) if *shutdown.borrow() => break,
            Ok(()) => warn!("Click consumer exited unexpectedly, restarting"),
            Err(e) => error!(error = %e, "Click consumer crashed, restarting"),
        }

        metrics::counter!("consumer_restarts_total").increment(1);
        if wait_or_shutdown(&mut shutdown, settings.restart_delay).await {
            break;
        }
    }
}

/// Sleeps for `delay`; returns `true` if shutdown was signalled meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messaging::MockEventSource;
    use crate::domain::repositories::MockClickRepository;
    use crate::error::AppError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn message(id: &str, event: &ClickEvent) -> StreamMessage {
        StreamMessage {
            id: id.to_string(),
            payload: event.encode().unwrap(),
        }
    }

    fn event(ad_id: i64) -> ClickEvent {
        ClickEvent::new(None, ad_id, "10.1.1.1", "curl/8.0", 4.0, 25.0, 1_700_000_000)
    }

    /// Stores clicks in memory, enforcing event identity uniqueness.
    #[derive(Default)]
    struct MemoryClicks {
        seen: Mutex<HashSet<Uuid>>,
        rows: Mutex<Vec<NewClick>>,
    }

    #[async_trait]
    impl ClickRepository for MemoryClicks {
        async fn insert_click(&self, new_click: NewClick) -> Result<InsertOutcome, AppError> {
            if !self.seen.lock().unwrap().insert(new_click.event_id) {
                return Ok(InsertOutcome::Duplicate);
            }
            self.rows.lock().unwrap().push(new_click);
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Replays scripted batches, then reports shutdown.
    struct ScriptedSource {
        batches: VecDeque<Result<Vec<StreamMessage>, TransportError>>,
        acked: Arc<Mutex<Vec<String>>>,
        done: Option<watch::Sender<bool>>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn next_batch(&mut self) -> Result<Vec<StreamMessage>, TransportError> {
            match self.batches.pop_front() {
                Some(batch) => batch,
                None => {
                    if let Some(done) = self.done.take() {
                        done.send(true).unwrap();
                    }
                    std::future::pending().await
                }
            }
        }

        async fn ack(&mut self, ids: Vec<String>) -> Result<(), TransportError> {
            self.acked.lock().unwrap().extend(ids);
            Ok(())
        }
    }

    async fn drive(
        batches: Vec<Result<Vec<StreamMessage>, TransportError>>,
        repository: Arc<MemoryClicks>,
    ) -> Vec<String> {
        let (tx, rx) = watch::channel(false);
        let acked = Arc::new(Mutex::new(Vec::new()));
        let source = ScriptedSource {
            batches: batches.into(),
            acked: acked.clone(),
            done: Some(tx),
        };

        run_consumer(source, repository, rx, WorkerSettings::default()).await;

        let acked = acked.lock().unwrap().clone();
        acked
    }

    #[tokio::test]
    async fn test_redelivery_yields_one_row() {
        let repo = Arc::new(MemoryClicks::default());
        let ev = event(42);

        let acked = drive(
            vec![
                Ok(vec![message("1-0", &ev)]),
                Ok(vec![message("1-0", &ev), message("2-0", &ev)]),
            ],
            repo.clone(),
        )
        .await;

        assert_eq!(repo.rows.lock().unwrap().len(), 1);
        assert_eq!(acked, vec!["1-0", "1-0", "2-0"]);
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_stop_loop() {
        let repo = Arc::new(MemoryClicks::default());
        let poison = StreamMessage {
            id: "1-0".to_string(),
            payload: b"{not json".to_vec(),
        };

        let acked = drive(
            vec![
                Ok(vec![poison, message("2-0", &event(7))]),
                Ok(vec![message("3-0", &event(8))]),
            ],
            repo.clone(),
        )
        .await;

        let stored: Vec<i64> = repo.rows.lock().unwrap().iter().map(|c| c.ad_id).collect();
        assert_eq!(stored, vec![7, 8]);
        assert_eq!(acked, vec!["1-0", "2-0", "3-0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_are_retried() {
        let repo = Arc::new(MemoryClicks::default());

        let acked = drive(
            vec![
                Err(TransportError::Connection("reset".into())),
                Err(TransportError::Timeout),
                Ok(vec![message("5-0", &event(3))]),
            ],
            repo.clone(),
        )
        .await;

        assert_eq!(repo.rows.lock().unwrap().len(), 1);
        assert_eq!(acked, vec!["5-0"]);
    }

    #[tokio::test]
    async fn test_invalid_event_is_dropped_without_insert() {
        let mut repo = MockClickRepository::new();
        repo.expect_insert_click().times(0);

        let zero_ad = ClickEvent {
            ad_id: 0,
            ..event(1)
        };
        let outcome = handle_message(&repo, &message("1-0", &zero_ad)).await;
        assert_eq!(outcome, Outcome::Invalid);

        let nil_id = ClickEvent {
            event_id: Uuid::nil(),
            ..event(1)
        };
        let outcome = handle_message(&repo, &message("2-0", &nil_id)).await;
        assert_eq!(outcome, Outcome::Invalid);
    }

    #[tokio::test]
    async fn test_store_failure_is_dropped() {
        let mut repo = MockClickRepository::new();
        repo.expect_insert_click()
            .times(1)
            .returning(|_| Err(AppError::internal("Database error", json!({}))));

        let outcome = handle_message(&repo, &message("1-0", &event(9))).await;
        assert_eq!(outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn test_stored_click_is_not_flagged_fraudulent() {
        let ev = event(11);
        let id = ev.event_id;

        let mut repo = MockClickRepository::new();
        repo.expect_insert_click()
            .withf(move |c: &NewClick| c.event_id == id && c.ad_id == 11 && !c.is_fraudulent)
            .times(1)
            .returning(|_| Ok(InsertOutcome::Inserted));

        assert_eq!(handle_message(&repo, &message("1-0", &ev)).await, Outcome::Stored);
    }

    #[tokio::test]
    async fn test_empty_batches_are_not_acked() {
        let mut source = MockEventSource::new();
        let (tx, rx) = watch::channel(false);
        let calls = AtomicUsize::new(0);

        source.expect_next_batch().returning(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                tx.send(true).unwrap();
            }
            Ok(vec![])
        });
        source.expect_ack().times(0);

        run_consumer(
            source,
            Arc::new(MockClickRepository::new()),
            rx,
            WorkerSettings::default(),
        )
        .await;
    }

    struct PanickingSource;

    #[async_trait]
    impl EventSource for PanickingSource {
        async fn next_batch(&mut self) -> Result<Vec<StreamMessage>, TransportError> {
            panic!("lost connection state");
        }

        async fn ack(&mut self, _ids: Vec<String>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Fails every read as if the group had been deleted.
    struct GrouplessSource;

    #[async_trait]
    impl EventSource for GrouplessSource {
        async fn next_batch(&mut self) -> Result<Vec<StreamMessage>, TransportError> {
            Err(TransportError::GroupMissing("NOGROUP No such consumer group".into()))
        }

        async fn ack(&mut self, _ids: Vec<String>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_group_ends_run() {
        let (_tx, rx) = watch::channel(false);

        let run = run_consumer(
            GrouplessSource,
            Arc::new(MockClickRepository::new()),
            rx,
            WorkerSettings::default(),
        );

        tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("consumer should stop on a missing group");
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_resubscribes_when_group_is_missing() {
        let (tx, rx) = watch::channel(false);
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let counter = subscriptions.clone();
        let tx = Arc::new(tx);
        let stopper = tx.clone();

        let subscribe = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let stopper = stopper.clone();
            async move {
                if n == 2 {
                    stopper.send(true).unwrap();
                }
                Ok::<_, TransportError>(GrouplessSource)
            }
        };

        supervise_consumer(
            subscribe,
            Arc::new(MemoryClicks::default()),
            rx,
            WorkerSettings::default(),
        )
        .await;

        assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_restarts_crashed_consumer() {
        let (tx, rx) = watch::channel(false);
        let subscriptions = Arc::new(AtomicUsize::new(0));
        let counter = subscriptions.clone();
        let tx = Arc::new(tx);
        let stopper = tx.clone();

        let subscribe = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let stopper = stopper.clone();
            async move {
                if n == 2 {
                    stopper.send(true).unwrap();
                }
                Ok::<_, TransportError>(PanickingSource)
            }
        };

        supervise_consumer(
            subscribe,
            Arc::new(MemoryClicks::default()),
            rx,
            WorkerSettings::default(),
        )
        .await;

        assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
        drop(tx);
    }
}
