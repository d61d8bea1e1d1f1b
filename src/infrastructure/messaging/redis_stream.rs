//! Redis Streams producer and consumer-group source.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::messaging::{EventSource, EventTransport, StreamMessage, TransportError};

/// Entry field holding the message key.
pub const KEY_FIELD: &str = "key";
/// Entry field holding the encoded envelope.
pub const PAYLOAD_FIELD: &str = "payload";

pub(crate) fn transport_error(e: RedisError) -> TransportError {
    if e.code() == Some("NOGROUP") {
        TransportError::GroupMissing(e.to_string())
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        TransportError::Connection(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Operation(e.to_string())
    }
}

/// Opens a managed connection and verifies it with a PING.
///
/// `response_timeout` must exceed any server-side `BLOCK` issued over the
/// connection.
///
/// # Errors
///
/// Returns [`TransportError::Connection`] if the URL is invalid, the
/// connection cannot be established, or the PING fails.
pub async fn connect(
    redis_url: &str,
    response_timeout: Duration,
) -> Result<ConnectionManager, TransportError> {
    let client = Client::open(redis_url).map_err(|e| {
        TransportError::Connection(format!("Failed to create Redis client: {}", e))
    })?;

    let config = ConnectionManagerConfig::new().set_response_timeout(Some(response_timeout));
    let manager = ConnectionManager::new_with_config(client, config)
        .await
        .map_err(|e| TransportError::Connection(format!("Failed to connect to Redis: {}", e)))?;

    let mut test_conn = manager.clone();
    test_conn
        .ping::<()>()
        .await
        .map_err(|e| TransportError::Connection(format!("Redis PING failed: {}", e)))?;

    Ok(manager)
}

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub stream: String,
    /// Approximate stream length kept by `XADD MAXLEN ~`.
    pub max_len: usize,
    /// Messages per pipelined flush.
    pub batch_size: usize,
    /// Longest a queued message waits for its batch to fill.
    pub batch_window: Duration,
    /// Bound on draining queued messages during [`RedisStreamProducer::close`].
    pub close_timeout: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            stream: "click-events".to_string(),
            max_len: 1_000_000,
            batch_size: 100,
            batch_window: Duration::from_millis(100),
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// Appends batches of keyed entries to a stream.
///
/// Implemented for [`ConnectionManager`]; the producer is generic over it so
/// batching and shutdown can be exercised without a server.
#[async_trait]
pub trait StreamWriter: Clone + Send + Sync + 'static {
    /// Appends every entry in one round trip, trimming the stream to roughly
    /// `max_len` entries.
    async fn append(
        &mut self,
        stream: &str,
        max_len: usize,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), TransportError>;

    /// Whether the server answers a PING.
    async fn is_reachable(&mut self) -> bool;
}

#[async_trait]
impl StreamWriter for ConnectionManager {
    async fn append(
        &mut self,
        stream: &str,
        max_len: usize,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), TransportError> {
        let mut pipe = redis::pipe();
        for (key, payload) in entries {
            pipe.cmd("XADD")
                .arg(stream)
                .arg("MAXLEN")
                .arg("~")
                .arg(max_len)
                .arg("*")
                .arg(KEY_FIELD)
                .arg(key)
                .arg(PAYLOAD_FIELD)
                .arg(payload.as_slice());
        }

        pipe.query_async::<Vec<String>>(self)
            .await
            .map(|_| ())
            .map_err(transport_error)
    }

    async fn is_reachable(&mut self) -> bool {
        self.ping::<()>().await.is_ok()
    }
}

struct Pending {
    key: String,
    payload: Vec<u8>,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// Batching stream producer.
///
/// `send` queues the message for a background flusher and waits for the
/// flush that carries it. The flusher writes up to `batch_size` messages, or
/// whatever arrived within `batch_window`, as one pipelined round trip and
/// reports the shared outcome to every sender in the batch.
pub struct RedisStreamProducer<W = ConnectionManager> {
    queue: Mutex<Option<mpsc::Sender<Pending>>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    writer: W,
    settings: ProducerSettings,
}

impl<W: StreamWriter> RedisStreamProducer<W> {
    /// Starts the background flusher. Must be called within a Tokio runtime.
    pub fn new(writer: W, settings: ProducerSettings) -> Self {
        let batch_size = settings.batch_size.max(1);
        let (tx, rx) = mpsc::channel(batch_size * 4);

        let flusher = tokio::spawn(run_flusher(rx, writer.clone(), settings.clone()));

        info!(
            stream = %settings.stream,
            batch_size,
            batch_window_ms = settings.batch_window.as_millis() as u64,
            "Click producer started"
        );

        Self {
            queue: Mutex::new(Some(tx)),
            flusher: Mutex::new(Some(flusher)),
            writer,
            settings,
        }
    }

    /// Stops accepting messages and flushes everything already queued.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] if the producer was already closed
    /// - [`TransportError::Timeout`] if the drain exceeded the close timeout
    pub async fn close(&self) -> Result<(), TransportError> {
        let Some(queue) = lock(&self.queue).take() else {
            return Err(TransportError::Closed);
        };
        drop(queue);

        let Some(flusher) = lock(&self.flusher).take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.settings.close_timeout, flusher).await {
            Ok(Ok(())) => {
                info!(stream = %self.settings.stream, "Click producer closed");
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::Operation(format!(
                "producer flusher failed: {}",
                e
            ))),
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.close_timeout.as_secs(),
                    "Timed out flushing queued click events"
                );
                Err(TransportError::Timeout)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl<W: StreamWriter> EventTransport for RedisStreamProducer<W> {
    async fn send(&self, key: String, payload: Vec<u8>) -> Result<(), TransportError> {
        let queue = lock(&self.queue).clone().ok_or(TransportError::Closed)?;

        let (done, ack) = oneshot::channel();
        queue
            .send(Pending { key, payload, done })
            .await
            .map_err(|_| TransportError::Closed)?;
        // A held sender would keep `close` waiting for the batch window.
        drop(queue);

        ack.await
            .unwrap_or_else(|_| Err(TransportError::Operation("batch dropped before flush".into())))
    }

    async fn health_check(&self) -> bool {
        self.writer.clone().is_reachable().await
    }
}

async fn run_flusher<W: StreamWriter>(
    mut rx: mpsc::Receiver<Pending>,
    mut writer: W,
    settings: ProducerSettings,
) {
    let batch_size = settings.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(first) = rx.recv().await {
        batch.push(first);

        let window = tokio::time::sleep(settings.batch_window);
        tokio::pin!(window);

        while batch.len() < batch_size {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(pending) => batch.push(pending),
                    None => break,
                },
                _ = &mut window => break,
            }
        }

        flush(&mut writer, &settings, &mut batch).await;
    }

    debug!(stream = %settings.stream, "Click producer flusher drained");
}

async fn flush<W: StreamWriter>(
    writer: &mut W,
    settings: &ProducerSettings,
    batch: &mut Vec<Pending>,
) {
    let size = batch.len();
    let (entries, waiters): (Vec<_>, Vec<_>) = batch
        .drain(..)
        .map(|pending| ((pending.key, pending.payload), pending.done))
        .unzip();

    let outcome = writer
        .append(&settings.stream, settings.max_len, &entries)
        .await;

    match &outcome {
        Ok(()) => {
            metrics::counter!("stream_entries_written_total").increment(size as u64);
            debug!(stream = %settings.stream, size, "Flushed click batch");
        }
        Err(e) => error!(stream = %settings.stream, size, error = %e, "Failed to flush click batch"),
    }

    for done in waiters {
        let _ = done.send(outcome.clone());
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub stream: String,
    pub group: String,
    /// Consumer name within the group.
    pub consumer: String,
    /// Maximum entries per read.
    pub batch_size: usize,
    /// Server-side wait when nothing is available.
    pub block: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            stream: "click-events".to_string(),
            group: "click-consumers".to_string(),
            consumer: "clickstream".to_string(),
            batch_size: 100,
            block: Duration::from_millis(5000),
        }
    }
}

/// Consumer-group subscription over a stream.
///
/// The first reads after subscribing drain entries already delivered to this
/// consumer but never acknowledged (from an earlier crash), then the
/// subscription switches to new entries.
pub struct RedisStreamConsumer {
    conn: ConnectionManager,
    settings: ConsumerSettings,
    backlog: bool,
}

impl RedisStreamConsumer {
    /// Joins the consumer group, creating it (and the stream) when missing.
    ///
    /// A newly created group starts at the latest entry.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the group cannot be created.
    pub async fn subscribe(
        mut conn: ConnectionManager,
        settings: ConsumerSettings,
    ) -> Result<Self, TransportError> {
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(&settings.stream, &settings.group, "$")
            .await;

        match created {
            Ok(()) => info!(
                stream = %settings.stream,
                group = %settings.group,
                "Created consumer group"
            ),
            Err(e) if e.code() == Some("BUSYGROUP") => debug!(
                stream = %settings.stream,
                group = %settings.group,
                "Consumer group already exists"
            ),
            Err(e) => return Err(transport_error(e)),
        }

        info!(
            stream = %settings.stream,
            group = %settings.group,
            consumer = %settings.consumer,
            "Subscribed to click stream"
        );

        Ok(Self {
            conn,
            settings,
            backlog: true,
        })
    }

    async fn read(&mut self, from: &str) -> Result<Vec<StreamMessage>, TransportError> {
        let mut options = StreamReadOptions::default()
            .group(&self.settings.group, &self.settings.consumer)
            .count(self.settings.batch_size);
        if from == ">" {
            options = options.block(self.settings.block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.settings.stream], &[from], &options)
            .await
            .map_err(transport_error)?;

        let messages = reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .map(|entry| StreamMessage {
                payload: entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_default(),
                id: entry.id,
            })
            .collect();

        Ok(messages)
    }
}

#[async_trait]
impl EventSource for RedisStreamConsumer {
    async fn next_batch(&mut self) -> Result<Vec<StreamMessage>, TransportError> {
        if self.backlog {
            let pending = self.read("0").await?;
            if !pending.is_empty() {
                debug!(count = pending.len(), "Re-reading unacknowledged click events");
                return Ok(pending);
            }
            self.backlog = false;
        }

        self.read(">").await
    }

    async fn ack(&mut self, ids: Vec<String>) -> Result<(), TransportError> {
        if ids.is_empty() {
            return Ok(());
        }

        let _: i64 = self
            .conn
            .xack(&self.settings.stream, &self.settings.group, &ids)
            .await
            .map_err(transport_error)?;
        Ok(())
    }
}

/// Length and backlog of a stream, as reported by the admin tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub length: usize,
    /// Delivered but unacknowledged entries; `None` when the group is missing.
    pub pending: Option<usize>,
}

pub async fn stream_info(
    conn: &mut ConnectionManager,
    stream: &str,
    group: &str,
) -> Result<StreamInfo, TransportError> {
    let length: usize = conn.xlen(stream).await.map_err(transport_error)?;

    let pending = match conn
        .xpending::<_, _, redis::streams::StreamPendingReply>(stream, group)
        .await
    {
        Ok(reply) => Some(reply.count()),
        Err(e) if e.code() == Some("NOGROUP") => None,
        Err(e) => return Err(transport_error(e)),
    };

    Ok(StreamInfo { length, pending })
}
