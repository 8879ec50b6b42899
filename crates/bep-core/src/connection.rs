//! The async `Connection` driver: owns the transport, runs the reader,
//! writer, and ping/timeout tasks described in §5, and exposes the
//! embedder-facing interface from §6.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bep_model::DeviceID;
use bep_proto::{
    ClusterConfig, CompressionPolicy, DownloadProgress, ErrorCode, Index, IndexUpdate, Message,
    Ping, Request, Response,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::env::Environment;
use crate::error::ConnectionError;
use crate::model::Model;
use crate::session::{Session, SessionAction};

/// Default interval between Pings when the connection has been otherwise
/// idle (§6: `PingSendInterval = 90s`).
pub const DEFAULT_PING_SEND_INTERVAL: Duration = Duration::from_secs(90);
/// Default window of silence that triggers a `Timeout` close (§6:
/// `ReceiveTimeout = 300s`).
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(300);
/// Default bound on how long `close` waits for the writer to drain before
/// forcing the transport down.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// See [`DEFAULT_PING_SEND_INTERVAL`].
    pub ping_send_interval: Duration,
    /// See [`DEFAULT_RECEIVE_TIMEOUT`].
    pub receive_timeout: Duration,
    /// See [`DEFAULT_CLOSE_TIMEOUT`].
    pub close_timeout: Duration,
    /// Per-connection compression policy.
    pub compression_policy: CompressionPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_send_interval: DEFAULT_PING_SEND_INTERVAL,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            compression_policy: CompressionPolicy::MetadataOnly,
        }
    }
}

/// A snapshot of byte counters and last-activity time, per §6's
/// `Statistics() → {at, in_bytes_total, out_bytes_total}`.
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    /// Unix timestamp, seconds, when this snapshot was taken.
    pub at_unix_secs: u64,
    /// Total bytes read from the transport so far.
    pub in_bytes_total: u64,
    /// Total bytes written to the transport so far.
    pub out_bytes_total: u64,
}

struct Counters {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    last_read_unix_secs: AtomicU64,
    last_write_unix_secs: AtomicU64,
}

impl Counters {
    fn new(now: u64) -> Self {
        Self {
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            last_read_unix_secs: AtomicU64::new(now),
            last_write_unix_secs: AtomicU64::new(now),
        }
    }
}

struct OutboundItem {
    bytes: Vec<u8>,
    done: Option<oneshot::Sender<()>>,
}

type PendingResponses = Arc<std::sync::Mutex<HashMap<i32, oneshot::Sender<Result<Vec<u8>, ConnectionError>>>>>;

/// Shared state reachable from the reader, writer, ping tasks, and every
/// clone of the `Connection` handle.
struct Inner<E: Environment> {
    device_id: DeviceID,
    env: E,
    config: ConnectionConfig,
    counters: Counters,
    closed: AtomicBool,
    close_reason: std::sync::Mutex<Option<String>>,
    next_request_id: AtomicI32,
    pending_responses: PendingResponses,
    outbound_tx: mpsc::UnboundedSender<OutboundItem>,
    index_lock: AsyncMutex<()>,
    /// Abort handles for the reader and writer tasks, so `close` can cut a
    /// socket read/write short once it's been blocked for `close_timeout`.
    io_task_aborts: std::sync::Mutex<Vec<tokio::task::AbortHandle>>,
}

/// A single peer connection: the embedder-facing handle from §6. Cheap to
/// clone; clones share the same underlying transport and tasks.
#[derive(Clone)]
pub struct Connection<E: Environment> {
    inner: Arc<Inner<E>>,
}

impl<E: Environment> Connection<E> {
    /// Start a connection over an already-established, already-Hello'd
    /// transport, spawning the reader, writer, and ping/timeout tasks.
    pub fn start<R, W, M>(
        device_id: DeviceID,
        env: E,
        config: ConnectionConfig,
        reader: R,
        writer: W,
        model: Arc<M>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        M: Model,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundItem>();
        let now = env.unix_timestamp_secs();

        let inner = Arc::new(Inner {
            device_id,
            env: env.clone(),
            config,
            counters: Counters::new(now),
            closed: AtomicBool::new(false),
            close_reason: std::sync::Mutex::new(None),
            next_request_id: AtomicI32::new(0),
            pending_responses: Arc::new(std::sync::Mutex::new(HashMap::new())),
            outbound_tx,
            index_lock: AsyncMutex::new(()),
            io_task_aborts: std::sync::Mutex::new(Vec::new()),
        });

        let connection = Self { inner };

        let writer_handle = tokio::spawn(writer_task(connection.clone(), writer, outbound_rx));
        let reader_handle = tokio::spawn(reader_task(connection.clone(), reader, Arc::clone(&model)));
        tokio::spawn(ping_send_task(connection.clone()));
        tokio::spawn(ping_receive_task(connection.clone(), model));

        {
            let mut aborts = connection
                .inner
                .io_task_aborts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            aborts.push(writer_handle.abort_handle());
            aborts.push(reader_handle.abort_handle());
        }

        connection
    }

    /// The peer's device identity.
    #[must_use]
    pub fn id(&self) -> DeviceID {
        self.inner.device_id
    }

    /// Whether `close` has been called (locally or by the peer).
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Current byte/activity counters.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            at_unix_secs: self.inner.env.unix_timestamp_secs(),
            in_bytes_total: self.inner.counters.bytes_in.load(Ordering::Relaxed),
            out_bytes_total: self.inner.counters.bytes_out.load(Ordering::Relaxed),
        }
    }

    /// Send a ClusterConfig. Must be the very first outbound message.
    pub async fn cluster_config(&self, cc: ClusterConfig) -> Result<(), ConnectionError> {
        self.enqueue(Message::ClusterConfig(cc)).await
    }

    /// Send a full Index snapshot for `folder`, serialized against any
    /// concurrent `index_update` call on this connection.
    pub async fn index(&self, folder: String, files: Vec<bep_model::FileInfo>) -> Result<(), ConnectionError> {
        let _guard = self.inner.index_lock.lock().await;
        self.enqueue(Message::Index(Index { folder, files })).await
    }

    /// Send an IndexUpdate delta for `folder`, serialized against any
    /// concurrent `index` call on this connection.
    pub async fn index_update(
        &self,
        folder: String,
        files: Vec<bep_model::FileInfo>,
    ) -> Result<(), ConnectionError> {
        let _guard = self.inner.index_lock.lock().await;
        self.enqueue(Message::IndexUpdate(IndexUpdate { folder, files })).await
    }

    /// Send download progress updates for `folder`.
    pub async fn download_progress(
        &self,
        folder: String,
        updates: Vec<bep_proto::FileDownloadProgressUpdate>,
    ) -> Result<(), ConnectionError> {
        self.enqueue(Message::DownloadProgress(DownloadProgress { folder, updates })).await
    }

    /// Send a Ping.
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        self.enqueue(Message::Ping(Ping)).await
    }

    /// Issue a block Request and await its Response, correlated by a
    /// freshly-generated `id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        folder: String,
        name: String,
        block_no: i32,
        offset: i64,
        size: i32,
        hash: Vec<u8>,
        weak_hash: u32,
        from_temporary: bool,
    ) -> Result<Vec<u8>, ConnectionError> {
        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .inner
                .pending_responses
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.insert(id, tx);
        }

        let request = Request { id, folder, name, block_no, offset, size, hash, weak_hash, from_temporary };
        if let Err(err) = self.enqueue(Message::Request(request)).await {
            let mut pending = self
                .inner
                .pending_responses
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.remove(&id);
            return Err(err);
        }

        rx.await.unwrap_or(Err(ConnectionError::Cancelled))
    }

    /// Idempotently close the connection: stops the outbound queue,
    /// resolves every pending request with `Closed`, and notifies the
    /// Model once. Safe to call more than once or from more than one task.
    ///
    /// Also arms a `close_timeout` watchdog that forcibly aborts the reader
    /// and writer tasks if they're still blocked on the socket once it
    /// elapses, so a dead peer holding a half-open connection can't
    /// deadlock shutdown indefinitely.
    pub async fn close<M: Model>(&self, reason: impl Into<String>, model: &M) {
        let reason = reason.into();
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut stored = self
                .inner
                .close_reason
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *stored = Some(reason.clone());
        }

        let pending: Vec<_> = {
            let mut map = self
                .inner
                .pending_responses
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            map.drain().collect()
        };
        for (_, tx) in pending {
            let _ = tx.send(Err(ConnectionError::Closed { reason: reason.clone() }));
        }

        self.arm_close_timeout();

        info!(device = %self.inner.device_id, %reason, "connection closing");
        model.closed(self.inner.device_id, Some(ConnectionError::Closed { reason })).await;
    }

    /// Spawn a watchdog that aborts the reader/writer tasks once
    /// `close_timeout` elapses, unblocking a socket read or write stuck
    /// against a peer that never acknowledges the close.
    fn arm_close_timeout(&self) {
        let aborts: Vec<_> = self
            .inner
            .io_task_aborts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let env = self.inner.env.clone();
        let close_timeout = self.inner.config.close_timeout;
        let device_id = self.inner.device_id;
        tokio::spawn(async move {
            env.sleep(close_timeout).await;
            let stuck = aborts.iter().filter(|h| !h.is_finished()).count();
            if stuck > 0 {
                debug!(device = %device_id, stuck, "close timeout elapsed, aborting stuck io tasks");
            }
            for handle in aborts {
                handle.abort();
            }
        });
    }

    async fn enqueue(&self, message: Message) -> Result<(), ConnectionError> {
        if self.closed() {
            return Err(ConnectionError::Closed {
                reason: self
                    .inner
                    .close_reason
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone()
                    .unwrap_or_default(),
            });
        }

        let bytes = bep_proto::encode(&message, self.inner.config.compression_policy)?;
        let (done_tx, done_rx) = oneshot::channel();
        self.inner
            .outbound_tx
            .send(OutboundItem { bytes, done: Some(done_tx) })
            .map_err(|_| ConnectionError::Closed { reason: "outbound queue closed".to_string() })?;
        let _ = done_rx.await;
        Ok(())
    }
}

async fn writer_task<E: Environment, W: AsyncWrite + Unpin + Send + 'static>(
    connection: Connection<E>,
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundItem>,
) {
    while let Some(item) = outbound_rx.recv().await {
        if let Err(err) = writer.write_all(&item.bytes).await {
            warn!(error = %err, "transport write failed");
            break;
        }
        connection.inner.counters.bytes_out.fetch_add(item.bytes.len() as u64, Ordering::Relaxed);
        connection
            .inner
            .counters
            .last_write_unix_secs
            .store(connection.inner.env.unix_timestamp_secs(), Ordering::Relaxed);
        if let Some(done) = item.done {
            let _ = done.send(());
        }
    }
}

async fn reader_task<E: Environment, R: AsyncRead + Unpin + Send + 'static, M: Model>(
    connection: Connection<E>,
    mut reader: R,
    model: Arc<M>,
) {
    let mut session = Session::new();
    let mut buf: Vec<u8> = Vec::with_capacity(8192);
    let mut read_chunk = [0u8; 8192];

    loop {
        match bep_proto::decode(&buf) {
            Ok(bep_proto::Decoded::Message { message, consumed }) => {
                buf.drain(..consumed);
                if !handle_inbound(&connection, &mut session, message, &model).await {
                    break;
                }
                continue;
            },
            Ok(bep_proto::Decoded::Skipped { consumed }) => {
                buf.drain(..consumed);
                continue;
            },
            Err(bep_proto::ProtocolError::Truncated { .. }) => {},
            Err(err) => {
                connection.close(format!("protocol error: {err}"), model.as_ref()).await;
                break;
            },
        }

        match reader.read(&mut read_chunk).await {
            Ok(0) => {
                connection.close("transport closed by peer", model.as_ref()).await;
                break;
            },
            Ok(n) => {
                buf.extend_from_slice(&read_chunk[..n]);
                connection.inner.counters.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
                connection
                    .inner
                    .counters
                    .last_read_unix_secs
                    .store(connection.inner.env.unix_timestamp_secs(), Ordering::Relaxed);
            },
            Err(err) => {
                connection.close(format!("transport read failed: {err}"), model.as_ref()).await;
                break;
            },
        }
    }
}

async fn handle_inbound<E: Environment, M: Model>(
    connection: &Connection<E>,
    session: &mut Session,
    message: Message,
    model: &Arc<M>,
) -> bool {
    let device = connection.id();
    let actions = match session.handle_message(message) {
        Ok(actions) => actions,
        Err(err) => {
            connection.close(err.to_string(), model.as_ref()).await;
            return false;
        },
    };

    for action in actions {
        match action {
            SessionAction::NoteActivity => {},
            SessionAction::DeliverClusterConfig(cc) => {
                if let Err(err) = model.cluster_config(device, cc).await {
                    connection.close(err.to_string(), model.as_ref()).await;
                    return false;
                }
            },
            SessionAction::DeliverIndex(index) => {
                if let Err(err) = model.index(device, &index.folder, index.files).await {
                    connection.close(err.to_string(), model.as_ref()).await;
                    return false;
                }
            },
            SessionAction::DeliverIndexUpdate(update) => {
                if let Err(err) = model.index_update(device, &update.folder, update.files).await {
                    connection.close(err.to_string(), model.as_ref()).await;
                    return false;
                }
            },
            SessionAction::DeliverDownloadProgress(progress) => {
                if let Err(err) =
                    model.download_progress(device, &progress.folder, progress.updates).await
                {
                    connection.close(err.to_string(), model.as_ref()).await;
                    return false;
                }
            },
            SessionAction::SpawnRequestHandler(request) => {
                tokio::spawn(handle_request(connection.clone(), model.clone(), device, request));
            },
            SessionAction::ResolveResponse(response) => {
                let mut pending = connection
                    .inner
                    .pending_responses
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(tx) = pending.remove(&response.id) {
                    let result = match response.code {
                        ErrorCode::NoError => Ok(response.data),
                        other => Err(ConnectionError::from(crate::model::RequestFailure::from(other))),
                    };
                    let _ = tx.send(result);
                }
            },
            SessionAction::Close { reason, .. } => {
                connection.close(reason, model.as_ref()).await;
                return false;
            },
        }
    }

    true
}

async fn handle_request<E: Environment, M: Model>(
    connection: Connection<E>,
    model: Arc<M>,
    device: DeviceID,
    request: Request,
) {
    let result = model
        .request(
            device,
            &request.folder,
            &request.name,
            request.block_no,
            request.offset,
            request.size,
            &request.hash,
            request.weak_hash,
            request.from_temporary,
        )
        .await;

    let response = match result {
        Ok(data) => Response { id: request.id, data, code: ErrorCode::NoError },
        Err(failure) => Response { id: request.id, data: Vec::new(), code: failure.into() },
    };

    debug!(id = request.id, "responding to request");
    let _ = connection.enqueue(Message::Response(response)).await;
}

async fn ping_send_task<E: Environment>(connection: Connection<E>) {
    let interval = connection.inner.config.ping_send_interval / 2;
    loop {
        connection.inner.env.sleep(interval).await;
        if connection.closed() {
            break;
        }

        let last_write = connection.inner.counters.last_write_unix_secs.load(Ordering::Relaxed);
        let now = connection.inner.env.unix_timestamp_secs();
        if now.saturating_sub(last_write) >= interval.as_secs() {
            if connection.ping().await.is_err() {
                break;
            }
        }
    }
}

async fn ping_receive_task<E: Environment, M: Model>(connection: Connection<E>, model: Arc<M>) {
    let interval = connection.inner.config.receive_timeout / 2;
    loop {
        connection.inner.env.sleep(interval).await;
        if connection.closed() {
            break;
        }

        let last_read = connection.inner.counters.last_read_unix_secs.load(Ordering::Relaxed);
        let now = connection.inner.env.unix_timestamp_secs();
        let elapsed = now.saturating_sub(last_read);
        if elapsed >= connection.inner.config.receive_timeout.as_secs() {
            connection.close(format!("receive timeout after {elapsed}s"), model.as_ref()).await;
            break;
        }
    }
}

impl From<ErrorCode> for crate::model::RequestFailure {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NoSuchFile => Self::NoSuchFile,
            ErrorCode::InvalidFile => Self::InvalidFile,
            ErrorCode::NoError | ErrorCode::Generic => Self::Generic,
        }
    }
}

impl From<crate::model::RequestFailure> for ConnectionError {
    fn from(failure: crate::model::RequestFailure) -> Self {
        Self::Transport(failure.to_string())
    }
}
