//! Framed connection over one duplex transport
//! Enforces single-reader / single-writer discipline, size-bounded reads,
//! read deadlines, and abort semantics for a single session.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use log::debug;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{HubOptions, SerializerOptions};
use crate::core::buffer::BufferPool;
use crate::core::transport::{Frame, TransportSink, TransportStream};
use crate::error::{HubError, Result};

/// Kind of a received logical message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A complete application payload
    Data,
    /// Peer-initiated closure; the connection is marked aborted
    Close,
}

/// Byte counters, populated only when statistics are enabled
#[derive(Debug, Default)]
pub struct ConnectionStats {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl ConnectionStats {
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }
}

/// Represents one accepted duplex session.
///
/// At most one read and at most one write is in flight at any time; the two
/// use distinct locks, so sends never block receives. Once aborted, all I/O
/// fails fast with [`HubError::Aborted`] without touching the transport.
pub struct Connection {
    id: StdRwLock<Uuid>,
    finalized: AtomicBool,
    aborted: AtomicBool,
    reader: Mutex<Box<dyn TransportStream>>,
    writer: Mutex<Box<dyn TransportSink>>,
    /// Group names this connection currently belongs to. Locking this set is
    /// the per-connection group-mutation lock: every compound membership
    /// update holds it across both indexes.
    pub(crate) groups: Mutex<HashSet<String>>,
    properties: StdRwLock<HashMap<String, serde_json::Value>>,
    stats: Option<ConnectionStats>,
    pool: Arc<BufferPool>,
    max_message_size: usize,
    read_message_timeout: Duration,
    serializer: SerializerOptions,
}

impl Connection {
    /// Wrap a split duplex transport with a freshly generated identity
    pub fn new(
        reader: Box<dyn TransportStream>,
        writer: Box<dyn TransportSink>,
        options: &HubOptions,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), reader, writer, options, pool)
    }

    /// Wrap a split duplex transport with a caller-supplied identity
    pub fn with_id(
        id: Uuid,
        reader: Box<dyn TransportStream>,
        writer: Box<dyn TransportSink>,
        options: &HubOptions,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            id: StdRwLock::new(id),
            finalized: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            groups: Mutex::new(HashSet::new()),
            properties: StdRwLock::new(HashMap::new()),
            stats: options.enable_statistics.then(ConnectionStats::default),
            pool,
            max_message_size: options.max_message_size,
            read_message_timeout: options.read_message_timeout,
            serializer: options.serializer.clone(),
        }
    }

    /// The connection's current identity
    pub fn id(&self) -> Uuid {
        *self.id.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the identity. Allowed only before [`finalize`](Self::finalize).
    pub fn set_id(&self, id: Uuid) -> Result<()> {
        if self.is_finalized() {
            return Err(HubError::ConnectionFinalized);
        }
        *self.id.write().unwrap_or_else(|e| e.into_inner()) = id;
        Ok(())
    }

    /// Freeze the identity; idempotent
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    /// Mark the connection unusable. Never blocks, safe to call from any
    /// task while a read or write is in flight; subsequent send and receive
    /// calls fail fast with [`HubError::Aborted`].
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Write one complete logical message.
    ///
    /// Concurrent callers serialize on the write lock; the peer never
    /// observes interleaved partial writes from different calls.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        if self.is_aborted() {
            return Err(HubError::Aborted);
        }
        let mut writer = self.writer.lock().await;
        // Re-check after contending for the lock: an abort during the wait
        // must fail this call before any transport I/O happens.
        if self.is_aborted() {
            return Err(HubError::Aborted);
        }
        writer.send(payload).await?;
        if let Some(stats) = &self.stats {
            stats.bytes_out.fetch_add(payload.len() as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Serialize `value` as JSON and send it as one logical message
    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = if self.serializer.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
        .map_err(|e| HubError::MessageParseError(e.to_string()))?;
        self.send(&payload).await
    }

    /// Receive one logical message using the configured read timeout
    pub async fn receive(&self) -> Result<(Vec<u8>, MessageKind)> {
        self.receive_timeout(self.read_message_timeout).await
    }

    /// Receive one logical message, assembling transport frames until the
    /// peer signals end-of-message.
    ///
    /// Fails with [`HubError::MessageTooLarge`] if the accumulated size would
    /// exceed the configured maximum, and with [`HubError::Timeout`] if no
    /// complete message arrives within `timeout`. A timed-out receive
    /// releases the read lock and leaves the connection usable; the caller
    /// may retry. Peer closure yields [`MessageKind::Close`] and marks the
    /// connection aborted.
    pub async fn receive_timeout(&self, timeout: Duration) -> Result<(Vec<u8>, MessageKind)> {
        if self.is_aborted() {
            return Err(HubError::Aborted);
        }
        // Cancellation drops the in-flight future: the read lock guard and
        // the pooled buffer are both released before Timeout surfaces.
        match tokio::time::timeout(timeout, self.receive_inner()).await {
            Ok(result) => result,
            Err(_) => Err(HubError::Timeout),
        }
    }

    async fn receive_inner(&self) -> Result<(Vec<u8>, MessageKind)> {
        let mut reader = self.reader.lock().await;
        if self.is_aborted() {
            return Err(HubError::Aborted);
        }
        let mut buffer = self.pool.acquire();
        loop {
            match reader.next_frame().await? {
                Frame::Data { payload, fin } => {
                    let accumulated = buffer.len() + payload.len();
                    if accumulated > self.max_message_size {
                        return Err(HubError::MessageTooLarge(accumulated));
                    }
                    buffer.extend_from_slice(&payload);
                    if fin {
                        if let Some(stats) = &self.stats {
                            stats
                                .bytes_in
                                .fetch_add(buffer.len() as u64, Ordering::Relaxed);
                        }
                        return Ok((buffer.to_vec(), MessageKind::Data));
                    }
                }
                Frame::Close => {
                    debug!("peer closed connection {}", self.id());
                    self.abort();
                    return Ok((Vec::new(), MessageKind::Close));
                }
            }
        }
    }

    /// Signal closure to the peer; best effort
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.close().await;
    }

    /// Store a handler-defined property for this session
    pub fn set_property(&self, key: &str, value: serde_json::Value) {
        self.properties
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    /// Look up a handler-defined property
    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Names of the groups this connection currently belongs to
    pub async fn group_names(&self) -> Vec<String> {
        self.groups.lock().await.iter().cloned().collect()
    }

    /// Byte counters; `None` unless statistics were enabled in the options
    pub fn stats(&self) -> Option<&ConnectionStats> {
        self.stats.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("aborted", &self.is_aborted())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
