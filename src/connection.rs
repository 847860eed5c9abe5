//! Connection manager - owns the transport stream to one node.
//!
//! ```text
//!                 connect()            ok
//! DISCONNECTED ─────────────► CONNECTING ─────► CONNECTED
//!      ▲                          │                 │
//!      │          failed/timeout  │                 │ disconnect() / peer close /
//!      └──────────────────────────┴─────────────────┘ transport error / abort()
//! ```
//!
//! Reads happen on a spawned task that forwards raw chunks as [`TransportEvent`]s; the
//! owner pulls them with [`ConnectionManager::next_event`] and feeds them back through
//! [`ConnectionManager::handle_event`]. Each connection gets a new generation number so
//! events from a torn-down stream are never mistaken for the current one.
//!
//! Writes go through a bounded queue to a spawned writer task:
//!
//! ```text
//! send() ─► mpsc::Sender<Bytes> ─► writer task ─► stream
//! ```
//!
//! [`ConnectionManager::send`] never waits on the stream. When the node stops reading
//! and the queue fills up, sends fail with `SendQueueFull` while the owner stays free
//! to disconnect. A failed write comes back as a [`TransportEvent::Error`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{
    ConnectorConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_READ_CHUNK_SIZE,
    DEFAULT_WRITE_QUEUE_CAPACITY,
};
use crate::error::{ConnectorError, Result};
use crate::handler::ObserverSet;
use crate::transport::{BoxedStream, Transport};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Something the read task observed on the stream.
#[derive(Debug)]
pub enum TransportEvent {
    /// Bytes read from the node.
    Data(Bytes),
    /// Node closed the stream.
    Closed,
    /// Read or write failed.
    Error(std::io::Error),
}

/// Most queued messages the writer task coalesces before one flush.
const MAX_WRITE_BATCH: usize = 16;

/// Owns the stream, its reader and writer tasks, and the last-known address.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    port: u16,
    connect_timeout: Duration,
    read_chunk_size: usize,
    write_queue_capacity: usize,
    state: ConnectionState,
    address: Option<String>,
    outbound: Option<mpsc::Sender<Bytes>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
}

impl ConnectionManager {
    /// Create a manager with default port and timeouts.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            state: ConnectionState::Disconnected,
            address: None,
            outbound: None,
            reader: None,
            writer: None,
            generation: 0,
            events_tx,
            events_rx,
        }
    }

    /// Create a manager using the port, timeout, read size and queue size from `config`.
    pub fn with_config(transport: Arc<dyn Transport>, config: &ConnectorConfig) -> Self {
        let mut manager = Self::new(transport);
        manager.port = config.port;
        manager.connect_timeout = config.connect_timeout;
        manager.read_chunk_size = config.read_chunk_size.max(1);
        manager.write_queue_capacity = config.write_queue_capacity.max(1);
        manager
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Last address passed to `connect`, kept across peer closes and errors.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect to `address` on the configured port.
    ///
    /// An existing connection is torn down first. The address is recorded before the
    /// attempt, so a failed connect can still be retried with `reconnect`. Failures are
    /// reported to observers and returned; the state stays `Disconnected`.
    pub async fn connect(&mut self, address: &str, observers: &ObserverSet) -> Result<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConnectorError::InvalidAddress(address.to_string()));
        }

        if self.is_connected() {
            self.teardown();
            observers.peer_disconnected();
        }

        self.address = Some(address.to_string());
        self.state = ConnectionState::Connecting;
        tracing::debug!("Connecting to {}:{}", address, self.port);

        let attempt = self.transport.connect(address, self.port);
        let stream = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(ConnectorError::Io(e), observers)),
            Err(_) => {
                let err = ConnectorError::ConnectTimeout(self.connect_timeout);
                return Err(self.connect_failed(err, observers));
            }
        };

        let (reader, writer) = tokio::io::split(stream);
        self.generation += 1;
        self.reader = Some(tokio::spawn(read_loop(
            reader,
            self.events_tx.clone(),
            self.generation,
            self.read_chunk_size,
        )));
        let (outbound, queue) = mpsc::channel(self.write_queue_capacity);
        self.writer = Some(tokio::spawn(writer_loop(
            writer,
            queue,
            self.events_tx.clone(),
            self.generation,
        )));
        self.outbound = Some(outbound);
        self.state = ConnectionState::Connected;

        tracing::debug!("Connected to {}:{}", address, self.port);
        observers.peer_connected();
        Ok(())
    }

    fn connect_failed(&mut self, err: ConnectorError, observers: &ObserverSet) -> ConnectorError {
        tracing::warn!("Connect to {:?} failed: {}", self.address, err);
        self.state = ConnectionState::Disconnected;
        observers.transport_error(&err);
        err
    }

    /// Tear down the stream immediately and forget the address.
    ///
    /// Unsent bytes are not drained. No-op if no address is recorded.
    pub fn disconnect(&mut self, observers: &ObserverSet) {
        if self.address.take().is_none() {
            return;
        }
        let was_connected = self.is_connected();
        self.teardown();
        if was_connected {
            tracing::debug!("Disconnected");
            observers.peer_disconnected();
        }
    }

    /// Disconnect, then connect again to the last-known address.
    ///
    /// Returns `NoAddress` without touching the connection if none was recorded.
    pub async fn reconnect(&mut self, observers: &ObserverSet) -> Result<()> {
        let address = self.address.clone().ok_or(ConnectorError::NoAddress)?;
        self.disconnect(observers);
        self.connect(&address, observers).await
    }

    /// Drop the connection after a stream-level failure, keeping the address.
    pub fn abort(&mut self, err: &ConnectorError, observers: &ObserverSet) {
        tracing::error!("Connection aborted: {}", err);
        let was_connected = self.is_connected();
        self.teardown();
        observers.transport_error(err);
        if was_connected {
            observers.peer_disconnected();
        }
    }

    /// Queue `bytes` for the writer task.
    ///
    /// Returns as soon as the bytes are queued. `SendQueueFull` means the node has
    /// stopped reading; the connection is left alone. Write failures surface later as a
    /// `TransportEvent::Error` and abort the connection then.
    pub fn send(&self, bytes: Bytes) -> Result<()> {
        let outbound = match (self.state, self.outbound.as_ref()) {
            (ConnectionState::Connected, Some(tx)) => tx,
            _ => return Err(ConnectorError::NotConnected),
        };

        outbound.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectorError::SendQueueFull,
            mpsc::error::TrySendError::Closed(_) => ConnectorError::NotConnected,
        })
    }

    /// Wait for the next event of the current connection.
    ///
    /// Pending forever while disconnected. Cancel safe.
    pub async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.events_rx.recv().await {
                Some((generation, event)) if generation == self.generation => return event,
                Some(_) => continue,
                // Unreachable while `events_tx` is alive.
                None => return std::future::pending().await,
            }
        }
    }

    /// Apply an event from [`next_event`](Self::next_event).
    ///
    /// Returns the data for `Data`; closes and notifies observers otherwise.
    pub fn handle_event(&mut self, event: TransportEvent, observers: &ObserverSet) -> Option<Bytes> {
        match event {
            TransportEvent::Data(bytes) => Some(bytes),
            TransportEvent::Closed => {
                tracing::debug!("Peer closed the connection");
                self.teardown();
                observers.peer_disconnected();
                None
            }
            TransportEvent::Error(e) => {
                self.abort(&ConnectorError::Io(e), observers);
                None
            }
        }
    }

    fn teardown(&mut self) {
        self.outbound = None;
        self.abort_tasks();
        // Anything still queued from the old stream is stale now.
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
    }

    fn abort_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        // A write blocked on a stalled node is cancelled here.
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Read loop - forwards raw chunks until the stream ends.
async fn read_loop(
    mut reader: ReadHalf<BoxedStream>,
    events: mpsc::UnboundedSender<(u64, TransportEvent)>,
    generation: u64,
    chunk_size: usize,
) {
    let mut buf = vec![0u8; chunk_size];

    loop {
        let event = match reader.read(&mut buf).await {
            Ok(0) => TransportEvent::Closed,
            Ok(n) => TransportEvent::Data(Bytes::copy_from_slice(&buf[..n])),
            Err(e) => TransportEvent::Error(e),
        };
        let last = !matches!(event, TransportEvent::Data(_));

        if events.send((generation, event)).is_err() || last {
            return;
        }
    }
}

/// Writer loop - drains the outbound queue into the stream.
///
/// Messages already queued are written together and flushed once. Ends when the queue
/// is closed or a write fails; the failure is reported as an event.
async fn writer_loop(
    mut writer: WriteHalf<BoxedStream>,
    mut queue: mpsc::Receiver<Bytes>,
    events: mpsc::UnboundedSender<(u64, TransportEvent)>,
    generation: u64,
) {
    while let Some(first) = queue.recv().await {
        let mut batch = Vec::with_capacity(MAX_WRITE_BATCH);
        batch.push(first);
        while batch.len() < MAX_WRITE_BATCH {
            match queue.try_recv() {
                Ok(bytes) => batch.push(bytes),
                Err(_) => break,
            }
        }

        let result = async {
            for bytes in &batch {
                writer.write_all(bytes).await?;
            }
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::debug!("Write failed: {}", e);
            let _ = events.send((generation, TransportEvent::Error(e)));
            return;
        }
    }
}
