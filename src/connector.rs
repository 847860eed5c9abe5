//! Connector builder and runtime loop.
//!
//! The [`ConnectorBuilder`] provides a fluent API for configuration and observers. The
//! [`Connector`] is a handle to a task that owns all connection state:
//!
//! ```text
//!  Connector ──► commands ──┐
//!                           ▼
//!  transport bytes ──► ConnectorTask ──► FrameDecoder ──► PacketDispatcher ──► observers
//!                           │
//!  PollScheduler tick ──────┘──► ConnectionManager::send ──► writer task ──► transport
//! ```
//!
//! Commands, transport events and poll ticks are handled one at a time on that task,
//! so observers see events in the order they happened. Nothing on the task waits on the
//! transport's write side, so a node that stops reading cannot stall `stop`, `destroy`
//! or `status`. Dropping the last handle (or
//! calling [`Connector::destroy`]) ends the task.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledger_connector::{ConnectorBuilder, ConnectorObserver};
//!
//! struct Log;
//!
//! impl ConnectorObserver for Log {
//!     fn on_height_changed(&self, height: u32) {
//!         println!("height {}", height);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ledger_connector::Result<()> {
//!     let connector = ConnectorBuilder::new()
//!         .observer(Arc::new(Log))
//!         .build_tcp();
//!
//!     connector.start("127.0.0.1").await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     connector.destroy().await
//! }
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{entity_request, PublicKey};
use crate::config::ConnectorConfig;
use crate::connection::{ConnectionManager, ConnectionState, TransportEvent};
use crate::error::{ConnectorError, Result};
use crate::handler::{ConnectorObserver, ObserverSet, PacketDispatcher};
use crate::protocol::FrameDecoder;
use crate::scheduler::PollScheduler;
use crate::transport::{TcpTransport, Transport};

/// Capacity of the command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Builder for configuring and spawning a connector.
#[derive(Debug, Default)]
pub struct ConnectorBuilder {
    config: ConnectorConfig,
    observers: ObserverSet,
}

impl ConnectorBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Node port. Default: 31841
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Interval between height polls. Default: 500 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Ring buffer capacity in bytes. Default: 4 MiB
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Time allowed for a transport connect. Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Size of a single transport read. Default: 64 KiB
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Outbound messages queued for the writer task. Default: 64
    pub fn write_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.write_queue_capacity = capacity;
        self
    }

    /// Only accept height responses to the most recent poll. Default: false
    pub fn match_poll_responses(mut self, enabled: bool) -> Self {
        self.config.match_poll_responses = enabled;
        self
    }

    /// Register a subscriber. Can be called any number of times.
    pub fn observer(mut self, observer: Arc<dyn ConnectorObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Spawn the connector task using `transport`.
    ///
    /// Must be called within a Tokio runtime. Nothing connects until `start`.
    pub fn build<T: Transport>(self, transport: T) -> Connector {
        self.build_with(Arc::new(transport))
    }

    /// Spawn the connector task over TCP.
    pub fn build_tcp(self) -> Connector {
        self.build(TcpTransport::new())
    }

    /// Spawn the connector task using a shared transport.
    pub fn build_with(self, transport: Arc<dyn Transport>) -> Connector {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = ConnectorTask::new(self.config, transport, self.observers, rx);
        let handle = tokio::spawn(task.run());
        Connector { tx, task: handle }
    }
}

/// Point-in-time view of the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorStatus {
    pub state: ConnectionState,
    pub address: Option<String>,
    /// Highest height seen so far.
    pub current_height: u32,
    /// Whether the poll timer is armed.
    pub polling: bool,
    /// Poll requests handed to the writer. Polls dropped on a full queue are not counted.
    pub polls_sent: u64,
}

enum Command {
    Start {
        address: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
    Send {
        bytes: Bytes,
        reply: oneshot::Sender<Result<()>>,
    },
    RequestBalance {
        account: PublicKey,
        reply: oneshot::Sender<Result<u32>>,
    },
    Reconnect {
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        observer: Arc<dyn ConnectorObserver>,
    },
    Status {
        reply: oneshot::Sender<ConnectorStatus>,
    },
}

/// Handle to a running connector.
///
/// Every method is a request to the connector task and fails with `Closed` once the
/// task is gone.
#[derive(Debug)]
pub struct Connector {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl Connector {
    /// Create a builder.
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    /// Connect to `address`, reset the buffer, start polling and fire `on_ready`.
    ///
    /// Polling and `on_ready` happen even if the connect fails; the connect error is
    /// still returned. Use `reconnect` to retry.
    pub async fn start(&self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        self.request(|reply| Command::Start { address, reply })
            .await?
    }

    /// Stop polling and disconnect. The connector can be started again.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Stop and release the transport. The task exits; later calls fail with `Closed`.
    pub async fn destroy(&self) -> Result<()> {
        self.request(|reply| Command::Destroy { reply }).await
    }

    /// Write raw bytes to the node.
    pub async fn send(&self, bytes: impl Into<Bytes>) -> Result<()> {
        let bytes = bytes.into();
        self.request(|reply| Command::Send { bytes, reply }).await?
    }

    /// Ask the node for the entity record of `account`. Returns the request token.
    ///
    /// The answer arrives through `on_balance`.
    pub async fn request_balance(&self, account: PublicKey) -> Result<u32> {
        self.request(|reply| Command::RequestBalance { account, reply })
            .await?
    }

    /// Disconnect and connect again to the last address.
    pub async fn reconnect(&self) -> Result<()> {
        self.request(|reply| Command::Reconnect { reply }).await?
    }

    /// Register a subscriber on the running connector.
    pub async fn subscribe(&self, observer: Arc<dyn ConnectorObserver>) -> Result<()> {
        self.tx
            .send(Command::Subscribe { observer })
            .await
            .map_err(|_| ConnectorError::Closed)
    }

    pub async fn status(&self) -> Result<ConnectorStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Whether the connector task has exited.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ConnectorError::Closed)?;
        rx.await.map_err(|_| ConnectorError::Closed)
    }
}

/// What woke the task up.
enum Step {
    Command(Option<Command>),
    Transport(TransportEvent),
    Poll,
}

/// Owns every piece of connection state.
struct ConnectorTask {
    commands: mpsc::Receiver<Command>,
    connection: ConnectionManager,
    decoder: FrameDecoder,
    dispatcher: PacketDispatcher,
    scheduler: PollScheduler,
    observers: ObserverSet,
}

impl ConnectorTask {
    fn new(
        config: ConnectorConfig,
        transport: Arc<dyn Transport>,
        observers: ObserverSet,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            commands,
            connection: ConnectionManager::with_config(transport, &config),
            decoder: FrameDecoder::with_capacity(config.buffer_capacity.max(1)),
            dispatcher: PacketDispatcher::with_response_matching(config.match_poll_responses),
            scheduler: PollScheduler::new(config.poll_interval),
            observers,
        }
    }

    /// Main loop - one step at a time until destroyed or every handle is dropped.
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                event = self.connection.next_event() => Step::Transport(event),
                _ = self.scheduler.tick() => Step::Poll,
            };

            match step {
                Step::Command(Some(command)) => {
                    if self.handle_command(command).await.is_break() {
                        break;
                    }
                }
                Step::Command(None) => {
                    self.shutdown();
                    break;
                }
                Step::Transport(event) => self.on_transport_event(event),
                Step::Poll => self.poll(),
            }
        }
        tracing::debug!("Connector task exited");
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start { address, reply } => {
                let result = self.start(&address).await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
            Command::Destroy { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            Command::Send { bytes, reply } => {
                let _ = reply.send(self.connection.send(bytes));
            }
            Command::RequestBalance { account, reply } => {
                let (bytes, token) = entity_request(&account);
                let result = self.connection.send(bytes);
                let _ = reply.send(result.map(|()| token));
            }
            Command::Reconnect { reply } => {
                let result = self.connection.reconnect(&self.observers).await;
                if result.is_ok() {
                    self.decoder.reset();
                }
                let _ = reply.send(result);
            }
            Command::Subscribe { observer } => self.observers.add(observer),
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
        ControlFlow::Continue(())
    }

    async fn start(&mut self, address: &str) -> Result<()> {
        let result = self.connection.connect(address, &self.observers).await;
        if matches!(result, Err(ConnectorError::InvalidAddress(_))) {
            return result;
        }
        self.decoder.reset();
        self.scheduler.start();
        self.observers.ready();
        result
    }

    fn shutdown(&mut self) {
        self.scheduler.stop();
        self.connection.disconnect(&self.observers);
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        let data = match self.connection.handle_event(event, &self.observers) {
            Some(data) => data,
            None => return,
        };

        let mut packets = Vec::new();
        let result = self.decoder.push_into(&data, &mut packets);

        // Frames completed ahead of a bad header are still delivered.
        for packet in &packets {
            self.dispatcher.dispatch(packet, &self.observers);
        }

        if let Err(e) = result {
            self.decoder.reset();
            self.connection.abort(&e, &self.observers);
        }
    }

    fn poll(&mut self) {
        if !self.connection.is_connected() {
            tracing::trace!("Skipping height poll while disconnected");
            return;
        }

        let (bytes, token) = self.scheduler.next_request();
        match self.connection.send(bytes) {
            Ok(()) => {
                self.scheduler.record_sent();
                self.dispatcher.expect_height_response(token);
            }
            Err(e) => tracing::warn!("Dropped height poll: {}", e),
        }
    }

    fn status(&self) -> ConnectorStatus {
        ConnectorStatus {
            state: self.connection.state(),
            address: self.connection.address().map(str::to_string),
            current_height: self.dispatcher.current_height(),
            polling: self.scheduler.is_running(),
            polls_sent: self.scheduler.polls_sent(),
        }
    }
}
