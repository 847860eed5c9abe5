//! Observer registry for connector events.
//!
//! Subscribers implement [`ConnectorObserver`] and override only the hooks they care
//! about. Any number of subscribers can be registered; each event is delivered to all
//! of them in registration order, on the connector task.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ledger_connector::handler::{ConnectorObserver, ObserverSet};
//!
//! struct PrintHeight;
//!
//! impl ConnectorObserver for PrintHeight {
//!     fn on_height_changed(&self, height: u32) {
//!         println!("height {}", height);
//!     }
//! }
//!
//! let mut observers = ObserverSet::new();
//! observers.add(Arc::new(PrintHeight));
//! observers.height_changed(42);
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::BalanceInfo;
use crate::error::ConnectorError;
use crate::protocol::Packet;

/// Callbacks fired by the connector. All hooks default to no-ops.
pub trait ConnectorObserver: Send + Sync + 'static {
    /// Initialization after `start` completed.
    fn on_ready(&self) {}

    fn on_peer_connected(&self) {}

    /// Peer closed the connection, or it was torn down locally.
    fn on_peer_disconnected(&self) {}

    /// Current height increased.
    fn on_height_changed(&self, _height: u32) {}

    fn on_balance(&self, _balance: &BalanceInfo) {}

    /// Packet of a type the connector does not interpret.
    fn on_packet_received(&self, _packet: &Packet) {}

    /// Packet of a known type whose payload failed to parse.
    fn on_decode_error(&self, _packet: &Packet, _error: &ConnectorError) {}

    fn on_transport_error(&self, _error: &ConnectorError) {}
}

/// Ordered collection of subscribers.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn ConnectorObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn ConnectorObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn ready(&self) {
        self.observers.iter().for_each(|o| o.on_ready());
    }

    pub fn peer_connected(&self) {
        self.observers.iter().for_each(|o| o.on_peer_connected());
    }

    pub fn peer_disconnected(&self) {
        self.observers.iter().for_each(|o| o.on_peer_disconnected());
    }

    pub fn height_changed(&self, height: u32) {
        self.observers
            .iter()
            .for_each(|o| o.on_height_changed(height));
    }

    pub fn balance(&self, balance: &BalanceInfo) {
        self.observers.iter().for_each(|o| o.on_balance(balance));
    }

    pub fn packet_received(&self, packet: &Packet) {
        self.observers
            .iter()
            .for_each(|o| o.on_packet_received(packet));
    }

    pub fn decode_error(&self, packet: &Packet, error: &ConnectorError) {
        self.observers
            .iter()
            .for_each(|o| o.on_decode_error(packet, error));
    }

    pub fn transport_error(&self, error: &ConnectorError) {
        self.observers
            .iter()
            .for_each(|o| o.on_transport_error(error));
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// Owned snapshot of an observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    Ready,
    PeerConnected,
    PeerDisconnected,
    HeightChanged(u32),
    Balance(BalanceInfo),
    PacketReceived(Packet),
    DecodeError { packet: Packet, message: String },
    TransportError(String),
}

/// Observer that forwards every callback into an unbounded channel.
///
/// Useful when the consumer lives on another task (a UI loop, a test) and wants to
/// `recv().await` events instead of implementing the trait.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ConnectorEvent>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ConnectorEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl ConnectorObserver for ChannelObserver {
    fn on_ready(&self) {
        self.emit(ConnectorEvent::Ready);
    }

    fn on_peer_connected(&self) {
        self.emit(ConnectorEvent::PeerConnected);
    }

    fn on_peer_disconnected(&self) {
        self.emit(ConnectorEvent::PeerDisconnected);
    }

    fn on_height_changed(&self, height: u32) {
        self.emit(ConnectorEvent::HeightChanged(height));
    }

    fn on_balance(&self, balance: &BalanceInfo) {
        self.emit(ConnectorEvent::Balance(balance.clone()));
    }

    fn on_packet_received(&self, packet: &Packet) {
        self.emit(ConnectorEvent::PacketReceived(packet.clone()));
    }

    fn on_decode_error(&self, packet: &Packet, error: &ConnectorError) {
        self.emit(ConnectorEvent::DecodeError {
            packet: packet.clone(),
            message: error.to_string(),
        });
    }

    fn on_transport_error(&self, error: &ConnectorError) {
        self.emit(ConnectorEvent::TransportError(error.to_string()));
    }
}
