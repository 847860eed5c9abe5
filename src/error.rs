//! Error types for ledger-connector.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Framing violation (header declares an impossible size).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Payload of a known packet type could not be parsed.
    #[error("Failed to decode packet type {packet_type}: {reason}")]
    Decode {
        /// Type tag of the offending packet.
        packet_type: u8,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Incoming data would overwrite bytes that were not consumed yet.
    #[error("Ring buffer overflow: {needed} bytes incoming, {available} free")]
    BufferOverflow { needed: usize, available: usize },

    /// Send attempted while the peer is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The node is not draining writes and the outbound queue is full.
    #[error("Send queue full")]
    SendQueueFull,

    /// Reconnect requested but no address was ever recorded.
    #[error("No peer address recorded")]
    NoAddress,

    /// Connect could not be initiated for this address.
    #[error("Invalid peer address: {0:?}")]
    InvalidAddress(String),

    /// Transport connect did not complete in time.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The connector task is gone (destroyed or dropped).
    #[error("Connector closed")]
    Closed,
}

/// Result type alias using ConnectorError.
pub type Result<T> = std::result::Result<T, ConnectorError>;
