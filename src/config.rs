//! Connector configuration.
//!
//! Every field has a default, so a JSON document only needs the values it changes:
//!
//! ```
//! use std::time::Duration;
//! use ledger_connector::ConnectorConfig;
//!
//! let config = ConnectorConfig::from_json(r#"{ "poll_interval_ms": 250 }"#).unwrap();
//! assert_eq!(config.poll_interval, Duration::from_millis(250));
//! assert_eq!(config.port, 31841);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_CAPACITY;

/// Default node port.
pub const DEFAULT_PORT: u16 = 31841;

/// Default interval between height polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time allowed for a transport connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default size of a single transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default number of outbound messages that may wait for the writer task.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 64;

/// Settings for a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Node port, shared by every address.
    pub port: u16,
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// Ring buffer size in bytes. Also caps the size of a single packet.
    pub buffer_capacity: usize,
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    pub read_chunk_size: usize,
    /// Outbound messages queued before sends fail with `SendQueueFull`.
    pub write_queue_capacity: usize,
    /// Drop height responses whose token does not match the latest poll.
    pub match_poll_responses: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer_capacity: DEFAULT_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            match_poll_responses: false,
        }
    }
}

impl ConnectorConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
