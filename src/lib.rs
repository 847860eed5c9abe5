//! # ledger-connector
//!
//! Persistent-connection client for a length-prefixed binary ledger node protocol.
//!
//! The connector keeps one TCP connection to a node, frames the incoming byte stream
//! into packets, tracks the node's current height by polling it, and hands decoded
//! events to any number of observers.
//!
//! ## Architecture
//!
//! - **Protocol**: 8-byte header (24-bit size, type tag, correlation token), a ring
//!   buffer holding undecoded bytes, and a decoder that drains every complete frame
//! - **Codec**: payload layouts (height info, entity/balance, procedure inputs)
//! - **Runtime**: one task owns the connection, decoder, dispatcher and poll timer;
//!   the [`Connector`] handle talks to it over a command channel
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledger_connector::{ChannelObserver, ConnectorBuilder, ConnectorEvent};
//!
//! #[tokio::main]
//! async fn main() -> ledger_connector::Result<()> {
//!     let (observer, mut events) = ChannelObserver::new();
//!     let connector = ConnectorBuilder::new()
//!         .observer(Arc::new(observer))
//!         .build_tcp();
//!
//!     connector.start("127.0.0.1").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let ConnectorEvent::HeightChanged(height) = event {
//!             println!("height {}", height);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod scheduler;
pub mod transport;

mod connector;

pub use config::ConnectorConfig;
pub use connection::ConnectionState;
pub use connector::{Connector, ConnectorBuilder, ConnectorStatus};
pub use error::{ConnectorError, Result};
pub use handler::{ChannelObserver, ConnectorEvent, ConnectorObserver};
