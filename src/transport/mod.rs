//! Transport module - how the connector reaches a node.
//!
//! The connector never opens sockets itself. It is handed a [`Transport`] and asks it
//! for a byte stream to `host:port`. Provides:
//! - [`TcpTransport`] - plain TCP with `TCP_NODELAY`
//! - [`MemoryTransport`] / [`MemoryListener`] - in-process duplex streams for tests

mod memory;
mod tcp;

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

pub use memory::{MemoryListener, MemoryPeer, MemoryTransport};
pub use tcp::TcpTransport;

/// Boxed future type for transport connects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bidirectional byte stream to a node.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> PeerStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased stream returned by a transport.
pub type BoxedStream = Box<dyn PeerStream>;

/// Connection capability injected into the connector.
pub trait Transport: Send + Sync + 'static {
    /// Open a stream to `host` on `port`.
    fn connect(&self, host: &str, port: u16) -> BoxFuture<'static, io::Result<BoxedStream>>;
}
