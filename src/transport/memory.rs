//! In-process transport over `tokio::io::duplex`.
//!
//! Every successful connect creates a duplex pair: the connector keeps one end, the
//! other end is delivered to the [`MemoryListener`] together with the requested address,
//! so a test can play the node.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use ledger_connector::transport::{MemoryTransport, Transport};
//!
//! let (transport, mut listener) = MemoryTransport::pair();
//! let _stream = transport.connect("node-a", 31841).await.unwrap();
//!
//! let peer = listener.accept().await.unwrap();
//! assert_eq!(peer.host, "node-a");
//! # }
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use super::{BoxFuture, BoxedStream, Transport};

/// Default duplex buffer size per direction.
pub const DEFAULT_DUPLEX_BUFFER: usize = 64 * 1024;

/// Node side of an accepted in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    pub host: String,
    pub port: u16,
    pub stream: DuplexStream,
}

#[derive(Debug)]
struct Shared {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: AtomicBool,
    connects: AtomicUsize,
    buffer_size: usize,
}

/// Transport handing out in-memory streams. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Receives the node side of each connection.
#[derive(Debug)]
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a transport and its listener.
    pub fn pair() -> (Self, MemoryListener) {
        Self::with_buffer_size(DEFAULT_DUPLEX_BUFFER)
    }

    /// Create a transport whose duplex streams buffer `buffer_size` bytes per direction.
    pub fn with_buffer_size(buffer_size: usize) -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            peers: tx,
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            buffer_size,
        });
        (Self { shared }, MemoryListener { peers: rx })
    }

    /// Make subsequent connects fail with `ConnectionRefused`.
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connect attempts so far, refused ones included.
    pub fn connect_attempts(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, host: &str, port: u16) -> BoxFuture<'static, io::Result<BoxedStream>> {
        let shared = self.shared.clone();
        let host = host.to_string();
        Box::pin(async move {
            shared.connects.fetch_add(1, Ordering::SeqCst);
            if shared.refuse.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{}:{} refused", host, port),
                ));
            }

            let (local, remote) = tokio::io::duplex(shared.buffer_size);
            let peer = MemoryPeer {
                host,
                port,
                stream: remote,
            };
            if shared.peers.send(peer).is_err() {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "listener dropped",
                ));
            }
            Ok(Box::new(local) as BoxedStream)
        })
    }
}

impl MemoryListener {
    /// Wait for the next connection. `None` once every transport clone is dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Next connection if one is already waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}
