//! Fixed-capacity circular byte store.
//!
//! Incoming transport bytes are appended at the write cursor and consumed from the
//! read cursor; both wrap at the end of the backing store. An explicit unread count
//! tells a full buffer apart from an empty one (both have `write_pos == read_pos`).
//!
//! A write that does not fit in the free space is rejected with
//! [`ConnectorError::BufferOverflow`] instead of overwriting unread data.

use bytes::{Bytes, BytesMut};

use crate::error::{ConnectorError, Result};

/// Default capacity (4 MiB).
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

/// Circular byte buffer with independent read/write cursors.
pub struct RingBuffer {
    storage: Box<[u8]>,
    write_pos: usize,
    read_pos: usize,
    unread: usize,
}

impl RingBuffer {
    /// Create a buffer with the default 4 MiB capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` unread bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            unread: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.unread
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.unread == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.unread == self.capacity()
    }

    /// Free space left before the writer would catch up with the reader.
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.unread
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Append `data` at the write cursor, wrapping to offset 0 at the end of the store.
    ///
    /// Nothing is written if `data` does not fit in the free space.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.free() {
            return Err(ConnectorError::BufferOverflow {
                needed: data.len(),
                available: self.free(),
            });
        }

        let capacity = self.capacity();
        let first = data.len().min(capacity - self.write_pos);
        self.storage[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);

        let rest = data.len() - first;
        if rest > 0 {
            self.storage[..rest].copy_from_slice(&data[first..]);
        }

        self.write_pos = (self.write_pos + data.len()) % capacity;
        self.unread += data.len();
        Ok(())
    }

    /// Copy `out.len()` bytes starting at the read cursor without consuming them.
    ///
    /// Returns `false` (and leaves `out` untouched) if fewer bytes are unread.
    pub fn peek_into(&self, out: &mut [u8]) -> bool {
        let n = out.len();
        if n > self.unread {
            return false;
        }

        let capacity = self.capacity();
        let first = n.min(capacity - self.read_pos);
        out[..first].copy_from_slice(&self.storage[self.read_pos..self.read_pos + first]);
        out[first..].copy_from_slice(&self.storage[..n - first]);
        true
    }

    /// Read `n` bytes starting at the read cursor, joining the tail and head slices when
    /// the range crosses the end of the store. Advances the cursor if `advance` is set.
    ///
    /// Returns `None` if fewer than `n` bytes are unread.
    pub fn read(&mut self, n: usize, advance: bool) -> Option<Bytes> {
        if n > self.unread {
            return None;
        }

        let mut out = BytesMut::zeroed(n);
        self.peek_into(&mut out[..]);
        if advance {
            self.advance(n);
        }
        Some(out.freeze())
    }

    /// Move the read cursor forward by `n` bytes (clamped to the unread count).
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.unread);
        self.read_pos = (self.read_pos + n) % self.capacity();
        self.unread -= n;
    }

    /// Reset both cursors to 0 and drop all unread data.
    pub fn reset(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
        self.unread = 0;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("write_pos", &self.write_pos)
            .field("read_pos", &self.read_pos)
            .field("unread", &self.unread)
            .finish()
    }
}
