//! Frame decoder over a [`RingBuffer`].
//!
//! Transport data arrives at arbitrary chunk boundaries. The decoder appends each chunk
//! to the ring and then drains every complete frame:
//!
//! 1. Fewer than 8 unread bytes: stop and wait for more data.
//! 2. Peek the header without consuming it.
//! 3. Fewer unread bytes than the declared total size: stop. The header stays in the
//!    ring and is parsed again on the next pass.
//! 4. Otherwise consume header and payload and emit a [`Packet`].
//!
//! # Example
//!
//! ```
//! use ledger_connector::protocol::{build_packet, packet_type, FrameDecoder, Header};
//!
//! let mut decoder = FrameDecoder::new();
//! let bytes = build_packet(&Header::new(packet_type::END_RESPONSE, 0), &[]);
//!
//! assert!(decoder.push(&bytes[..5]).unwrap().is_empty());
//! let packets = decoder.push(&bytes[5..]).unwrap();
//! assert_eq!(packets.len(), 1);
//! ```

use super::packet::Packet;
use super::ring_buffer::RingBuffer;
use super::wire_format::{Header, HEADER_SIZE, MAX_PACKET_SIZE};
use crate::error::{ConnectorError, Result};

/// Decoder that turns a byte stream into packets.
#[derive(Debug)]
pub struct FrameDecoder {
    ring: RingBuffer,
    max_packet_size: usize,
}

impl FrameDecoder {
    /// Create a decoder backed by a default 4 MiB ring.
    pub fn new() -> Self {
        Self::with_ring(RingBuffer::new())
    }

    /// Create a decoder backed by a ring of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_ring(RingBuffer::with_capacity(capacity))
    }

    /// Create a decoder around an existing ring.
    ///
    /// A frame can never be larger than the ring, so the size limit is the smaller of
    /// the ring capacity and the 24-bit wire maximum.
    pub fn with_ring(ring: RingBuffer) -> Self {
        let max_packet_size = ring.capacity().min(MAX_PACKET_SIZE as usize);
        Self {
            ring,
            max_packet_size,
        }
    }

    /// Append data and extract all complete packets.
    ///
    /// Convenience wrapper over [`push_into`](Self::push_into). On error, packets
    /// decoded before the failure are dropped with it.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Packet>> {
        let mut packets = Vec::new();
        self.push_into(data, &mut packets)?;
        Ok(packets)
    }

    /// Append data and move every complete packet into `out`.
    ///
    /// Data larger than the free space is fed in pieces, draining between pieces, so a
    /// burst bigger than the ring is fine as long as every frame fits.
    ///
    /// # Errors
    ///
    /// - `BufferOverflow` if the ring is full and no frame can be drained from it. With
    ///   the size limit capped at the ring capacity a full ring always holds a frame.
    /// - `Protocol` if a header declares a size below 8 or above the size limit.
    ///
    /// Packets completed before the error are already in `out`.
    pub fn push_into(&mut self, data: &[u8], out: &mut Vec<Packet>) -> Result<()> {
        let mut rest = data;

        while !rest.is_empty() {
            let n = rest.len().min(self.ring.free());
            if n == 0 {
                return Err(ConnectorError::BufferOverflow {
                    needed: rest.len(),
                    available: 0,
                });
            }
            self.ring.write(&rest[..n])?;
            rest = &rest[n..];
            self.drain_into(out)?;
        }

        Ok(())
    }

    /// Extract every complete packet currently buffered.
    pub fn drain(&mut self) -> Result<Vec<Packet>> {
        let mut packets = Vec::new();
        self.drain_into(&mut packets)?;
        Ok(packets)
    }

    fn drain_into(&mut self, out: &mut Vec<Packet>) -> Result<()> {
        while let Some(packet) = self.try_extract_one()? {
            out.push(packet);
        }
        Ok(())
    }

    /// Try to extract a single packet.
    ///
    /// Returns:
    /// - `Ok(Some(packet))` if a complete packet was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on an impossible header
    fn try_extract_one(&mut self) -> Result<Option<Packet>> {
        let mut raw = [0u8; HEADER_SIZE];
        if !self.ring.peek_into(&mut raw) {
            return Ok(None);
        }

        let header = match Header::decode(&raw) {
            Some(h) => h,
            None => return Ok(None),
        };
        header.validate(self.max_packet_size)?;

        if self.ring.len() < header.size as usize {
            return Ok(None);
        }

        self.ring.advance(HEADER_SIZE);
        let payload = match self.ring.read(header.payload_len(), true) {
            Some(p) => p,
            None => return Ok(None),
        };

        Ok(Some(Packet::new(header, payload)))
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Largest accepted total packet size.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Get the underlying ring.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Drop buffered bytes and reset the ring cursors.
    pub fn reset(&mut self) {
        self.ring.reset();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
