//! Packet struct with typed accessors.
//!
//! Represents one decoded frame: header plus payload.
//! Uses `bytes::Bytes` so payloads can be handed to observers without copying.

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (length = `header.size - HEADER_SIZE`).
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the packet type tag.
    #[inline]
    pub fn packet_type(&self) -> u8 {
        self.header.packet_type
    }

    /// Get the correlation token.
    #[inline]
    pub fn dejavu(&self) -> u32 {
        self.header.dejavu
    }

    /// Encode back into wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        build_packet(&self.header, &self.payload)
    }
}

/// Build a complete packet as a single contiguous buffer.
///
/// The header size field is taken as given; use [`Header::new`] to derive it from the payload.
///
/// # Example
///
/// ```
/// use ledger_connector::protocol::{build_packet, packet_type, Header};
///
/// let header = Header::new(packet_type::REQUEST_ENTITY, 32);
/// let bytes = build_packet(&header, &[0u8; 32]);
/// assert_eq!(bytes.len(), 8 + 32);
/// ```
pub fn build_packet(header: &Header, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_slice(&header.encode());
    buf.put_slice(payload);
    buf.freeze()
}

/// Build a packet with a random correlation token. Returns the bytes and the token.
pub fn build_request(packet_type: u8, payload: &[u8]) -> (Bytes, u32) {
    let mut header = Header::new(packet_type, payload.len());
    let token = header.randomize_dejavu();
    (build_packet(&header, payload), token)
}
