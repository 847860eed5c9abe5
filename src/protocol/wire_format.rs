//! Wire format encoding and decoding.
//!
//! Implements the 8-byte request/response header:
//! ```text
//! ┌────────────┬────────┬──────────────┐
//! │ Total size │ Type   │ Dejavu       │
//! │ 3 bytes    │ 1 byte │ 4 bytes      │
//! │ uint24 LE  │        │ uint32 LE    │
//! └────────────┴────────┴──────────────┘
//! ```
//!
//! The size field counts the header itself, so an empty packet has size 8.
//! All multi-byte integers are Little Endian.

use rand::Rng;

use crate::error::{ConnectorError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Largest total size expressible in the 24-bit size field.
pub const MAX_PACKET_SIZE: u32 = 0x00FF_FFFF;

/// Packet type tags.
pub mod packet_type {
    /// Peer list exchange sent by the node right after connecting.
    pub const EXCHANGE_PUBLIC_PEERS: u8 = 0;
    /// Signed transaction broadcast.
    pub const BROADCAST_TRANSACTION: u8 = 24;
    /// "Give me the current height" request.
    pub const REQUEST_CURRENT_HEIGHT: u8 = 27;
    /// Current height response (payload: [`HeightInfo`](crate::codec::HeightInfo)).
    pub const RESPOND_CURRENT_HEIGHT: u8 = 28;
    /// Entity (account) request, payload is a public key.
    pub const REQUEST_ENTITY: u8 = 31;
    /// Entity response (payload: [`BalanceInfo`](crate::codec::BalanceInfo)).
    pub const RESPOND_ENTITY: u8 = 32;
    /// Terminates a multi-packet response.
    pub const END_RESPONSE: u8 = 35;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total packet size (header + payload).
    pub size: u32,
    /// Packet type tag (see `packet_type` module).
    pub packet_type: u8,
    /// Correlation token. Zero for unsolicited packets.
    pub dejavu: u32,
}

impl Header {
    /// Create a header for a payload of `payload_len` bytes with a zero token.
    ///
    /// The total must fit the 24-bit size field; debug builds assert it. Use
    /// [`checked`](Self::checked) when the length comes from outside.
    pub fn new(packet_type: u8, payload_len: usize) -> Self {
        debug_assert!(
            HEADER_SIZE + payload_len <= MAX_PACKET_SIZE as usize,
            "payload of {} bytes does not fit the 24-bit size field",
            payload_len
        );
        Self {
            size: (HEADER_SIZE + payload_len) as u32,
            packet_type,
            dejavu: 0,
        }
    }

    /// Create a header, rejecting payloads the 24-bit size field cannot describe.
    pub fn checked(packet_type: u8, payload_len: usize) -> Result<Self> {
        let max_payload = MAX_PACKET_SIZE as usize - HEADER_SIZE;
        if payload_len > max_payload {
            return Err(ConnectorError::Protocol(format!(
                "Payload of {} bytes exceeds maximum {}",
                payload_len, max_payload
            )));
        }
        Ok(Self::new(packet_type, payload_len))
    }

    /// Set an explicit correlation token.
    pub fn with_dejavu(mut self, dejavu: u32) -> Self {
        self.dejavu = dejavu;
        self
    }

    /// Replace the token with a random non-zero value and return it.
    pub fn randomize_dejavu(&mut self) -> u32 {
        let token = rand::thread_rng().gen_range(1..=u32::MAX);
        self.dejavu = token;
        token
    }

    /// Payload length declared by this header.
    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use ledger_connector::protocol::{packet_type, Header};
    ///
    /// let header = Header::new(packet_type::REQUEST_CURRENT_HEIGHT, 0).with_dejavu(7);
    /// assert_eq!(header.encode(), [8, 0, 0, 27, 7, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        let size = self.size.to_le_bytes();
        buf[0..3].copy_from_slice(&size[..3]);
        buf[3] = self.packet_type;
        buf[4..8].copy_from_slice(&self.dejavu.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            size: u32::from_le_bytes([buf[0], buf[1], buf[2], 0]),
            packet_type: buf[3],
            dejavu: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Validate the declared size against the header width and an upper bound.
    pub fn validate(&self, max_size: usize) -> Result<()> {
        if (self.size as usize) < HEADER_SIZE {
            return Err(ConnectorError::Protocol(format!(
                "Packet size {} is smaller than the header",
                self.size
            )));
        }

        if self.size as usize > max_size {
            return Err(ConnectorError::Protocol(format!(
                "Packet size {} exceeds maximum {}",
                self.size, max_size
            )));
        }

        Ok(())
    }

    /// Check if this packet has no payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size as usize == HEADER_SIZE
    }
}
