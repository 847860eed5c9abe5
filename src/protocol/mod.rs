//! Protocol module - wire format, ring buffer, framing, and packet types.
//!
//! This module implements the binary node protocol:
//! - 8-byte header encoding/decoding
//! - Circular buffer holding undecoded transport bytes
//! - Frame decoder that drains complete packets from the buffer
//! - Packet struct with typed accessors

mod frame_decoder;
mod packet;
mod ring_buffer;
mod wire_format;

pub use frame_decoder::FrameDecoder;
pub use packet::{build_packet, build_request, Packet};
pub use ring_buffer::{RingBuffer, DEFAULT_CAPACITY};
pub use wire_format::{packet_type, Header, HEADER_SIZE, MAX_PACKET_SIZE};
