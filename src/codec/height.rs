//! Current-height response payload.
//!
//! ```text
//! ┌──────────┬───────┬────────┬─────────┬────────────┬────────────────┐
//! │ Duration │ Epoch │ Height │ Aligned │ Misaligned │ Initial height │
//! │ u16 LE   │ u16 LE│ u32 LE │ u16 LE  │ u16 LE     │ u32 LE         │
//! └──────────┴───────┴────────┴─────────┴────────────┴────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::protocol::packet_type;

/// Encoded size of [`HeightInfo`].
pub const HEIGHT_INFO_SIZE: usize = 16;

/// Node height snapshot carried by `RESPOND_CURRENT_HEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeightInfo {
    /// Duration of the last height step as reported by the node.
    pub tick_duration: u16,
    pub epoch: u16,
    /// Current height.
    pub height: u32,
    pub aligned_votes: u16,
    pub misaligned_votes: u16,
    /// First height of the current epoch.
    pub initial_height: u32,
}

impl HeightInfo {
    /// Info with only the height set.
    pub fn at(height: u32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    /// Parse from a packet payload. Trailing bytes are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < HEIGHT_INFO_SIZE {
            return Err(ConnectorError::Decode {
                packet_type: packet_type::RESPOND_CURRENT_HEIGHT,
                reason: format!(
                    "height info needs {} bytes, got {}",
                    HEIGHT_INFO_SIZE,
                    payload.len()
                ),
            });
        }

        let mut buf = payload;
        Ok(Self {
            tick_duration: buf.get_u16_le(),
            epoch: buf.get_u16_le(),
            height: buf.get_u32_le(),
            aligned_votes: buf.get_u16_le(),
            misaligned_votes: buf.get_u16_le(),
            initial_height: buf.get_u32_le(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEIGHT_INFO_SIZE);
        buf.put_u16_le(self.tick_duration);
        buf.put_u16_le(self.epoch);
        buf.put_u32_le(self.height);
        buf.put_u16_le(self.aligned_votes);
        buf.put_u16_le(self.misaligned_votes);
        buf.put_u32_le(self.initial_height);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_field_offsets() {
        let payload = [
            0xE8, 0x03, // duration 1000
            0x8F, 0x00, // epoch 143
            0x40, 0x42, 0x0F, 0x00, // height 1_000_000
            0x01, 0x02, // aligned 513
            0x03, 0x00, // misaligned 3
            0x10, 0x27, 0x00, 0x00, // initial 10_000
        ];

        let info = HeightInfo::decode(&payload).unwrap();

        assert_eq!(info.tick_duration, 1000);
        assert_eq!(info.epoch, 143);
        assert_eq!(info.height, 1_000_000);
        assert_eq!(info.aligned_votes, 513);
        assert_eq!(info.misaligned_votes, 3);
        assert_eq!(info.initial_height, 10_000);
        assert_eq!(&info.encode()[..], &payload[..]);
    }

    #[test]
    fn test_short_payload_is_decode_error() {
        let err = HeightInfo::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Decode {
                packet_type: packet_type::RESPOND_CURRENT_HEIGHT,
                ..
            }
        ));
    }
}
