//! Entity (account balance) request and response payloads.
//!
//! The response starts with a 64-byte entity record, followed by the height it was
//! sampled at and the spectrum index. Whatever follows (the Merkle proof siblings) is
//! kept as opaque bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::public_key::{PublicKey, PUBLIC_KEY_SIZE};
use crate::error::{ConnectorError, Result};
use crate::protocol::{build_request, packet_type};

/// Size of the entity record plus height and spectrum index.
pub const BALANCE_INFO_MIN_SIZE: usize = PUBLIC_KEY_SIZE + 8 + 8 + 4 * 4 + 4 + 4;

/// Decoded `RESPOND_ENTITY` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceInfo {
    pub public_key: PublicKey,
    pub incoming_amount: i64,
    pub outgoing_amount: i64,
    pub incoming_transfers: u32,
    pub outgoing_transfers: u32,
    pub latest_incoming_height: u32,
    pub latest_outgoing_height: u32,
    /// Height the node sampled the entity at.
    pub height: u32,
    /// Position in the node's spectrum, negative if the entity is unknown.
    pub spectrum_index: i32,
    /// Remaining payload, passed through untouched.
    pub siblings: Bytes,
}

impl BalanceInfo {
    /// Net balance (incoming minus outgoing).
    pub fn balance(&self) -> i64 {
        self.incoming_amount.saturating_sub(self.outgoing_amount)
    }

    /// Parse from a packet payload.
    pub fn decode(payload: &Bytes) -> Result<Self> {
        if payload.len() < BALANCE_INFO_MIN_SIZE {
            return Err(ConnectorError::Decode {
                packet_type: packet_type::RESPOND_ENTITY,
                reason: format!(
                    "entity response needs at least {} bytes, got {}",
                    BALANCE_INFO_MIN_SIZE,
                    payload.len()
                ),
            });
        }

        let mut buf = payload.clone();
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        buf.copy_to_slice(&mut key);

        Ok(Self {
            public_key: PublicKey(key),
            incoming_amount: buf.get_i64_le(),
            outgoing_amount: buf.get_i64_le(),
            incoming_transfers: buf.get_u32_le(),
            outgoing_transfers: buf.get_u32_le(),
            latest_incoming_height: buf.get_u32_le(),
            latest_outgoing_height: buf.get_u32_le(),
            height: buf.get_u32_le(),
            spectrum_index: buf.get_i32_le(),
            siblings: buf,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(BALANCE_INFO_MIN_SIZE + self.siblings.len());
        buf.put_slice(self.public_key.as_bytes());
        buf.put_i64_le(self.incoming_amount);
        buf.put_i64_le(self.outgoing_amount);
        buf.put_u32_le(self.incoming_transfers);
        buf.put_u32_le(self.outgoing_transfers);
        buf.put_u32_le(self.latest_incoming_height);
        buf.put_u32_le(self.latest_outgoing_height);
        buf.put_u32_le(self.height);
        buf.put_i32_le(self.spectrum_index);
        buf.put_slice(&self.siblings);
        buf.freeze()
    }
}

/// Build a complete `REQUEST_ENTITY` packet for `account`. Returns bytes and token.
pub fn entity_request(account: &PublicKey) -> (Bytes, u32) {
    build_request(packet_type::REQUEST_ENTITY, account.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Header, HEADER_SIZE};

    fn sample() -> BalanceInfo {
        BalanceInfo {
            public_key: PublicKey([3u8; 32]),
            incoming_amount: 1_500,
            outgoing_amount: 400,
            incoming_transfers: 4,
            outgoing_transfers: 1,
            latest_incoming_height: 900,
            latest_outgoing_height: 850,
            height: 1_000,
            spectrum_index: 77,
            siblings: Bytes::from_static(&[0xEE; 64]),
        }
    }

    #[test]
    fn test_decode_preserves_fields_and_siblings() {
        let info = sample();
        let decoded = BalanceInfo::decode(&info.encode()).unwrap();

        assert_eq!(decoded, info);
        assert_eq!(decoded.balance(), 1_100);
        assert_eq!(decoded.siblings.len(), 64);
    }

    #[test]
    fn test_decode_minimum_payload() {
        let payload = Bytes::from(vec![0u8; BALANCE_INFO_MIN_SIZE]);
        let decoded = BalanceInfo::decode(&payload).unwrap();
        assert!(decoded.siblings.is_empty());
        assert_eq!(BALANCE_INFO_MIN_SIZE, 72);
    }

    #[test]
    fn test_short_payload_is_decode_error() {
        let payload = Bytes::from(vec![0u8; 40]);
        assert!(matches!(
            BalanceInfo::decode(&payload),
            Err(ConnectorError::Decode {
                packet_type: packet_type::RESPOND_ENTITY,
                ..
            })
        ));
    }

    #[test]
    fn test_entity_request_layout() {
        let key = PublicKey([9u8; 32]);
        let (bytes, token) = entity_request(&key);
        let header = Header::decode(&bytes).unwrap();

        assert_eq!(header.size as usize, HEADER_SIZE + 32);
        assert_eq!(header.packet_type, packet_type::REQUEST_ENTITY);
        assert_eq!(header.dejavu, token);
        assert_eq!(&bytes[HEADER_SIZE..], key.as_bytes());
    }
}
