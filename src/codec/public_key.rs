//! 32-byte account public key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// Public key length in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Raw account public key as it appears on the wire.
///
/// Converting to and from the human-readable identity string needs the external signing
/// library and is not done here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_SIZE]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = ConnectorError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            ConnectorError::Protocol(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parses 64 hex characters, either case.
impl FromStr for PublicKey {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| ConnectorError::Protocol(format!("invalid public key hex: {}", e)))?;
        Self::try_from(bytes.as_slice())
    }
}

/// Lowercase hex.
impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_slice() {
        let bytes = [7u8; 32];
        let key = PublicKey::try_from(&bytes[..]).unwrap();
        assert_eq!(key.as_bytes(), &bytes);

        assert!(PublicKey::try_from(&bytes[..31]).is_err());
    }

    #[test]
    fn test_parse_hex() {
        let text = "00112233445566778899AABBCCDDEEFF00112233445566778899aabbccddeeff";
        let key: PublicKey = text.parse().unwrap();

        assert_eq!(key.0[0], 0x00);
        assert_eq!(key.0[10], 0xAA);
        assert_eq!(key.0[31], 0xFF);
        assert_eq!(key.to_string(), text.to_lowercase());
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        // Only 31 bytes of valid hex in the last case.
        assert!("abc".parse::<PublicKey>().is_err());
        assert!("zz".repeat(32).parse::<PublicKey>().is_err());
        assert!(matches!(
            "ab".repeat(31).parse::<PublicKey>(),
            Err(ConnectorError::Protocol(msg)) if msg.contains("got 31")
        ));
    }
}
