//! Fixed-width procedure input encoding.
//!
//! Contract procedures take a packed little-endian input record. The connector only
//! produces the raw bytes; embedding them in a signed transaction and broadcasting it
//! happens elsewhere.
//!
//! # Example
//!
//! ```
//! use ledger_connector::codec::{InitAgreement, PublicKey};
//!
//! let agreement = InitAgreement {
//!     contract_name: "Acme".to_string(),
//!     counterparty: PublicKey([1u8; 32]),
//!     validator: None,
//!     start_date: 1_700_000_000,
//!     frequency_days: 30,
//!     delivery_date: 1_702_600_000,
//! };
//! assert_eq!(agreement.encode().len(), 116);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::public_key::{PublicKey, PUBLIC_KEY_SIZE};

/// Width of the contract name field.
pub const CONTRACT_NAME_SIZE: usize = 64;

/// Builder for packed procedure inputs.
#[derive(Debug, Default)]
pub struct ProcedureInputBuilder {
    buf: BytesMut,
}

impl ProcedureInputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` as UTF-8 in a field of exactly `width` bytes.
    ///
    /// Longer strings are cut at byte `width` (even inside a multi-byte character);
    /// shorter ones are padded with NUL.
    pub fn add_string(mut self, value: &str, width: usize) -> Self {
        let bytes = value.as_bytes();
        let used = bytes.len().min(width);
        self.buf.put_slice(&bytes[..used]);
        self.buf.put_bytes(0, width - used);
        self
    }

    pub fn add_public_key(mut self, key: &PublicKey) -> Self {
        self.buf.put_slice(key.as_bytes());
        self
    }

    pub fn add_u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn add_u64(mut self, value: u64) -> Self {
        self.buf.put_u64_le(value);
        self
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Input of the "init agreement" procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitAgreement {
    pub contract_name: String,
    pub counterparty: PublicKey,
    /// Optional third-party validator key, appended after the counterparty.
    #[serde(default)]
    pub validator: Option<PublicKey>,
    /// Start date, seconds since the Unix epoch.
    pub start_date: u64,
    pub frequency_days: u32,
    /// Committed delivery date, seconds since the Unix epoch.
    pub delivery_date: u64,
}

impl InitAgreement {
    /// Encoded length: 116 bytes, or 148 with a validator.
    pub fn encoded_len(&self) -> usize {
        let keys = 1 + usize::from(self.validator.is_some());
        CONTRACT_NAME_SIZE + keys * PUBLIC_KEY_SIZE + 8 + 4 + 8
    }

    pub fn encode(&self) -> Bytes {
        let mut builder = ProcedureInputBuilder::new()
            .add_string(&self.contract_name, CONTRACT_NAME_SIZE)
            .add_public_key(&self.counterparty);
        if let Some(validator) = &self.validator {
            builder = builder.add_public_key(validator);
        }
        builder
            .add_u64(self.start_date)
            .add_u32(self.frequency_days)
            .add_u64(self.delivery_date)
            .build()
    }
}
