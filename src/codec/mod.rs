//! Codec module - payload layouts of the packets the connector understands.
//!
//! - [`HeightInfo`] - `RESPOND_CURRENT_HEIGHT` payload
//! - [`BalanceInfo`] - `RESPOND_ENTITY` payload, plus the matching request builder
//! - [`ProcedureInputBuilder`] / [`InitAgreement`] - fixed-width procedure inputs
//!
//! # Design
//!
//! Every layout is packed little-endian with no padding, read with `bytes::Buf` and
//! written with `bytes::BufMut`. Decoders check the length up front and report a
//! `Decode` error instead of panicking on short input.

mod entity;
mod height;
mod procedure;
mod public_key;

pub use entity::{entity_request, BalanceInfo, BALANCE_INFO_MIN_SIZE};
pub use height::{HeightInfo, HEIGHT_INFO_SIZE};
pub use procedure::{InitAgreement, ProcedureInputBuilder, CONTRACT_NAME_SIZE};
pub use public_key::{PublicKey, PUBLIC_KEY_SIZE};
