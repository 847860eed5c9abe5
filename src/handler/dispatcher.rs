//! Packet dispatcher - interprets decoded packets by type tag.
//!
//! - `RESPOND_CURRENT_HEIGHT`: raises the current height if the reported value is
//!   larger. Equal or smaller values are ignored, so the height never goes backwards.
//! - `RESPOND_ENTITY`: decoded only when at least one observer is registered, then
//!   handed to every observer's `on_balance`. With no observers the payload is skipped.
//! - anything else: forwarded untouched to packet subscribers.
//!
//! A malformed payload of a known type is reported through `on_decode_error`; it never
//! stops the caller's drain loop.

use super::observer::ObserverSet;
use crate::codec::{BalanceInfo, HeightInfo};
use crate::protocol::{packet_type, Packet};

/// Holds the current height and routes packets to observers.
#[derive(Debug, Default)]
pub struct PacketDispatcher {
    current_height: u32,
    match_poll_responses: bool,
    awaiting: Option<u32>,
}

impl PacketDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept height responses carrying the token of the latest poll request.
    pub fn with_response_matching(match_poll_responses: bool) -> Self {
        Self {
            match_poll_responses,
            ..Self::default()
        }
    }

    /// Highest height observed so far (0 before the first response).
    #[inline]
    pub fn current_height(&self) -> u32 {
        self.current_height
    }

    /// Record the token of the poll request that was just sent.
    pub fn expect_height_response(&mut self, token: u32) {
        self.awaiting = Some(token);
    }

    /// Route one packet.
    pub fn dispatch(&mut self, packet: &Packet, observers: &ObserverSet) {
        match packet.packet_type() {
            packet_type::RESPOND_CURRENT_HEIGHT => self.on_height(packet, observers),
            packet_type::RESPOND_ENTITY => {
                // Any observer may implement `on_balance`; skip decoding only with none.
                if observers.is_empty() {
                    return;
                }
                match BalanceInfo::decode(&packet.payload) {
                    Ok(balance) => observers.balance(&balance),
                    Err(e) => {
                        tracing::warn!("Malformed entity response: {}", e);
                        observers.decode_error(packet, &e);
                    }
                }
            }
            _ => observers.packet_received(packet),
        }
    }

    fn on_height(&mut self, packet: &Packet, observers: &ObserverSet) {
        if self.match_poll_responses && self.awaiting != Some(packet.dejavu()) {
            tracing::debug!(
                "Discarding height response with token {:#010x}",
                packet.dejavu()
            );
            return;
        }

        let info = match HeightInfo::decode(packet.payload()) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Malformed height response: {}", e);
                observers.decode_error(packet, &e);
                return;
            }
        };

        if info.height > self.current_height {
            self.current_height = info.height;
            observers.height_changed(info.height);
        }
    }
}
