//! Handler module - packet interpretation and observer delivery.
//!
//! Provides:
//! - [`PacketDispatcher`] - routes decoded packets and keeps the current height
//! - [`ConnectorObserver`] / [`ObserverSet`] - subscriber interface and registry
//! - [`ChannelObserver`] - subscriber that turns callbacks into [`ConnectorEvent`]s

mod dispatcher;
mod observer;

pub use dispatcher::PacketDispatcher;
pub use observer::{ChannelObserver, ConnectorEvent, ConnectorObserver, ObserverSet};
