//! Per-feature message payloads.
//!
//! Each submodule holds the detail and event records of one engine feature.
//! The request/reply envelopes that carry them live in [`crate::message`].
//!
//! # Available API Modules
//!
//! - [`interface`]: host (AF_PACKET) and loopback interfaces, admin state, events
//! - [`bridge_domain`]: bridge domains and L2 bridge membership

pub mod bridge_domain;
pub mod interface;

pub use bridge_domain::{BridgeDomainDetails, DEFAULT_BRIDGE_DOMAIN};
pub use interface::{InterfaceDetails, InterfaceEvent, InterfaceType};
