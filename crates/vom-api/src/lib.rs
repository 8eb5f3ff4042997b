//! Forwarding-engine API surface for VOM.
//!
//! This crate holds everything the object model needs to talk to a
//! forwarding engine without knowing how the bytes travel:
//!
//! - [`types`]: type-safe engine handles
//! - [`error`]: engine return codes and transport errors
//! - [`api`]: per-feature detail and event payloads
//! - [`message`]: request/reply/event envelopes
//! - [`transport`]: the [`Transport`] trait the core drives
//! - [`sim`]: an in-process simulated engine implementing [`Transport`]
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vom_api::{Incoming, Request, SimEngine, Transport};
//!
//! let engine = SimEngine::new();
//! engine.connect().unwrap();
//! engine.send(1, Request::ControlPing).unwrap();
//! match engine.recv(Duration::from_millis(100)) {
//!     Some(Incoming::Reply { context, reply }) => {
//!         assert_eq!(context, 1);
//!         assert_eq!(reply.retval(), 0);
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod api;
pub mod error;
pub mod message;
pub mod sim;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use api::{
    BridgeDomainDetails, InterfaceDetails, InterfaceEvent, InterfaceType, DEFAULT_BRIDGE_DOMAIN,
};
pub use error::{ApiError, ApiResult, RetVal};
pub use message::{Event, Incoming, Reply, Request};
pub use sim::SimEngine;
pub use transport::Transport;
pub use types::{Handle, HandleKind, InterfaceHandle, InterfaceKind, RawHandle};
