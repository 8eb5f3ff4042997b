//! The transport boundary.
//!
//! A transport moves [`Request`]s to the engine and hands back whatever the
//! engine sends. It knows nothing about commands, promises or ownership; the
//! core drives it from two contexts: the issuing context calls [`Transport::send`]
//! and a single reader thread calls [`Transport::recv`] in a loop.

use std::time::Duration;

use crate::error::ApiResult;
use crate::message::{Incoming, Request};

/// Connection to a forwarding engine.
pub trait Transport: Send + Sync {
    /// Attempts to open a session. One attempt only; the caller decides
    /// whether and how often to retry.
    fn connect(&self) -> ApiResult<()>;

    /// Closes the session. Idempotent.
    fn disconnect(&self);

    /// Returns true if a session is open.
    fn is_connected(&self) -> bool;

    /// Sends a request tagged with `context`.
    fn send(&self, context: u32, request: Request) -> ApiResult<()>;

    /// Waits up to `timeout` for the next inbound message.
    fn recv(&self, timeout: Duration) -> Option<Incoming>;
}
