//! Interface payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::InterfaceHandle;

/// Interface type as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    /// Host interface attached through an AF_PACKET socket.
    AfPacket,
    /// Software loopback.
    Loopback,
    /// The engine's built-in local interface. Never managed.
    Local,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceType::AfPacket => "af_packet",
            InterfaceType::Loopback => "loopback",
            InterfaceType::Local => "local",
        };
        write!(f, "{}", s)
    }
}

/// One record of an interface dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDetails {
    pub sw_if_index: InterfaceHandle,
    pub name: String,
    pub interface_type: InterfaceType,
    pub admin_up: bool,
    pub link_up: bool,
}

/// Asynchronous interface state notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceEvent {
    pub sw_if_index: InterfaceHandle,
    pub admin_up: bool,
    pub link_up: bool,
    pub deleted: bool,
}
