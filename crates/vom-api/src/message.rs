//! Request, reply and event envelopes exchanged with the engine.
//!
//! Requests are tagged by the caller with a 32-bit context; every reply the
//! engine produces for that request carries the same context. Dumps answer
//! with zero or more detail replies followed by one terminating status reply.
//! Events are not tied to any request.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::{BridgeDomainDetails, InterfaceDetails, InterfaceEvent};
use crate::error::RetVal;
use crate::types::InterfaceHandle;

/// A request sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum Request {
    ControlPing,
    AfPacketCreate {
        host_if_name: String,
    },
    AfPacketDelete {
        host_if_name: String,
    },
    CreateLoopback {
        tag: String,
    },
    DeleteLoopback {
        sw_if_index: InterfaceHandle,
    },
    SwInterfaceSetFlags {
        sw_if_index: InterfaceHandle,
        admin_up: bool,
    },
    SwInterfaceDump,
    WantInterfaceEvents {
        enable: bool,
    },
    BridgeDomainAddDel {
        bd_id: u32,
        is_add: bool,
        learn: bool,
    },
    BridgeDomainDump,
    SwInterfaceSetL2Bridge {
        rx_sw_if_index: InterfaceHandle,
        bd_id: u32,
        enable: bool,
    },
}

impl Request {
    /// Returns the message name, used for logging and fault injection.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ControlPing => "control_ping",
            Request::AfPacketCreate { .. } => "af_packet_create",
            Request::AfPacketDelete { .. } => "af_packet_delete",
            Request::CreateLoopback { .. } => "create_loopback",
            Request::DeleteLoopback { .. } => "delete_loopback",
            Request::SwInterfaceSetFlags { .. } => "sw_interface_set_flags",
            Request::SwInterfaceDump => "sw_interface_dump",
            Request::WantInterfaceEvents { .. } => "want_interface_events",
            Request::BridgeDomainAddDel { .. } => "bridge_domain_add_del",
            Request::BridgeDomainDump => "bridge_domain_dump",
            Request::SwInterfaceSetL2Bridge { .. } => "sw_interface_set_l2_bridge",
        }
    }

    /// Returns true if the request is answered by a stream of details.
    pub fn is_dump(&self) -> bool {
        matches!(self, Request::SwInterfaceDump | Request::BridgeDomainDump)
    }

    /// Returns true if the request changes forwarding state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Request::ControlPing
                | Request::SwInterfaceDump
                | Request::BridgeDomainDump
                | Request::WantInterfaceEvents { .. }
        )
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::AfPacketCreate { host_if_name } | Request::AfPacketDelete { host_if_name } => {
                write!(f, "{}({})", self.kind(), host_if_name)
            }
            Request::CreateLoopback { tag } => write!(f, "{}({})", self.kind(), tag),
            Request::DeleteLoopback { sw_if_index } => write!(f, "{}({})", self.kind(), sw_if_index),
            Request::SwInterfaceSetFlags {
                sw_if_index,
                admin_up,
            } => write!(
                f,
                "{}({}, {})",
                self.kind(),
                sw_if_index,
                if *admin_up { "up" } else { "down" }
            ),
            Request::WantInterfaceEvents { enable } => write!(f, "{}({})", self.kind(), enable),
            Request::BridgeDomainAddDel { bd_id, is_add, .. } => write!(
                f,
                "{}({}, {})",
                self.kind(),
                bd_id,
                if *is_add { "add" } else { "del" }
            ),
            Request::SwInterfaceSetL2Bridge {
                rx_sw_if_index,
                bd_id,
                enable,
            } => write!(
                f,
                "{}({} -> {}, {})",
                self.kind(),
                rx_sw_if_index,
                bd_id,
                if *enable { "bind" } else { "unbind" }
            ),
            Request::ControlPing | Request::SwInterfaceDump | Request::BridgeDomainDump => {
                write!(f, "{}", self.kind())
            }
        }
    }
}

/// A reply received from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum Reply {
    Status {
        retval: i32,
    },
    InterfaceCreated {
        retval: i32,
        sw_if_index: InterfaceHandle,
    },
    InterfaceDetails(InterfaceDetails),
    BridgeDomainDetails(BridgeDomainDetails),
}

impl Reply {
    /// Creates a status reply from a return code.
    pub fn status(retval: RetVal) -> Self {
        Reply::Status {
            retval: retval.as_raw(),
        }
    }

    /// Returns the raw return value. Detail records always report success.
    pub fn retval(&self) -> i32 {
        match self {
            Reply::Status { retval } | Reply::InterfaceCreated { retval, .. } => *retval,
            Reply::InterfaceDetails(_) | Reply::BridgeDomainDetails(_) => 0,
        }
    }

    /// Returns true if this reply is one record of a dump.
    pub fn is_details(&self) -> bool {
        matches!(self, Reply::InterfaceDetails(_) | Reply::BridgeDomainDetails(_))
    }
}

/// An asynchronous notification not tied to any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum Event {
    Interface(InterfaceEvent),
}

/// Anything the transport hands to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Reply { context: u32, reply: Reply },
    Event(Event),
}
