//! Interface commands.

use log::{debug, error, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use vom_api::{
    Event, InterfaceDetails, InterfaceEvent, InterfaceHandle, InterfaceType, Reply, Request,
};
use vom_core::{rpc, Cmd, Connection, DumpCmd, HwItem, ResultCode, SubscriptionId};

use super::entity::{forget_handle, record_handle};
use super::types::AdminState;

/// Creates an interface and records the handle the engine assigned.
pub struct CreateCmd {
    name: String,
    itype: InterfaceType,
    hdl: HwItem<InterfaceHandle>,
}

impl CreateCmd {
    pub fn new(name: &str, itype: InterfaceType, hdl: HwItem<InterfaceHandle>) -> Self {
        Self {
            name: name.to_string(),
            itype,
            hdl,
        }
    }
}

impl Cmd for CreateCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let request = match self.itype {
            InterfaceType::AfPacket => Request::AfPacketCreate {
                host_if_name: self.name.clone(),
            },
            InterfaceType::Loopback => Request::CreateLoopback {
                tag: self.name.clone(),
            },
            InterfaceType::Local => {
                error!("{}: local interfaces cannot be created", self.name);
                self.hdl.set(ResultCode::Invalid);
                return ResultCode::Invalid;
            }
        };

        let (rc, reply) = rpc(conn, request);
        match reply {
            Some(Reply::InterfaceCreated { sw_if_index, .. }) if rc.is_ok() => {
                debug!("{}: created as {}", self.name, sw_if_index);
                self.hdl.set_with(sw_if_index, rc);
                record_handle(&self.name, sw_if_index);
            }
            _ => self.hdl.set(rc),
        }
        rc
    }

    fn succeeded(&self) {
        self.hdl.set(ResultCode::Ok);
    }
}

impl fmt::Display for CreateCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "itf-create: {} type:{} {}", self.name, self.itype, self.hdl)
    }
}

/// Deletes an interface.
pub struct DeleteCmd {
    name: String,
    itype: InterfaceType,
    hdl: HwItem<InterfaceHandle>,
}

impl DeleteCmd {
    pub fn new(name: &str, itype: InterfaceType, hdl: HwItem<InterfaceHandle>) -> Self {
        Self {
            name: name.to_string(),
            itype,
            hdl,
        }
    }
}

impl Cmd for DeleteCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let request = match self.itype {
            InterfaceType::AfPacket => Request::AfPacketDelete {
                host_if_name: self.name.clone(),
            },
            _ => Request::DeleteLoopback {
                sw_if_index: self.hdl.data(),
            },
        };
        let (rc, _) = rpc(conn, request);
        if rc.is_ok() {
            forget_handle(self.hdl.data());
            self.hdl.set(ResultCode::Unset);
        }
        rc
    }

    fn succeeded(&self) {
        forget_handle(self.hdl.data());
        self.hdl.set(ResultCode::Unset);
    }
}

impl fmt::Display for DeleteCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "itf-delete: {} {}", self.name, self.hdl)
    }
}

/// Sets the admin state. The handle is read when the command is issued, so
/// it may follow a create queued in the same batch.
pub struct StateChangeCmd {
    state: HwItem<AdminState>,
    hdl: HwItem<InterfaceHandle>,
}

impl StateChangeCmd {
    pub fn new(state: HwItem<AdminState>, hdl: HwItem<InterfaceHandle>) -> Self {
        Self { state, hdl }
    }
}

impl Cmd for StateChangeCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let (rc, _) = rpc(
            conn,
            Request::SwInterfaceSetFlags {
                sw_if_index: self.hdl.data(),
                admin_up: self.state.data().is_up(),
            },
        );
        self.state.set(rc);
        rc
    }

    fn succeeded(&self) {
        self.state.set(ResultCode::Ok);
    }
}

impl fmt::Display for StateChangeCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "itf-state-change: {} hdl:{}", self.state, self.hdl.data())
    }
}

/// Reads every interface the engine knows.
pub fn dump_cmd() -> DumpCmd<InterfaceDetails> {
    DumpCmd::new(Request::SwInterfaceDump, |reply| match reply {
        Reply::InterfaceDetails(details) => Some(details),
        _ => None,
    })
}

/// Receives interface events from the engine.
pub trait InterfaceEventListener: Send + Sync {
    fn handle_interface_event(&self, event: &InterfaceEvent);
}

/// Subscribes to interface events.
///
/// Stays pending in the queue after it is issued; events are delivered on
/// the reader thread until it is dequeued.
pub struct EventsCmd {
    listener: Arc<dyn InterfaceEventListener>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl EventsCmd {
    pub fn new(listener: Arc<dyn InterfaceEventListener>) -> Self {
        Self {
            listener,
            subscription: Mutex::new(None),
        }
    }

    fn unsubscribe(&self, conn: &Connection) {
        if let Some(id) = self.subscription.lock().take() {
            conn.unsubscribe(id);
        }
    }
}

impl Cmd for EventsCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let listener = Arc::clone(&self.listener);
        let id = conn.subscribe(Arc::new(move |event: &Event| match event {
            Event::Interface(ev) => listener.handle_interface_event(ev),
        }));
        *self.subscription.lock() = Some(id);

        let (rc, _) = rpc(conn, Request::WantInterfaceEvents { enable: true });
        if rc.is_ok() {
            ResultCode::InProgress
        } else {
            self.unsubscribe(conn);
            rc
        }
    }

    fn retire(&self, conn: &Connection) {
        self.unsubscribe(conn);
        if conn.is_connected() {
            let (rc, _) = rpc(conn, Request::WantInterfaceEvents { enable: false });
            if !rc.is_ok() {
                warn!("itf-events: unsubscribe returned {}", rc);
            }
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

impl fmt::Display for EventsCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "itf-events")
    }
}
