//! The interface entity.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use vom_api::{InterfaceDetails, InterfaceHandle, InterfaceType};
use vom_core::{hw, Entity, HwItem, Object, SingularDb};

use super::cmds::{CreateCmd, DeleteCmd, StateChangeCmd};
use super::types::AdminState;

static INTERFACES: Lazy<SingularDb<String, Interface>> = Lazy::new(SingularDb::new);

/// Engine handle to interface name, kept by the create and delete commands.
/// Lookups never touch the instance store.
static NAMES: Lazy<RwLock<HashMap<InterfaceHandle, String>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn record_handle(name: &str, handle: InterfaceHandle) {
    let mut names = NAMES.write();
    names.retain(|_, n| n != name);
    names.insert(handle, name.to_string());
}

pub(crate) fn forget_handle(handle: InterfaceHandle) {
    NAMES.write().remove(&handle);
}

/// A host (AF_PACKET) or loopback interface, keyed by name.
#[derive(Clone)]
pub struct Interface {
    name: String,
    itype: InterfaceType,
    hdl: HwItem<InterfaceHandle>,
    state: HwItem<AdminState>,
}

impl Interface {
    pub fn new(name: impl Into<String>, itype: InterfaceType, state: AdminState) -> Self {
        Self {
            name: name.into(),
            itype,
            hdl: HwItem::new(InterfaceHandle::INVALID),
            state: HwItem::new(state),
        }
    }

    pub fn af_packet(name: impl Into<String>, state: AdminState) -> Self {
        Self::new(name, InterfaceType::AfPacket, state)
    }

    pub fn loopback(name: impl Into<String>, state: AdminState) -> Self {
        Self::new(name, InterfaceType::Loopback, state)
    }

    /// Builds the desired state matching an interface found in the engine.
    pub fn discovered(details: &InterfaceDetails) -> Self {
        let itf = Self::new(
            details.name.clone(),
            details.interface_type,
            AdminState::from(details.admin_up),
        );
        itf.hdl.set_data(details.sw_if_index);
        record_handle(&details.name, details.sw_if_index);
        itf
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn itype(&self) -> InterfaceType {
        self.itype
    }

    /// Returns the engine handle; `INVALID` until created.
    pub fn handle(&self) -> InterfaceHandle {
        self.hdl.data()
    }

    pub fn admin_state(&self) -> AdminState {
        self.state.data()
    }

    pub fn is_configured(&self) -> bool {
        self.hdl.is_configured()
    }

    /// The handle cell, for commands of dependent objects.
    pub(crate) fn handle_item(&self) -> HwItem<InterfaceHandle> {
        self.hdl.share()
    }

    pub fn find(name: &str) -> Option<Arc<Interface>> {
        INTERFACES.find(&name.to_string())
    }

    pub fn find_by_handle(handle: InterfaceHandle) -> Option<Arc<Interface>> {
        INTERFACES
            .instances()
            .into_iter()
            .find(|itf| itf.is_configured() && itf.handle() == handle)
    }

    /// Resolves a handle to the name of the interface created with it. Safe
    /// on the reader thread: no instance is kept alive by the lookup.
    pub fn name_of(handle: InterfaceHandle) -> Option<String> {
        NAMES.read().get(&handle).cloned()
    }

    pub fn dump() -> String {
        INTERFACES.dump()
    }

    pub(crate) fn replay_all() {
        // handles of the previous session are void
        NAMES.write().clear();
        INTERFACES.replay();
    }
}

impl Object for Interface {
    fn sweep(&self) {
        if !self.hdl.is_configured() {
            return;
        }
        if self.state.is_configured() && self.state.data().is_up() {
            hw::enqueue(StateChangeCmd::new(
                HwItem::new(AdminState::Down),
                self.hdl.share(),
            ));
        }
        hw::enqueue(DeleteCmd::new(&self.name, self.itype, self.hdl.share()));
    }

    // the engine is empty: a create still unconfirmed is reissued too
    fn replay(&self) {
        hw::enqueue(CreateCmd::new(&self.name, self.itype, self.hdl.share()));
        hw::enqueue(StateChangeCmd::new(self.state.share(), self.hdl.share()));
    }
}

impl Entity for Interface {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn singular(&self) -> Arc<Self> {
        INTERFACES.find_or_add(self.key(), self)
    }

    fn update(&self, desired: &Self) {
        if !self.hdl.is_configured() {
            hw::enqueue(CreateCmd::new(&self.name, self.itype, self.hdl.share()));
        }
        if self.state.update(&desired.state) {
            hw::enqueue(StateChangeCmd::new(self.state.share(), self.hdl.share()));
        }
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        self.sweep();
        INTERFACES.release(&self.name, self);
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "interface:[{} type:{} hdl:{} state:{}]",
            self.name, self.itype, self.hdl, self.state
        )
    }
}
