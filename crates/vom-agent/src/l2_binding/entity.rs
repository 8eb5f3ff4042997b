//! The L2 binding entity: an interface's membership in a bridge domain.

use log::info;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use vom_core::{hw, Entity, HwItem, Object, SingularDb};

use super::cmds::BindCmd;
use crate::bridge_domain::BridgeDomain;
use crate::interface::Interface;

static L2_BINDINGS: Lazy<SingularDb<String, L2Binding>> = Lazy::new(SingularDb::new);

/// Binds an interface into a bridge domain. Keyed by the interface name, so
/// an interface has at most one binding.
///
/// The binding holds its interface and bridge domain, which therefore
/// outlive it: both are only torn down after the binding is.
pub struct L2Binding {
    itf: Arc<Interface>,
    bd: RwLock<Arc<BridgeDomain>>,
    binding: HwItem<bool>,
}

impl L2Binding {
    pub fn new(itf: &Interface, bd: &BridgeDomain) -> Self {
        Self {
            itf: itf.singular(),
            bd: RwLock::new(bd.singular()),
            binding: HwItem::new(true),
        }
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.itf
    }

    pub fn bridge_domain(&self) -> Arc<BridgeDomain> {
        self.bd.read().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.binding.is_configured()
    }

    pub fn find(itf_name: &str) -> Option<Arc<L2Binding>> {
        L2_BINDINGS.find(&itf_name.to_string())
    }

    pub fn dump() -> String {
        L2_BINDINGS.dump()
    }

    pub(crate) fn replay_all() {
        L2_BINDINGS.replay();
    }

    fn bind_cmd(&self, bd_id: u32) -> BindCmd {
        BindCmd::bind(self.itf.handle_item(), bd_id, self.binding.share())
    }
}

impl Clone for L2Binding {
    fn clone(&self) -> Self {
        Self {
            itf: Arc::clone(&self.itf),
            bd: RwLock::new(self.bridge_domain()),
            binding: self.binding.clone(),
        }
    }
}

impl Object for L2Binding {
    fn sweep(&self) {
        if self.binding.is_configured() {
            hw::enqueue(BindCmd::unbind(
                self.itf.handle_item(),
                self.bd.read().id(),
                self.binding.share(),
            ));
        }
    }

    fn replay(&self) {
        let bd_id = self.bd.read().id();
        hw::enqueue(self.bind_cmd(bd_id));
    }
}

impl Entity for L2Binding {
    type Key = String;

    fn key(&self) -> String {
        self.itf.name().to_string()
    }

    fn singular(&self) -> Arc<Self> {
        L2_BINDINGS.find_or_add(self.key(), self)
    }

    fn update(&self, desired: &Self) {
        let want = desired.bridge_domain();
        let previous = {
            let mut bd = self.bd.write();
            if bd.id() == want.id() {
                None
            } else {
                Some(std::mem::replace(&mut *bd, Arc::clone(&want)))
            }
        };

        if let Some(previous) = &previous {
            info!(
                "{}: moving from bd {} to bd {}",
                self.itf.name(),
                previous.id(),
                want.id()
            );
        }
        if previous.is_some() || !self.binding.is_configured() {
            hw::enqueue(self.bind_cmd(want.id()));
        }
        // an abandoned bridge domain is torn down after the move
        drop(previous);
    }
}

impl Drop for L2Binding {
    fn drop(&mut self) {
        self.sweep();
        L2_BINDINGS.release(&self.key(), self);
    }
}

impl fmt::Display for L2Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "l2-binding:[{} bd:{} {}]",
            self.itf.name(),
            self.bd.read().id(),
            self.binding
        )
    }
}
