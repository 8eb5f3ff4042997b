//! The bridge-domain entity.

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

use vom_api::BridgeDomainDetails;
use vom_core::{hw, Entity, HwItem, Object, SingularDb};

use super::cmds::{CreateCmd, DeleteCmd};

static BRIDGE_DOMAINS: Lazy<SingularDb<u32, BridgeDomain>> = Lazy::new(SingularDb::new);

/// A layer-2 flooding domain, keyed by its numeric id.
#[derive(Clone)]
pub struct BridgeDomain {
    id: HwItem<u32>,
    learn: HwItem<bool>,
}

impl BridgeDomain {
    /// A bridge domain with MAC learning enabled.
    pub fn new(id: u32) -> Self {
        Self::with_learning(id, true)
    }

    pub fn with_learning(id: u32, learn: bool) -> Self {
        Self {
            id: HwItem::new(id),
            learn: HwItem::new(learn),
        }
    }

    pub fn discovered(details: &BridgeDomainDetails) -> Self {
        Self::with_learning(details.bd_id, details.learn)
    }

    pub fn id(&self) -> u32 {
        self.id.data()
    }

    pub fn learn(&self) -> bool {
        self.learn.data()
    }

    pub fn is_configured(&self) -> bool {
        self.id.is_configured()
    }

    pub fn find(id: u32) -> Option<Arc<BridgeDomain>> {
        BRIDGE_DOMAINS.find(&id)
    }

    pub fn dump() -> String {
        BRIDGE_DOMAINS.dump()
    }

    pub(crate) fn replay_all() {
        BRIDGE_DOMAINS.replay();
    }
}

impl Object for BridgeDomain {
    fn sweep(&self) {
        if self.id.is_configured() {
            hw::enqueue(DeleteCmd::new(self.id.share()));
        }
    }

    fn replay(&self) {
        hw::enqueue(CreateCmd::new(self.id.share(), self.learn.share()));
    }
}

impl Entity for BridgeDomain {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id.data()
    }

    fn singular(&self) -> Arc<Self> {
        BRIDGE_DOMAINS.find_or_add(self.key(), self)
    }

    fn update(&self, desired: &Self) {
        let learn_changed = self.learn.update(&desired.learn);
        if !self.id.is_configured() || learn_changed {
            hw::enqueue(CreateCmd::new(self.id.share(), self.learn.share()));
        }
    }
}

impl Drop for BridgeDomain {
    fn drop(&mut self) {
        self.sweep();
        BRIDGE_DOMAINS.release(&self.id.data(), self);
    }
}

impl fmt::Display for BridgeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge-domain:[{} learn:{}]", self.id, self.learn)
    }
}
