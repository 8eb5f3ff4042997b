//! Bridge-domain payloads.

use serde::{Deserialize, Serialize};

use crate::types::InterfaceHandle;

/// The engine's default bridge domain. It always exists and is never managed.
pub const DEFAULT_BRIDGE_DOMAIN: u32 = 0;

/// One record of a bridge-domain dump, including its member interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomainDetails {
    pub bd_id: u32,
    pub learn: bool,
    pub members: Vec<InterfaceHandle>,
}

impl BridgeDomainDetails {
    /// Returns true if `sw_if_index` is bound to this bridge domain.
    pub fn has_member(&self, sw_if_index: InterfaceHandle) -> bool {
        self.members.contains(&sw_if_index)
    }
}
