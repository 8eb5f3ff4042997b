//! VOM agent - configuration objects and the reconciliation daemon.
//!
//! Owners describe what they want as entities and hand them to the object
//! model in `vom_core`; the entities here know which engine requests move
//! the engine towards that state.
//!
//! # Architecture
//!
//! ```text
//! [desired-state file] ──> [VomDaemon] ──> Om::write / mark / sweep
//!                              │                    │
//!                       liveness + replay     [CmdQueue] ──> [engine]
//!                                                   ↑
//!                      interface / bridge_domain / l2_binding commands
//! ```
//!
//! # Key Components
//!
//! - [`interface::Interface`]: AF_PACKET host interfaces and loopbacks
//! - [`bridge_domain::BridgeDomain`]: L2 flooding domains
//! - [`l2_binding::L2Binding`]: an interface's membership in a bridge domain
//! - [`desired::DesiredState`]: the per-owner desired-state file
//! - [`daemon::VomDaemon`]: boot reconciliation and the liveness loop

pub mod audit;
pub mod bridge_domain;
pub mod daemon;
pub mod desired;
pub mod interface;
pub mod l2_binding;

use std::sync::Arc;

use vom_core::{registry, Listener};

pub use bridge_domain::BridgeDomain;
pub use daemon::{DaemonError, VomDaemon, VomDaemonConfig};
pub use desired::{DesiredState, DesiredStateError};
pub use interface::{AdminState, Interface};
pub use l2_binding::L2Binding;

/// Registers the populate/replay listeners of every built-in type. Listeners
/// already registered under the same name are left alone.
pub fn register_listeners() {
    let builtin: [Arc<dyn Listener>; 3] = [
        Arc::new(interface::InterfaceListener),
        Arc::new(bridge_domain::BridgeDomainListener),
        Arc::new(l2_binding::L2BindingListener),
    ];
    let registered: Vec<String> = registry::listeners()
        .iter()
        .map(|l| l.name().to_string())
        .collect();
    for listener in builtin {
        if !registered.iter().any(|name| name == listener.name()) {
            registry::register_listener(listener);
        }
    }
}
