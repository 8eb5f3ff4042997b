use log::{debug, info, warn};
use std::sync::Arc;

use vom_api::DEFAULT_BRIDGE_DOMAIN;
use vom_core::{hw, Dependency, Listener, Om};

use super::entity::L2Binding;
use crate::bridge_domain::{self, BridgeDomain};
use crate::interface::Interface;

pub struct L2BindingListener;

impl Listener for L2BindingListener {
    fn order(&self) -> Dependency {
        Dependency::Binding
    }

    fn name(&self) -> &str {
        "l2-binding"
    }

    /// Bindings are read from the bridge-domain member lists, so this runs
    /// after interfaces and bridge domains have been imported.
    fn handle_populate(&self, key: &str) {
        let dump = Arc::new(bridge_domain::dump_cmd());
        hw::enqueue_shared(dump.clone());
        hw::write();
        if !dump.rc().is_ok() {
            warn!("l2-binding populate: dump failed: {}", dump.rc());
            return;
        }

        let mut found = 0;
        while let Some(details) = dump.pop() {
            if details.bd_id == DEFAULT_BRIDGE_DOMAIN {
                continue;
            }
            let Some(bd) = BridgeDomain::find(details.bd_id) else {
                debug!("l2-binding populate: bd {} not imported", details.bd_id);
                continue;
            };
            for member in &details.members {
                match Interface::find_by_handle(*member) {
                    Some(itf) => {
                        Om::commit(key, &L2Binding::new(&itf, &bd));
                        found += 1;
                    }
                    None => debug!("l2-binding populate: no interface {}", member),
                }
            }
        }
        info!("l2-binding populate: {} binding(s) under {}", found, key);
    }

    fn handle_replay(&self) {
        L2Binding::replay_all();
    }

    fn show(&self) -> String {
        L2Binding::dump()
    }
}
