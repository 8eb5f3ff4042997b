use log::{info, warn};
use std::sync::Arc;

use vom_api::DEFAULT_BRIDGE_DOMAIN;
use vom_core::{hw, Dependency, Listener, Om};

use super::cmds::dump_cmd;
use super::entity::BridgeDomain;

pub struct BridgeDomainListener;

impl Listener for BridgeDomainListener {
    fn order(&self) -> Dependency {
        Dependency::ForwardingDomain
    }

    fn name(&self) -> &str {
        "bridge-domain"
    }

    fn handle_populate(&self, key: &str) {
        let dump = Arc::new(dump_cmd());
        hw::enqueue_shared(dump.clone());
        hw::write();
        if !dump.rc().is_ok() {
            warn!("bridge-domain populate: dump failed: {}", dump.rc());
            return;
        }

        let mut found = 0;
        while let Some(details) = dump.pop() {
            if details.bd_id == DEFAULT_BRIDGE_DOMAIN {
                continue;
            }
            Om::commit(key, &BridgeDomain::discovered(&details));
            found += 1;
        }
        info!("bridge-domain populate: {} domain(s) under {}", found, key);
    }

    fn handle_replay(&self) {
        BridgeDomain::replay_all();
    }

    fn show(&self) -> String {
        BridgeDomain::dump()
    }
}
