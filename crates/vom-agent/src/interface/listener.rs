//! Populate and replay hooks for interfaces.

use log::{info, warn};
use std::sync::Arc;

use vom_api::InterfaceType;
use vom_core::{hw, Dependency, Listener, Om};

use super::cmds::dump_cmd;
use super::entity::Interface;

pub struct InterfaceListener;

impl Listener for InterfaceListener {
    fn order(&self) -> Dependency {
        Dependency::Interface
    }

    fn name(&self) -> &str {
        "interface"
    }

    fn handle_populate(&self, key: &str) {
        let dump = Arc::new(dump_cmd());
        hw::enqueue_shared(dump.clone());
        hw::write();
        if !dump.rc().is_ok() {
            warn!("interface populate: dump failed: {}", dump.rc());
            return;
        }

        let mut found = 0;
        while let Some(details) = dump.pop() {
            if details.interface_type == InterfaceType::Local {
                continue;
            }
            let itf = Interface::discovered(&details);
            Om::commit(key, &itf);
            found += 1;
        }
        info!("interface populate: {} interface(s) under {}", found, key);
    }

    fn handle_replay(&self) {
        Interface::replay_all();
    }

    fn show(&self) -> String {
        Interface::dump()
    }
}
