//! Per-type listeners invoked for bulk populate and replay.

use log::{debug, info};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Dependency tier of an entity type. Lower tiers are populated and
/// replayed first so higher tiers can reference their handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    Interface,
    ForwardingDomain,
    Tunnel,
    Acl,
    Binding,
    Global,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dependency::Interface => "interface",
            Dependency::ForwardingDomain => "forwarding-domain",
            Dependency::Tunnel => "tunnel",
            Dependency::Acl => "acl",
            Dependency::Binding => "binding",
            Dependency::Global => "global",
        };
        write!(f, "{}", s)
    }
}

/// Hooks one entity type provides for bulk operations.
///
/// # Thread Safety
///
/// Listeners are shared process-wide and must be `Send + Sync`. They are
/// always called without any registry lock held.
pub trait Listener: Send + Sync {
    /// Returns the dependency tier of this listener's type.
    fn order(&self) -> Dependency;

    /// Returns the name of this listener (for logging and `show`).
    fn name(&self) -> &str;

    /// Reads the engine's current state and commits it under `key`.
    fn handle_populate(&self, key: &str);

    /// Enqueues recreation of every live instance.
    fn handle_replay(&self);

    /// Returns a textual dump of the type's store.
    fn show(&self) -> String {
        String::new()
    }
}

static LISTENERS: Lazy<RwLock<BTreeMap<Dependency, Vec<Arc<dyn Listener>>>>> =
    Lazy::new(|| RwLock::new(BTreeMap::new()));

/// Adds a listener. Listeners of the same tier run in registration order.
pub fn register_listener(listener: Arc<dyn Listener>) {
    info!(
        "Registered listener {} at tier {}",
        listener.name(),
        listener.order()
    );
    LISTENERS
        .write()
        .entry(listener.order())
        .or_default()
        .push(listener);
}

/// Removes every listener named `name`.
pub fn unregister_listener(name: &str) {
    let mut listeners = LISTENERS.write();
    for tier in listeners.values_mut() {
        tier.retain(|l| l.name() != name);
    }
    listeners.retain(|_, tier| !tier.is_empty());
}

/// Removes every listener.
pub fn clear() {
    LISTENERS.write().clear();
}

/// Returns all listeners in tier order.
pub fn listeners() -> Vec<Arc<dyn Listener>> {
    LISTENERS.read().values().flatten().cloned().collect()
}

/// Runs every listener's populate, lowest tier first.
pub fn populate(key: &str) {
    for listener in listeners() {
        debug!("populate: {} ({})", listener.name(), listener.order());
        listener.handle_populate(key);
    }
}

/// Runs every listener's replay, lowest tier first.
pub fn replay() {
    for listener in listeners() {
        debug!("replay: {} ({})", listener.name(), listener.order());
        listener.handle_replay();
    }
}

/// Concatenates every listener's `show`.
pub fn show() -> String {
    listeners()
        .iter()
        .map(|l| format!("{}:\n{}", l.name(), l.show()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serial_test::serial;

    struct Recorder {
        name: &'static str,
        order: Dependency,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Listener for Recorder {
        fn order(&self) -> Dependency {
            self.order
        }

        fn name(&self) -> &str {
            self.name
        }

        fn handle_populate(&self, key: &str) {
            self.log.lock().push(format!("populate {} {}", self.name, key));
        }

        fn handle_replay(&self) {
            self.log.lock().push(format!("replay {}", self.name));
        }
    }

    fn recorder(
        name: &'static str,
        order: Dependency,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Listener> {
        Arc::new(Recorder {
            name,
            order,
            log: log.clone(),
        })
    }

    #[test]
    fn test_dependency_order() {
        assert!(Dependency::Interface < Dependency::ForwardingDomain);
        assert!(Dependency::ForwardingDomain < Dependency::Tunnel);
        assert!(Dependency::Tunnel < Dependency::Acl);
        assert!(Dependency::Acl < Dependency::Binding);
        assert!(Dependency::Binding < Dependency::Global);
    }

    #[test]
    #[serial]
    fn test_replay_in_rank_order_regardless_of_registration() {
        clear();
        let log = Arc::new(Mutex::new(Vec::new()));
        register_listener(recorder("binding", Dependency::Binding, &log));
        register_listener(recorder("interface", Dependency::Interface, &log));

        replay();
        assert_eq!(
            *log.lock(),
            vec!["replay interface".to_string(), "replay binding".to_string()]
        );
        clear();
    }

    #[test]
    #[serial]
    fn test_populate_passes_key() {
        clear();
        let log = Arc::new(Mutex::new(Vec::new()));
        register_listener(recorder("bd", Dependency::ForwardingDomain, &log));
        register_listener(recorder("itf", Dependency::Interface, &log));
        populate("__boot__");
        assert_eq!(
            *log.lock(),
            vec![
                "populate itf __boot__".to_string(),
                "populate bd __boot__".to_string()
            ]
        );
        clear();
    }

    #[test]
    #[serial]
    fn test_unregister() {
        clear();
        let log = Arc::new(Mutex::new(Vec::new()));
        register_listener(recorder("a", Dependency::Acl, &log));
        register_listener(recorder("b", Dependency::Acl, &log));
        unregister_listener("a");
        let names: Vec<String> = listeners().iter().map(|l| l.name().to_string()).collect();
        assert_eq!(names, vec!["b".to_string()]);
        assert_eq!(show(), "b:\n");
        clear();
    }
}
