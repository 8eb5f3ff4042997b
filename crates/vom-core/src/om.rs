//! The object model: owner-scoped reconciliation.
//!
//! Owners express desired state with [`Om::write`]; the model resolves each
//! object to its canonical instance, lets it enqueue the minimal commands,
//! records the owner's claim and flushes the queue. Claims are dropped with
//! [`Om::remove`] or reconciled in bulk with a [`Om::mark`] / [`Om::sweep`]
//! epoch. An instance no owner (or other instance) references any more is
//! dropped, and its `Drop` enqueues its teardown.

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::hw;
use crate::key_db::KeyDb;
use crate::object::{Entity, Object};
use crate::rc::ResultCode;
use crate::registry;

static KEY_DB: Lazy<Mutex<KeyDb>> = Lazy::new(|| Mutex::new(KeyDb::new()));

/// Entry points of the object model.
pub struct Om;

impl Om {
    /// Reconciles `obj` and records that `key` claims it.
    pub fn write<T: Entity>(key: &str, obj: &T) -> ResultCode {
        let instance = obj.singular();
        instance.update(obj);

        let instance: Arc<dyn Object> = instance;
        // an already-claimed instance hands back the extra reference
        let unused = KEY_DB.lock().find(key).claim(instance);
        drop(unused);

        hw::write()
    }

    /// Like [`Om::write`] but with the queue disabled, so only the model's
    /// bookkeeping runs. Used to record state discovered in the engine.
    pub fn commit<T: Entity>(key: &str, obj: &T) -> ResultCode {
        let was_enabled = hw::is_enabled();
        hw::disable();
        let rc = Om::write(key, obj);
        if was_enabled {
            hw::enable();
        }
        rc
    }

    /// Drops every claim of `key` and tears down what is no longer wanted.
    pub fn remove(key: &str) -> ResultCode {
        let released = KEY_DB.lock().remove(key);
        if let Some(list) = &released {
            info!("remove: {} released {} object(s)", key, list.len());
        }
        drop(released);
        hw::write()
    }

    /// Marks every claim of `key` stale.
    pub fn mark(key: &str) {
        let mut db = KEY_DB.lock();
        let list = db.find(key);
        debug!("mark: {} ({} object(s))", key, list.len());
        list.mark();
    }

    /// Drops the claims of `key` still stale since the last [`Om::mark`].
    pub fn sweep(key: &str) -> ResultCode {
        let stale = {
            let mut db = KEY_DB.lock();
            let list = db.find(key);
            let stale = list.take_stale();
            if list.is_empty() {
                db.remove(key);
            }
            stale
        };
        info!("sweep: {} dropped {} stale object(s)", key, stale.len());
        drop(stale);
        hw::write()
    }

    /// Imports the engine's current state under `key` without mutating it.
    pub fn populate(key: &str) {
        info!("populate: {}", key);
        hw::disable();
        registry::populate(key);
        hw::enable();
    }

    /// Re-issues every live instance's state into an engine that lost it.
    pub fn replay() -> ResultCode {
        info!("replay");
        registry::replay();
        hw::write()
    }

    /// Returns the owner keys with claims.
    pub fn keys() -> Vec<String> {
        KEY_DB.lock().keys()
    }

    /// Returns the number of instances `key` claims.
    pub fn claims(key: &str) -> usize {
        KEY_DB.lock().get(key).map_or(0, |list| list.len())
    }

    /// One line per claim of `key`.
    pub fn dump(key: &str) -> String {
        let db = KEY_DB.lock();
        let mut out = String::new();
        if let Some(list) = db.get(key) {
            for r in list.iter() {
                let _ = writeln!(out, "  {}", r);
            }
        }
        out
    }
}

/// A mark/sweep epoch: marks on creation, sweeps on [`MarkAndSweep::finish`]
/// or, failing that, on drop.
pub struct MarkAndSweep {
    key: String,
    swept: bool,
}

impl MarkAndSweep {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Om::mark(&key);
        Self { key, swept: false }
    }

    /// Ends the epoch and returns the result of the teardown batch.
    pub fn finish(mut self) -> ResultCode {
        self.swept = true;
        Om::sweep(&self.key)
    }
}

impl Drop for MarkAndSweep {
    fn drop(&mut self) {
        if !self.swept {
            let rc = Om::sweep(&self.key);
            if !rc.is_ok() && rc != ResultCode::Noop {
                warn!("sweep: {} returned {}", self.key, rc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{rpc, Cmd};
    use crate::connection::{Connection, ConnectionConfig};
    use crate::item::HwItem;
    use crate::queue::CmdQueue;
    use crate::registry::{Dependency, Listener};
    use crate::singular_db::SingularDb;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::fmt;
    use std::time::Duration;
    use vom_api::{InterfaceHandle, Reply, Request, RetVal, SimEngine};

    static WIDGETS: Lazy<SingularDb<String, Widget>> = Lazy::new(SingularDb::new);

    #[derive(Clone)]
    struct Widget {
        name: String,
        hdl: HwItem<InterfaceHandle>,
        up: HwItem<bool>,
    }

    impl Widget {
        fn new(name: &str, up: bool) -> Self {
            Self {
                name: name.to_string(),
                hdl: HwItem::new(InterfaceHandle::INVALID),
                up: HwItem::new(up),
            }
        }
    }

    impl fmt::Display for Widget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "widget:[{} {}]", self.name, self.hdl)
        }
    }

    impl Object for Widget {
        fn sweep(&self) {
            if self.hdl.is_configured() {
                hw::enqueue(DeleteWidget {
                    hdl: self.hdl.share(),
                });
            }
        }

        fn replay(&self) {
            if self.hdl.is_configured() {
                hw::enqueue(CreateWidget {
                    name: self.name.clone(),
                    hdl: self.hdl.share(),
                });
                hw::enqueue(SetWidget {
                    hdl: self.hdl.share(),
                    up: self.up.share(),
                });
            }
        }
    }

    impl Entity for Widget {
        type Key = String;

        fn key(&self) -> String {
            self.name.clone()
        }

        fn singular(&self) -> Arc<Self> {
            WIDGETS.find_or_add(self.key(), self)
        }

        fn update(&self, desired: &Self) {
            if !self.hdl.is_configured() {
                hw::enqueue(CreateWidget {
                    name: self.name.clone(),
                    hdl: self.hdl.share(),
                });
            }
            if self.up.update(&desired.up) {
                hw::enqueue(SetWidget {
                    hdl: self.hdl.share(),
                    up: self.up.share(),
                });
            }
        }
    }

    impl Drop for Widget {
        fn drop(&mut self) {
            self.sweep();
            WIDGETS.release(&self.name, self);
        }
    }

    struct CreateWidget {
        name: String,
        hdl: HwItem<InterfaceHandle>,
    }

    impl Cmd for CreateWidget {
        fn issue(&self, conn: &Connection) -> ResultCode {
            let (rc, reply) = rpc(
                conn,
                Request::CreateLoopback {
                    tag: self.name.clone(),
                },
            );
            match reply {
                Some(Reply::InterfaceCreated { sw_if_index, .. }) if rc.is_ok() => {
                    self.hdl.set_with(sw_if_index, rc)
                }
                _ => self.hdl.set(rc),
            }
            rc
        }

        fn succeeded(&self) {
            self.hdl.set(ResultCode::Ok);
        }
    }

    impl fmt::Display for CreateWidget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "widget-create: {}", self.name)
        }
    }

    struct SetWidget {
        hdl: HwItem<InterfaceHandle>,
        up: HwItem<bool>,
    }

    impl Cmd for SetWidget {
        fn issue(&self, conn: &Connection) -> ResultCode {
            let (rc, _) = rpc(
                conn,
                Request::SwInterfaceSetFlags {
                    sw_if_index: self.hdl.data(),
                    admin_up: self.up.data(),
                },
            );
            self.up.set(rc);
            rc
        }

        fn succeeded(&self) {
            self.up.set(ResultCode::Ok);
        }
    }

    impl fmt::Display for SetWidget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "widget-set: {} {}", self.hdl, self.up)
        }
    }

    struct DeleteWidget {
        hdl: HwItem<InterfaceHandle>,
    }

    impl Cmd for DeleteWidget {
        fn issue(&self, conn: &Connection) -> ResultCode {
            let (rc, _) = rpc(
                conn,
                Request::DeleteLoopback {
                    sw_if_index: self.hdl.data(),
                },
            );
            rc
        }
    }

    impl fmt::Display for DeleteWidget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "widget-delete: {}", self.hdl)
        }
    }

    struct WidgetListener;

    impl Listener for WidgetListener {
        fn order(&self) -> Dependency {
            Dependency::Interface
        }

        fn name(&self) -> &str {
            "widget"
        }

        fn handle_populate(&self, key: &str) {
            let w = Widget::new("boot-widget", true);
            w.hdl.set_data(InterfaceHandle::new(42));
            Om::commit(key, &w);
        }

        fn handle_replay(&self) {
            WIDGETS.replay();
        }

        fn show(&self) -> String {
            WIDGETS.dump()
        }
    }

    fn install() -> Arc<SimEngine> {
        let engine = Arc::new(SimEngine::new());
        let conn = Connection::with_config(
            engine.clone(),
            ConnectionConfig {
                rpc_timeout: Duration::from_millis(200),
                dump_timeout: Duration::from_millis(200),
                connect_retry_interval: Duration::from_millis(1),
                reader_poll_interval: Duration::from_millis(5),
            },
        );
        conn.connect();
        hw::init(CmdQueue::new(conn));
        engine
    }

    fn create(tag: &str) -> Request {
        Request::CreateLoopback { tag: tag.into() }
    }

    fn set(index: u32, up: bool) -> Request {
        Request::SwInterfaceSetFlags {
            sw_if_index: InterfaceHandle::new(index),
            admin_up: up,
        }
    }

    fn delete(index: u32) -> Request {
        Request::DeleteLoopback {
            sw_if_index: InterfaceHandle::new(index),
        }
    }

    #[test]
    #[serial]
    fn test_write_creates_then_is_minimal() {
        let engine = install();
        assert_eq!(Om::write("A", &Widget::new("w-min", true)), ResultCode::Ok);
        assert_eq!(engine.mutations(), vec![create("w-min"), set(1, true)]);

        engine.clear_requests();
        assert_eq!(Om::write("A", &Widget::new("w-min", true)), ResultCode::Ok);
        assert!(engine.requests().is_empty());

        Om::remove("A");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_shared_claim_survives_one_owner() {
        let engine = install();
        Om::write("A", &Widget::new("w-shared", false));
        Om::write("B", &Widget::new("w-shared", false));
        engine.clear_requests();

        Om::remove("A");
        assert!(engine.mutations().is_empty());
        assert!(WIDGETS.find(&"w-shared".to_string()).is_some());

        Om::remove("B");
        assert_eq!(engine.mutations(), vec![delete(1)]);
        assert!(WIDGETS.find(&"w-shared".to_string()).is_none());
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_mark_sweep() {
        let engine = install();
        Om::write("A", &Widget::new("w-keep", true));
        Om::write("A", &Widget::new("w-drop", true));
        engine.clear_requests();

        Om::mark("A");
        Om::write("A", &Widget::new("w-keep", true));
        assert!(engine.requests().is_empty());
        Om::sweep("A");

        assert_eq!(engine.mutations(), vec![delete(2)]);
        assert_eq!(Om::claims("A"), 1);

        Om::mark("A");
        Om::sweep("A");
        assert_eq!(engine.mutations(), vec![delete(2), delete(1)]);
        assert!(!Om::keys().contains(&"A".to_string()));
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_mark_and_sweep_guard() {
        let engine = install();
        Om::write("G", &Widget::new("w-guard", true));
        engine.clear_requests();
        {
            let _epoch = MarkAndSweep::new("G");
        }
        assert_eq!(engine.mutations(), vec![delete(1)]);
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_mark_and_sweep_finish_reports_teardown() {
        let engine = install();
        Om::write("F", &Widget::new("w-finish", false));
        engine.inject_fault("delete_loopback", RetVal::InvalidInterface);

        let epoch = MarkAndSweep::new("F");
        assert_eq!(epoch.finish(), ResultCode::Invalid);
        assert_eq!(Om::claims("F"), 0);

        let epoch = MarkAndSweep::new("F");
        assert_eq!(epoch.finish(), ResultCode::Ok);
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_failed_write_is_retried_by_next_write() {
        let engine = install();
        engine.inject_fault("create_loopback", RetVal::InvalidValue);
        assert_eq!(
            Om::write("A", &Widget::new("w-retry", true)),
            ResultCode::Invalid
        );
        // the state change after the failed create was never sent
        assert_eq!(engine.mutations(), vec![create("w-retry")]);

        engine.clear_requests();
        assert_eq!(Om::write("A", &Widget::new("w-retry", true)), ResultCode::Ok);
        assert_eq!(engine.mutations(), vec![create("w-retry"), set(1, true)]);
        Om::remove("A");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_write_when_disconnected_is_noop() {
        let engine = install();
        engine.restart();
        assert_eq!(Om::write("A", &Widget::new("w-offline", true)), ResultCode::Noop);
        assert!(engine.requests().is_empty());

        hw::connect().unwrap();
        assert_eq!(hw::write(), ResultCode::Ok);
        assert_eq!(engine.mutations(), vec![create("w-offline"), set(1, true)]);
        Om::remove("A");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_populate_sweep_and_replay() {
        let engine = install();
        registry::clear();
        registry::register_listener(Arc::new(WidgetListener));

        Om::populate("__boot__");
        assert!(engine.requests().is_empty());
        assert!(hw::is_enabled());
        assert_eq!(Om::claims("__boot__"), 1);
        assert!(Om::dump("__boot__").contains("boot-widget"));
        assert!(registry::show().contains("boot-widget -> widget:[boot-widget"));

        Om::write("A", &Widget::new("w-replayed", true));
        engine.restart();
        hw::connect().unwrap();
        engine.clear_requests();

        assert_eq!(Om::replay(), ResultCode::Ok);
        // store order: boot-widget, w-replayed
        assert_eq!(
            engine.mutations(),
            vec![
                create("boot-widget"),
                set(1, true),
                create("w-replayed"),
                set(2, true),
            ]
        );

        engine.clear_requests();
        Om::mark("__boot__");
        Om::sweep("__boot__");
        assert_eq!(engine.mutations(), vec![delete(1)]);

        Om::remove("A");
        registry::clear();
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_commit_keeps_queue_state() {
        let engine = install();
        hw::disable();
        Om::commit("C", &Widget::new("w-commit", true));
        assert!(!hw::is_enabled());
        hw::enable();
        Om::commit("C", &Widget::new("w-commit2", true));
        assert!(hw::is_enabled());
        assert!(engine.requests().is_empty());

        // teardown with the queue disabled stays local too
        hw::disable();
        Om::remove("C");
        hw::enable();
        assert!(engine.requests().is_empty());
        hw::shutdown();
    }
}
