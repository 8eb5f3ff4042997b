//! VomDaemon implementation.
//!
//! The daemon owns the engine connection for the lifetime of the process:
//! - connects and installs the process-wide command queue
//! - imports the engine's state under the boot key and reconciles it against
//!   the desired-state file
//! - polls the engine and, after the session is lost, reconnects and
//!   replays every live object

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

use vom_api::{InterfaceEvent, Transport};
use vom_core::{hw, registry, CmdId, CmdQueue, Connection, ConnectionConfig, HwError, Om, ResultCode};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::desired::{DesiredState, DesiredStateError};
use crate::interface::{EventsCmd, Interface, InterfaceEventListener};

/// Configuration for the VomDaemon.
#[derive(Debug, Clone)]
pub struct VomDaemonConfig {
    /// Liveness poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Owner key the engine's state is imported under at boot
    pub boot_key: String,
    /// Optional desired-state file applied at boot
    pub desired_state: Option<PathBuf>,
    pub connection: ConnectionConfig,
}

impl Default for VomDaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            boot_key: "__boot__".to_string(),
            desired_state: None,
            connection: ConnectionConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Hw(#[from] HwError),

    #[error(transparent)]
    DesiredState(#[from] DesiredStateError),
}

/// Logs interface events from the engine.
pub struct EventLogger;

impl InterfaceEventListener for EventLogger {
    fn handle_interface_event(&self, event: &InterfaceEvent) {
        let name = Interface::name_of(event.sw_if_index)
            .unwrap_or_else(|| event.sw_if_index.to_string());
        info!(
            "interface {}: admin {} link {}{}",
            name,
            if event.admin_up { "up" } else { "down" },
            if event.link_up { "up" } else { "down" },
            if event.deleted { " (deleted)" } else { "" }
        );

        let record = AuditRecord::new(AuditCategory::EngineEvent, "VomDaemon", "interface_event")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(name)
            .with_object_type("interface")
            .with_details(serde_json::json!({
                "sw_if_index": event.sw_if_index.value(),
                "admin_up": event.admin_up,
                "link_up": event.link_up,
                "deleted": event.deleted,
            }));
        audit_log!(record);
    }
}

/// The reconciliation daemon.
pub struct VomDaemon {
    config: VomDaemonConfig,
    transport: Arc<dyn Transport>,
    events: Arc<dyn InterfaceEventListener>,
    subscription: Mutex<Option<CmdId>>,
    running: AtomicBool,
    shutdown: Notify,
}

impl VomDaemon {
    pub fn new(config: VomDaemonConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_event_listener(config, transport, Arc::new(EventLogger))
    }

    /// Creates a daemon that hands interface events to `events`.
    pub fn with_event_listener(
        config: VomDaemonConfig,
        transport: Arc<dyn Transport>,
        events: Arc<dyn InterfaceEventListener>,
    ) -> Self {
        Self {
            config,
            transport,
            events,
            subscription: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn config(&self) -> &VomDaemonConfig {
        &self.config
    }

    /// Connects, subscribes to events and runs boot reconciliation.
    ///
    /// Blocks until the engine accepts the connection.
    pub fn start(&self) -> Result<ResultCode, DaemonError> {
        info!("Starting VomDaemon");
        let record = AuditRecord::new(AuditCategory::SystemLifecycle, "VomDaemon", "start")
            .with_details(serde_json::json!({
                "boot_key": self.config.boot_key,
                "poll_interval_ms": self.config.poll_interval_ms,
            }));
        audit_log!(record);

        let conn = Connection::with_config(self.transport.clone(), self.config.connection.clone());
        hw::init(CmdQueue::new(conn));
        crate::register_listeners();

        self.connect()?;
        self.subscribe_events();

        let rc = self.boot_reconcile()?;
        let record = AuditRecord::new(AuditCategory::SystemLifecycle, "VomDaemon", "start")
            .with_outcome(if rc.is_ok() {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            })
            .with_details(serde_json::json!({ "result": rc.to_string() }));
        audit_log!(record);
        Ok(rc)
    }

    fn connect(&self) -> Result<(), DaemonError> {
        hw::connect()?;
        info!("Connected to engine");
        audit_log!(
            AuditRecord::new(AuditCategory::Connection, "VomDaemon", "connect")
                .with_outcome(AuditOutcome::Success)
        );
        Ok(())
    }

    fn subscribe_events(&self) {
        let id = hw::enqueue(EventsCmd::new(Arc::clone(&self.events)));
        let rc = hw::write();
        if !rc.is_ok() {
            warn!("Interface event subscription returned {}", rc);
        }
        let previous = std::mem::replace(&mut *self.subscription.lock(), id);
        if let Some(previous) = previous {
            hw::dequeue(previous);
        }
    }

    fn unsubscribe_events(&self) {
        let id = self.subscription.lock().take();
        if let Some(id) = id {
            hw::dequeue(id);
        }
    }

    /// Imports the engine's state under the boot key, reasserts the desired
    /// state and tears down whatever no owner claimed.
    pub fn boot_reconcile(&self) -> Result<ResultCode, DaemonError> {
        let boot = self.config.boot_key.as_str();
        let desired = match &self.config.desired_state {
            Some(path) => Some(DesiredState::load(path).map_err(|e| {
                error!("Failed to load desired state: {}", e);
                audit_log!(
                    AuditRecord::new(AuditCategory::Reconciliation, "VomDaemon", "load_desired_state")
                        .with_object_id(path.display().to_string())
                        .with_error(e.to_string())
                );
                e
            })?),
            None => None,
        };

        Om::populate(boot);
        let imported = Om::claims(boot);
        info!("Imported {} object(s) under {}", imported, boot);
        Om::mark(boot);

        let applied = match &desired {
            Some(state) => state.apply(),
            None => ResultCode::Ok,
        };
        let swept = Om::sweep(boot);
        let rc = if applied.is_ok() { swept } else { applied };

        let record = AuditRecord::new(AuditCategory::Reconciliation, "VomDaemon", "boot_reconcile")
            .with_outcome(if rc.is_ok() || rc == ResultCode::Noop {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            })
            .with_object_id(boot)
            .with_object_type("owner")
            .with_details(serde_json::json!({
                "imported": imported,
                "owners": desired.as_ref().map_or(0, |d| d.owners.len()),
                "result": rc.to_string(),
            }));
        audit_log!(record);
        Ok(rc)
    }

    /// Polls the engine once. Returns true if the engine answered.
    ///
    /// A missed reply on a live session is only reported: the engine still
    /// holds its state. Once the session is gone the engine is taken to have
    /// restarted, so the daemon reconnects, discards commands queued for the
    /// old session and replays every live object.
    pub fn check_liveness(&self) -> bool {
        if hw::poll() {
            debug!("Engine alive");
            return true;
        }

        if hw::is_connected() {
            warn!("Engine missed a liveness poll, session still up");
            audit_log!(
                AuditRecord::new(AuditCategory::Connection, "VomDaemon", "liveness")
                    .with_error("no reply to control ping")
            );
            return false;
        }

        warn!("Engine session lost, reconnecting");
        audit_log!(
            AuditRecord::new(AuditCategory::Connection, "VomDaemon", "liveness")
                .with_error("session lost")
        );

        hw::disconnect();
        self.unsubscribe_events();
        if let Err(e) = self.connect() {
            error!("Reconnect failed: {}", e);
            return false;
        }

        let discarded = hw::clear();
        if discarded > 0 {
            info!("Discarded {} command(s) queued for the previous session", discarded);
        }

        let rc = Om::replay();
        let record = AuditRecord::new(AuditCategory::Reconciliation, "VomDaemon", "replay")
            .with_details(serde_json::json!({ "discarded": discarded }));
        let record = if rc.is_ok() {
            record.with_outcome(AuditOutcome::Success)
        } else {
            record.with_error(format!("replay returned {}", rc))
        };
        audit_log!(record);

        self.subscribe_events();
        false
    }

    /// Runs the liveness loop until [`VomDaemon::stop`] is called.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Starting liveness loop (every {}ms)",
            self.config.poll_interval_ms
        );
        self.running.store(true, Ordering::SeqCst);
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(
            self.config.poll_interval_ms.max(1),
        ));

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.notified() => break,
            }
            let daemon = Arc::clone(&self);
            if let Err(e) = tokio::task::spawn_blocking(move || daemon.check_liveness()).await {
                error!("Liveness check panicked: {}", e);
            }
        }

        info!("Liveness loop stopped");
    }

    /// Stops the liveness loop.
    pub fn stop(&self) {
        info!("Stopping VomDaemon");
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "VomDaemon", "stop_requested")
                .with_outcome(AuditOutcome::Success)
        );
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drops the event subscription and the process-wide queue. Objects
    /// configured in the engine are left in place.
    pub fn shutdown(&self) {
        self.unsubscribe_events();
        hw::shutdown();
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "VomDaemon", "shutdown")
                .with_outcome(AuditOutcome::Success)
        );
    }

    /// Returns every owner's claims followed by every type's store.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for key in Om::keys() {
            let _ = writeln!(out, "{}:", key);
            out.push_str(&Om::dump(&key));
        }
        out.push_str(&registry::show());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fast_config;
    use crate::AdminState;
    use serial_test::serial;
    use std::time::Duration;
    use vom_api::SimEngine;

    fn config() -> VomDaemonConfig {
        VomDaemonConfig {
            poll_interval_ms: 10,
            boot_key: "__daemon_boot__".to_string(),
            desired_state: None,
            connection: fast_config(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = VomDaemonConfig::default();
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.boot_key, "__boot__");
        assert!(config.desired_state.is_none());
    }

    #[test]
    #[serial]
    fn test_start_without_desired_state_sweeps_engine() {
        let engine = Arc::new(SimEngine::new());
        engine.seed_af_packet("dmn-stale", false);
        let daemon = VomDaemon::new(config(), engine.clone());

        assert_eq!(daemon.start().unwrap(), ResultCode::Ok);
        assert!(engine.interface("dmn-stale").is_none());
        assert!(!Om::keys().contains(&"__daemon_boot__".to_string()));
        daemon.shutdown();
    }

    #[test]
    #[serial]
    fn test_missing_desired_state_file() {
        let engine = Arc::new(SimEngine::new());
        let mut cfg = config();
        cfg.desired_state = Some(PathBuf::from("/nonexistent/vom-desired.json"));
        let daemon = VomDaemon::new(cfg, engine);
        assert!(matches!(
            daemon.start(),
            Err(DaemonError::DesiredState(DesiredStateError::Io { .. }))
        ));
        daemon.shutdown();
    }

    #[test]
    #[serial]
    fn test_liveness_ok() {
        let engine = Arc::new(SimEngine::new());
        let daemon = VomDaemon::new(config(), engine);
        daemon.start().unwrap();
        assert!(daemon.check_liveness());
        daemon.shutdown();
    }

    #[test]
    #[serial]
    fn test_missed_poll_on_live_session_does_not_replay() {
        let engine = Arc::new(SimEngine::new());
        let daemon = VomDaemon::new(config(), engine.clone());
        daemon.start().unwrap();
        Om::write("dmn-owner", &Interface::loopback("dmn-lo", AdminState::Up));
        let handle = Interface::find("dmn-lo").unwrap().handle();
        engine.clear_requests();

        engine.stall("control_ping");
        assert!(!daemon.check_liveness());
        assert!(hw::is_connected());
        assert!(engine.mutations().is_empty());

        assert!(daemon.check_liveness());
        assert_eq!(Interface::find("dmn-lo").unwrap().handle(), handle);
        assert_eq!(Interface::name_of(handle).as_deref(), Some("dmn-lo"));

        Om::remove("dmn-owner");
        daemon.shutdown();
    }

    #[tokio::test]
    #[serial]
    async fn test_run_and_stop() {
        let engine = Arc::new(SimEngine::new());
        let daemon = Arc::new(VomDaemon::new(config(), engine));
        daemon.start().unwrap();

        let handle = tokio::spawn(Arc::clone(&daemon).run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(daemon.is_running());
        daemon.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!daemon.is_running());
        daemon.shutdown();
    }
}
