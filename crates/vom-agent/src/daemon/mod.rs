//! The reconciliation daemon.

mod vom_daemon;

pub use vom_daemon::{DaemonError, EventLogger, VomDaemon, VomDaemonConfig};
