//! Process-wide access to the command queue.
//!
//! Entities enqueue commands from `update`, `sweep` and `replay`, which run
//! deep inside the object model (including from `Drop`), so the queue lives
//! in a global slot installed once with [`init`].

use log::{debug, error, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

use vom_api::Request;

use crate::cmd::{Cmd, CmdId};
use crate::queue::CmdQueue;
use crate::rc::{HwError, HwResult, ResultCode};

static QUEUE: Lazy<Mutex<Option<Arc<CmdQueue>>>> = Lazy::new(|| Mutex::new(None));

/// Installs `queue` as the process-wide queue, replacing any previous one.
pub fn init(queue: CmdQueue) -> Arc<CmdQueue> {
    let queue = Arc::new(queue);
    let previous = QUEUE.lock().replace(Arc::clone(&queue));
    drop(previous);
    queue
}

/// Removes the process-wide queue. Dropping the last reference stops the
/// reader thread.
pub fn shutdown() -> Option<Arc<CmdQueue>> {
    QUEUE.lock().take()
}

/// Returns the installed queue.
pub fn queue() -> HwResult<Arc<CmdQueue>> {
    QUEUE.lock().clone().ok_or(HwError::NotInitialized)
}

/// Appends a command to the queue.
pub fn enqueue<C: Cmd + 'static>(cmd: C) -> Option<CmdId> {
    enqueue_shared(Arc::new(cmd))
}

/// Appends a command the caller keeps a reference to.
pub fn enqueue_shared(cmd: Arc<dyn Cmd>) -> Option<CmdId> {
    match queue() {
        Ok(q) => Some(q.enqueue(cmd)),
        Err(e) => {
            warn!("enqueue {}: {}", cmd, e);
            None
        }
    }
}

/// Removes a queued or pending command.
pub fn dequeue(id: CmdId) {
    if let Ok(q) = queue() {
        q.dequeue(id);
    }
}

/// Drops everything queued without issuing it.
pub fn clear() -> usize {
    queue().map(|q| q.clear()).unwrap_or(0)
}

/// Issues everything queued. `Noop` if no queue is installed or the
/// connection is down.
pub fn write() -> ResultCode {
    match queue() {
        Ok(q) => q.write(),
        Err(e) => {
            debug!("write: {}", e);
            ResultCode::Noop
        }
    }
}

pub fn enable() {
    if let Ok(q) = queue() {
        q.enable();
    }
}

pub fn disable() {
    if let Ok(q) = queue() {
        q.disable();
    }
}

pub fn is_enabled() -> bool {
    queue().map(|q| q.is_enabled()).unwrap_or(false)
}

/// Blocks until connected.
pub fn connect() -> HwResult<()> {
    let q = queue()?;
    q.connection().connect();
    Ok(())
}

pub fn disconnect() {
    if let Ok(q) = queue() {
        q.connection().disconnect();
    }
}

pub fn is_connected() -> bool {
    queue().map(|q| q.connection().is_connected()).unwrap_or(false)
}

/// Liveness check: a control ping answered in time.
pub fn poll() -> bool {
    let q = match queue() {
        Ok(q) => q,
        Err(_) => return false,
    };
    let conn = q.connection();
    if !conn.is_connected() {
        return false;
    }
    match conn.call(Request::ControlPing, conn.config().rpc_timeout) {
        Some(reply) => ResultCode::from_retval(reply.retval()).is_ok(),
        None => {
            error!("poll: no reply from engine");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionConfig};
    use serial_test::serial;
    use std::time::Duration;
    use vom_api::SimEngine;

    fn install() -> Arc<SimEngine> {
        let engine = Arc::new(SimEngine::new());
        let conn = Connection::with_config(
            engine.clone(),
            ConnectionConfig {
                rpc_timeout: Duration::from_millis(100),
                dump_timeout: Duration::from_millis(100),
                connect_retry_interval: Duration::from_millis(1),
                reader_poll_interval: Duration::from_millis(5),
            },
        );
        init(CmdQueue::new(conn));
        engine
    }

    #[test]
    #[serial]
    fn test_uninitialized() {
        shutdown();
        assert!(matches!(queue(), Err(HwError::NotInitialized)));
        assert_eq!(write(), ResultCode::Noop);
        assert!(!poll());
        assert!(connect().is_err());
    }

    #[test]
    #[serial]
    fn test_poll() {
        let engine = install();
        assert!(!poll());
        connect().unwrap();
        assert!(poll());
        engine.stall("control_ping");
        assert!(!poll());
        engine.restart();
        assert!(!poll());
        shutdown();
    }

    #[test]
    #[serial]
    fn test_enable_disable() {
        install();
        assert!(is_enabled());
        disable();
        assert!(!is_enabled());
        enable();
        assert!(is_enabled());
        shutdown();
    }
}
