//! The command queue.

use log::{debug, error, info};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::cmd::{Cmd, CmdId};
use crate::connection::Connection;
use crate::rc::ResultCode;

/// Ordered pipeline of commands towards one engine connection.
///
/// Commands are issued one at a time in enqueue order. A failed command ends
/// the batch and the rest of the batch is discarded; callers retry by writing
/// again. While disabled, commands are marked succeeded without being sent
/// (reads still go out).
pub struct CmdQueue {
    conn: Connection,
    queue: Mutex<VecDeque<(CmdId, Arc<dyn Cmd>)>>,
    pending: Mutex<HashMap<CmdId, Arc<dyn Cmd>>>,
    enabled: AtomicBool,
    next_id: AtomicU64,
}

impl std::fmt::Debug for CmdQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdQueue")
            .field("queued", &self.queue.lock().len())
            .field("pending", &self.pending.lock().len())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl CmdQueue {
    /// Creates an enabled, empty queue over `conn`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            queue: Mutex::new(VecDeque::new()),
            pending: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the connection commands are issued on.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Appends a command. Nothing is sent until [`CmdQueue::write`].
    pub fn enqueue(&self, cmd: Arc<dyn Cmd>) -> CmdId {
        let id = CmdId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("enqueue: {} {}", id, cmd);
        self.queue.lock().push_back((id, cmd));
        id
    }

    /// Removes a command, whether still queued or pending, retiring it if it
    /// had been issued.
    pub fn dequeue(&self, id: CmdId) {
        let removed = {
            let mut queue = self.queue.lock();
            queue
                .iter()
                .position(|(qid, _)| *qid == id)
                .and_then(|pos| queue.remove(pos))
        };
        if removed.is_some() {
            return;
        }
        let pending = self.pending.lock().remove(&id);
        if let Some(cmd) = pending {
            debug!("dequeue: retiring {} {}", id, cmd);
            cmd.retire(&self.conn);
        }
    }

    /// Drops every queued command without issuing it. Pending commands are
    /// left alone. Returns the number dropped.
    pub fn clear(&self) -> usize {
        let dropped: Vec<(CmdId, Arc<dyn Cmd>)> = self.queue.lock().drain(..).collect();
        if !dropped.is_empty() {
            info!("clear: dropped {} queued command(s)", dropped.len());
        }
        dropped.len()
    }

    /// Number of commands waiting for the next write.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no command is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Number of issued commands still in progress.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn enable(&self) {
        info!("HW queue enabled");
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        info!("HW queue disabled");
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Issues the queued batch.
    ///
    /// Returns `Noop` (and keeps the batch) when not connected; otherwise the
    /// batch is always drained and the first failure, if any, is returned.
    pub fn write(&self) -> ResultCode {
        if !self.conn.is_connected() {
            let queued = self.len();
            if queued > 0 {
                debug!("write: not connected, {} command(s) kept", queued);
            }
            return ResultCode::Noop;
        }

        let batch: Vec<(CmdId, Arc<dyn Cmd>)> = self.queue.lock().drain(..).collect();
        let enabled = self.is_enabled();
        let mut rc = ResultCode::Ok;
        let mut issued = 0usize;
        let total = batch.len();

        for (id, cmd) in batch {
            if !enabled && !cmd.is_read_only() {
                debug!("write: disabled, {} auto-succeeded", cmd);
                cmd.succeeded();
                continue;
            }

            // visible to the reader before the request goes out
            self.pending.lock().insert(id, Arc::clone(&cmd));
            debug!("write: issue {} {}", id, cmd);
            let result = cmd.issue(&self.conn);
            issued += 1;

            if result != ResultCode::InProgress {
                self.pending.lock().remove(&id);
            }
            if result != ResultCode::Ok && result != ResultCode::InProgress {
                error!("write: {} failed: {}", cmd, result);
                rc = result;
                break;
            }
        }

        if total > 0 {
            debug!("write: {} of {} issued -> {}", issued, total, rc);
        }
        rc
    }
}
