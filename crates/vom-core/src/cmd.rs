//! Commands: one remote operation each.

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

use vom_api::{Reply, Request};

use crate::connection::Connection;
use crate::rc::ResultCode;

/// Identity of an enqueued command, assigned by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CmdId(pub(crate) u64);

impl fmt::Display for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// A unit of work against the engine.
///
/// `issue` sends exactly one request and blocks until its reply (or a
/// deadline), recording the outcome in the [`HwItem`](crate::HwItem) the
/// command acts on. Returning [`ResultCode::InProgress`] keeps the command
/// pending in the queue until it is dequeued.
pub trait Cmd: fmt::Display + Send + Sync {
    /// Performs the remote call.
    fn issue(&self, conn: &Connection) -> ResultCode;

    /// Marks the command as done without talking to the engine.
    fn succeeded(&self) {}

    /// Tears down a long-lived command that stayed pending.
    fn retire(&self, _conn: &Connection) {}

    /// Read-only commands are issued even while the queue is disabled.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Sends `request`, waits for the reply and maps it to a result code.
pub fn rpc(conn: &Connection, request: Request) -> (ResultCode, Option<Reply>) {
    let name = request.kind();
    match conn.call(request, conn.config().rpc_timeout) {
        Some(reply) => {
            let rc = ResultCode::from_retval(reply.retval());
            debug!("{}: retval {} -> {}", name, reply.retval(), rc);
            (rc, Some(reply))
        }
        None => {
            warn!("{}: no reply within {:?}", name, conn.config().rpc_timeout);
            (ResultCode::Timeout, None)
        }
    }
}

/// A command that reads a table and keeps the records it got back.
///
/// Records are available through [`DumpCmd::pop`] or [`DumpCmd::records`]
/// once the queue write that issued it returns.
pub struct DumpCmd<R> {
    request: Request,
    extract: fn(Reply) -> Option<R>,
    records: Mutex<VecDeque<R>>,
    rc: Mutex<ResultCode>,
}

impl<R: Clone + Send> DumpCmd<R> {
    /// Creates a dump of `request`, keeping each detail `extract` accepts.
    pub fn new(request: Request, extract: fn(Reply) -> Option<R>) -> Self {
        Self {
            request,
            extract,
            records: Mutex::new(VecDeque::new()),
            rc: Mutex::new(ResultCode::Unset),
        }
    }

    /// Returns the outcome of the dump.
    pub fn rc(&self) -> ResultCode {
        *self.rc.lock()
    }

    /// Takes the next record.
    pub fn pop(&self) -> Option<R> {
        self.records.lock().pop_front()
    }

    /// Returns the records not yet popped.
    pub fn records(&self) -> Vec<R> {
        self.records.lock().iter().cloned().collect()
    }
}

impl<R: Clone + Send> Cmd for DumpCmd<R> {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let rc = match conn.call_dump(self.request.clone(), conn.config().dump_timeout) {
            Some((retval, details)) => {
                let mut records = self.records.lock();
                records.extend(details.into_iter().filter_map(self.extract));
                debug!("{}: {} record(s)", self.request, records.len());
                ResultCode::from_retval(retval)
            }
            None => {
                warn!(
                    "{}: incomplete after {:?}",
                    self.request,
                    conn.config().dump_timeout
                );
                ResultCode::Timeout
            }
        };
        *self.rc.lock() = rc;
        rc
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

impl<R> fmt::Display for DumpCmd<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dump: {}", self.request)
    }
}
