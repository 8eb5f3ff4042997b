//! Bridge-domain commands.

use log::debug;
use std::fmt;

use vom_api::{BridgeDomainDetails, Reply, Request};
use vom_core::{rpc, Cmd, Connection, DumpCmd, HwItem, ResultCode};

/// Adds a bridge domain, or updates the learning flag of an existing one.
pub struct CreateCmd {
    id: HwItem<u32>,
    learn: HwItem<bool>,
}

impl CreateCmd {
    pub fn new(id: HwItem<u32>, learn: HwItem<bool>) -> Self {
        Self { id, learn }
    }
}

impl Cmd for CreateCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let (rc, _) = rpc(
            conn,
            Request::BridgeDomainAddDel {
                bd_id: self.id.data(),
                is_add: true,
                learn: self.learn.data(),
            },
        );
        self.id.set(rc);
        self.learn.set(rc);
        rc
    }

    fn succeeded(&self) {
        self.id.set(ResultCode::Ok);
        self.learn.set(ResultCode::Ok);
    }
}

impl fmt::Display for CreateCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bd-create: {} learn:{}", self.id, self.learn.data())
    }
}

pub struct DeleteCmd {
    id: HwItem<u32>,
}

impl DeleteCmd {
    pub fn new(id: HwItem<u32>) -> Self {
        Self { id }
    }
}

impl Cmd for DeleteCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let (rc, _) = rpc(
            conn,
            Request::BridgeDomainAddDel {
                bd_id: self.id.data(),
                is_add: false,
                learn: false,
            },
        );
        if rc.is_ok() {
            debug!("bd {} deleted", self.id.data());
            self.id.set(ResultCode::Unset);
        }
        rc
    }
}

impl fmt::Display for DeleteCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bd-delete: {}", self.id)
    }
}

/// Reads every bridge domain with its members.
pub fn dump_cmd() -> DumpCmd<BridgeDomainDetails> {
    DumpCmd::new(Request::BridgeDomainDump, |reply| match reply {
        Reply::BridgeDomainDetails(details) => Some(details),
        _ => None,
    })
}
