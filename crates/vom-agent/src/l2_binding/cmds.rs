//! L2 binding commands.

use std::fmt;

use vom_api::{InterfaceHandle, Request};
use vom_core::{rpc, Cmd, Connection, HwItem, ResultCode};

/// Puts an interface into a bridge domain, or takes it out.
///
/// Binding an interface that is already a member of another bridge domain
/// moves it.
pub struct BindCmd {
    itf: HwItem<InterfaceHandle>,
    bd_id: u32,
    binding: HwItem<bool>,
    enable: bool,
}

impl BindCmd {
    pub fn bind(itf: HwItem<InterfaceHandle>, bd_id: u32, binding: HwItem<bool>) -> Self {
        Self {
            itf,
            bd_id,
            binding,
            enable: true,
        }
    }

    pub fn unbind(itf: HwItem<InterfaceHandle>, bd_id: u32, binding: HwItem<bool>) -> Self {
        Self {
            itf,
            bd_id,
            binding,
            enable: false,
        }
    }
}

impl Cmd for BindCmd {
    fn issue(&self, conn: &Connection) -> ResultCode {
        let (rc, _) = rpc(
            conn,
            Request::SwInterfaceSetL2Bridge {
                rx_sw_if_index: self.itf.data(),
                bd_id: self.bd_id,
                enable: self.enable,
            },
        );
        if self.enable {
            self.binding.set(rc);
        } else if rc.is_ok() {
            self.binding.set(ResultCode::Unset);
        }
        rc
    }

    fn succeeded(&self) {
        if self.enable {
            self.binding.set(ResultCode::Ok);
        }
    }
}

impl fmt::Display for BindCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "l2-{}: itf:{} bd:{}",
            if self.enable { "bind" } else { "unbind" },
            self.itf.data(),
            self.bd_id
        )
    }
}
