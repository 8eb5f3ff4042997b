//! Object-model reconciliation core for VOM.
//!
//! This crate keeps a forwarding engine's configuration in line with what a
//! set of independent owners want:
//!
//! - [`HwItem`]: one attribute plus the result of its last remote operation
//! - [`Cmd`]: one remote operation; [`CmdQueue`] issues them in order
//! - [`Connection`]: the engine session and its reader thread
//! - [`SingularDb`]: one canonical instance per domain key
//! - [`KeyDb`]: which owner claims which instances
//! - [`Om`]: write / remove / mark / sweep / populate / replay
//! - [`registry`]: per-type listeners run in dependency order
//!
//! # Architecture
//!
//! ```text
//! owner ──write(key, obj)──> Om ──singular()──> SingularDb
//!                             │  └─update()──> hw::enqueue(cmd)
//!                             ├──claim──> KeyDb
//!                             └──hw::write()──> CmdQueue ──> Connection ──> engine
//!                                                                 ▲
//!                                              reader thread ─────┘ (replies, events)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vom_core::{hw, CmdQueue, Connection, Om};
//!
//! hw::init(CmdQueue::new(Connection::new(transport)));
//! hw::connect()?;
//! Om::write("uplink", &Interface::af_packet("eth0", AdminState::Up));
//! Om::remove("uplink");
//! ```

pub mod cmd;
pub mod connection;
pub mod hw;
pub mod item;
pub mod key_db;
pub mod object;
pub mod om;
pub mod queue;
pub mod rc;
pub mod registry;
pub mod singular_db;

pub use cmd::{rpc, Cmd, CmdId, DumpCmd};
pub use connection::{
    promise, Connection, ConnectionConfig, Dispatch, EventHandler, Future, Promise, ReplyHandler,
    SubscriptionId,
};
pub use item::HwItem;
pub use key_db::{KeyDb, ObjectRef, ObjectRefList};
pub use object::{Entity, Object};
pub use om::{MarkAndSweep, Om};
pub use queue::CmdQueue;
pub use rc::{HwError, HwResult, ResultCode};
pub use registry::{register_listener, Dependency, Listener};
pub use singular_db::SingularDb;
