//! In-process simulated forwarding engine.
//!
//! `SimEngine` implements [`Transport`] against a small in-memory model of the
//! engine's interface and bridge-domain tables. Every request it receives is
//! recorded, so callers can assert exactly which remote calls were made.
//!
//! It also supports the failure modes the object model must survive:
//!
//! - [`SimEngine::inject_fault`]: the next request of a kind is rejected
//! - [`SimEngine::stall`]: the next request of a kind is never answered
//! - [`SimEngine::refuse_connects`]: the next N connect attempts fail
//! - [`SimEngine::restart`]: the engine loses all state and drops the session

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::api::bridge_domain::DEFAULT_BRIDGE_DOMAIN;
use crate::api::{BridgeDomainDetails, InterfaceDetails, InterfaceEvent, InterfaceType};
use crate::error::{ApiError, ApiResult, RetVal};
use crate::message::{Event, Incoming, Reply, Request};
use crate::transport::Transport;
use crate::types::{InterfaceHandle, RawHandle};

const LOCAL_INTERFACE: RawHandle = 0;

#[derive(Debug, Clone)]
struct SimInterface {
    name: String,
    interface_type: InterfaceType,
    admin_up: bool,
    link_up: bool,
}

#[derive(Debug, Clone, Default)]
struct SimBridgeDomain {
    learn: bool,
    members: BTreeSet<RawHandle>,
}

#[derive(Debug)]
struct SimState {
    connected: bool,
    refuse_connects: usize,
    connect_attempts: usize,
    interfaces: BTreeMap<RawHandle, SimInterface>,
    bridge_domains: BTreeMap<u32, SimBridgeDomain>,
    next_sw_if_index: RawHandle,
    want_events: bool,
    log: Vec<Request>,
    faults: Vec<(String, RetVal)>,
    stalls: Vec<String>,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            connected: false,
            refuse_connects: 0,
            connect_attempts: 0,
            interfaces: BTreeMap::new(),
            bridge_domains: BTreeMap::new(),
            next_sw_if_index: LOCAL_INTERFACE + 1,
            want_events: false,
            log: Vec::new(),
            faults: Vec::new(),
            stalls: Vec::new(),
        };
        state.reset_tables();
        state
    }

    fn reset_tables(&mut self) {
        self.interfaces.clear();
        self.interfaces.insert(
            LOCAL_INTERFACE,
            SimInterface {
                name: "local0".to_string(),
                interface_type: InterfaceType::Local,
                admin_up: false,
                link_up: false,
            },
        );
        self.bridge_domains.clear();
        self.bridge_domains
            .insert(DEFAULT_BRIDGE_DOMAIN, SimBridgeDomain::default());
        self.next_sw_if_index = LOCAL_INTERFACE + 1;
        self.want_events = false;
    }

    fn add_interface(&mut self, name: &str, interface_type: InterfaceType) -> RawHandle {
        let index = self.next_sw_if_index;
        self.next_sw_if_index += 1;
        self.interfaces.insert(
            index,
            SimInterface {
                name: name.to_string(),
                interface_type,
                admin_up: false,
                link_up: false,
            },
        );
        index
    }

    fn find_by_name(&self, name: &str) -> Option<RawHandle> {
        self.interfaces
            .iter()
            .find(|(_, itf)| itf.name == name)
            .map(|(index, _)| *index)
    }

    fn remove_interface(&mut self, index: RawHandle) {
        self.interfaces.remove(&index);
        for bd in self.bridge_domains.values_mut() {
            bd.members.remove(&index);
        }
    }

    fn interface_event(&self, index: RawHandle, deleted: bool) -> Option<Event> {
        if !self.want_events {
            return None;
        }
        let (admin_up, link_up) = self
            .interfaces
            .get(&index)
            .map(|itf| (itf.admin_up, itf.link_up))
            .unwrap_or((false, false));
        Some(Event::Interface(InterfaceEvent {
            sw_if_index: InterfaceHandle::new(index),
            admin_up,
            link_up,
            deleted,
        }))
    }

    fn take_fault(&mut self, kind: &str) -> Option<RetVal> {
        let pos = self.faults.iter().position(|(k, _)| k == kind)?;
        Some(self.faults.remove(pos).1)
    }

    fn take_stall(&mut self, kind: &str) -> bool {
        match self.stalls.iter().position(|k| k == kind) {
            Some(pos) => {
                self.stalls.remove(pos);
                true
            }
            None => false,
        }
    }

    fn handle(&mut self, request: &Request) -> (Vec<Reply>, Vec<Event>) {
        let mut events = Vec::new();
        let replies = match request {
            Request::ControlPing => vec![Reply::status(RetVal::Success)],
            Request::AfPacketCreate { host_if_name } => match self.find_by_name(host_if_name) {
                Some(index) => vec![Reply::InterfaceCreated {
                    retval: RetVal::ValueExist.as_raw(),
                    sw_if_index: InterfaceHandle::new(index),
                }],
                None => {
                    let index = self.add_interface(host_if_name, InterfaceType::AfPacket);
                    if let Some(itf) = self.interfaces.get_mut(&index) {
                        itf.link_up = true;
                    }
                    vec![Reply::InterfaceCreated {
                        retval: RetVal::Success.as_raw(),
                        sw_if_index: InterfaceHandle::new(index),
                    }]
                }
            },
            Request::AfPacketDelete { host_if_name } => match self.find_by_name(host_if_name) {
                Some(index) => {
                    events.extend(self.interface_event(index, true));
                    self.remove_interface(index);
                    vec![Reply::status(RetVal::Success)]
                }
                None => vec![Reply::status(RetVal::InvalidInterface)],
            },
            Request::CreateLoopback { tag } => {
                let index = self.add_interface(tag, InterfaceType::Loopback);
                vec![Reply::InterfaceCreated {
                    retval: RetVal::Success.as_raw(),
                    sw_if_index: InterfaceHandle::new(index),
                }]
            }
            Request::DeleteLoopback { sw_if_index } => {
                let index = sw_if_index.value();
                match self.interfaces.get(&index) {
                    Some(itf) if itf.interface_type == InterfaceType::Loopback => {
                        events.extend(self.interface_event(index, true));
                        self.remove_interface(index);
                        vec![Reply::status(RetVal::Success)]
                    }
                    _ => vec![Reply::status(RetVal::InvalidSwIfIndex)],
                }
            }
            Request::SwInterfaceSetFlags {
                sw_if_index,
                admin_up,
            } => {
                let index = sw_if_index.value();
                match self.interfaces.get_mut(&index) {
                    Some(itf) => {
                        itf.admin_up = *admin_up;
                        events.extend(self.interface_event(index, false));
                        vec![Reply::status(RetVal::Success)]
                    }
                    None => vec![Reply::status(RetVal::InvalidSwIfIndex)],
                }
            }
            Request::SwInterfaceDump => {
                let mut replies: Vec<Reply> = self
                    .interfaces
                    .iter()
                    .map(|(index, itf)| {
                        Reply::InterfaceDetails(InterfaceDetails {
                            sw_if_index: InterfaceHandle::new(*index),
                            name: itf.name.clone(),
                            interface_type: itf.interface_type,
                            admin_up: itf.admin_up,
                            link_up: itf.link_up,
                        })
                    })
                    .collect();
                replies.push(Reply::status(RetVal::Success));
                replies
            }
            Request::WantInterfaceEvents { enable } => {
                self.want_events = *enable;
                vec![Reply::status(RetVal::Success)]
            }
            Request::BridgeDomainAddDel {
                bd_id,
                is_add,
                learn,
            } => {
                if *bd_id == DEFAULT_BRIDGE_DOMAIN {
                    vec![Reply::status(RetVal::BdNotModifiable)]
                } else if *is_add {
                    if let Some(bd) = self.bridge_domains.get_mut(bd_id) {
                        bd.learn = *learn;
                        vec![Reply::status(RetVal::ValueExist)]
                    } else {
                        self.bridge_domains.insert(
                            *bd_id,
                            SimBridgeDomain {
                                learn: *learn,
                                members: BTreeSet::new(),
                            },
                        );
                        vec![Reply::status(RetVal::Success)]
                    }
                } else if self.bridge_domains.remove(bd_id).is_some() {
                    vec![Reply::status(RetVal::Success)]
                } else {
                    vec![Reply::status(RetVal::NoSuchEntry)]
                }
            }
            Request::BridgeDomainDump => {
                let mut replies: Vec<Reply> = self
                    .bridge_domains
                    .iter()
                    .map(|(bd_id, bd)| {
                        Reply::BridgeDomainDetails(BridgeDomainDetails {
                            bd_id: *bd_id,
                            learn: bd.learn,
                            members: bd
                                .members
                                .iter()
                                .map(|index| InterfaceHandle::new(*index))
                                .collect(),
                        })
                    })
                    .collect();
                replies.push(Reply::status(RetVal::Success));
                replies
            }
            Request::SwInterfaceSetL2Bridge {
                rx_sw_if_index,
                bd_id,
                enable,
            } => {
                let index = rx_sw_if_index.value();
                if !self.interfaces.contains_key(&index) {
                    vec![Reply::status(RetVal::InvalidSwIfIndex)]
                } else if !self.bridge_domains.contains_key(bd_id) {
                    vec![Reply::status(RetVal::NoSuchEntry)]
                } else {
                    for bd in self.bridge_domains.values_mut() {
                        bd.members.remove(&index);
                    }
                    if *enable {
                        if let Some(bd) = self.bridge_domains.get_mut(bd_id) {
                            bd.members.insert(index);
                        }
                    }
                    vec![Reply::status(RetVal::Success)]
                }
            }
        };
        (replies, events)
    }
}

/// Simulated forwarding engine.
pub struct SimEngine {
    state: Mutex<SimState>,
    tx: Sender<Incoming>,
    rx: Receiver<Incoming>,
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimEngine")
            .field("connected", &state.connected)
            .field("interfaces", &state.interfaces.len())
            .field("bridge_domains", &state.bridge_domains.len())
            .field("requests", &state.log.len())
            .finish()
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    /// Creates an engine holding only its built-in local interface and
    /// default bridge domain.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Mutex::new(SimState::new()),
            tx,
            rx,
        }
    }

    /// Creates an AF_PACKET interface as if it had been configured before we
    /// connected. Not recorded in the request log.
    pub fn seed_af_packet(&self, name: &str, admin_up: bool) -> InterfaceHandle {
        let mut state = self.state.lock();
        let index = state.add_interface(name, InterfaceType::AfPacket);
        if let Some(itf) = state.interfaces.get_mut(&index) {
            itf.admin_up = admin_up;
            itf.link_up = true;
        }
        InterfaceHandle::new(index)
    }

    /// Creates a bridge domain with members as if it had been configured
    /// before we connected. Not recorded in the request log.
    pub fn seed_bridge_domain(&self, bd_id: u32, learn: bool, members: &[InterfaceHandle]) {
        let mut state = self.state.lock();
        state.bridge_domains.insert(
            bd_id,
            SimBridgeDomain {
                learn,
                members: members.iter().map(|h| h.value()).collect(),
            },
        );
    }

    /// Returns every request received, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    /// Returns the requests that change forwarding state, in arrival order.
    pub fn mutations(&self) -> Vec<Request> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.is_mutation())
            .cloned()
            .collect()
    }

    /// Clears the request log.
    pub fn clear_requests(&self) {
        self.state.lock().log.clear();
    }

    /// Rejects the next request of `kind` with `retval`.
    pub fn inject_fault(&self, kind: &str, retval: RetVal) {
        self.state.lock().faults.push((kind.to_string(), retval));
    }

    /// Swallows the next request of `kind` without replying.
    pub fn stall(&self, kind: &str) {
        self.state.lock().stalls.push(kind.to_string());
    }

    /// Makes the next `count` connect attempts fail.
    pub fn refuse_connects(&self, count: usize) {
        self.state.lock().refuse_connects = count;
    }

    /// Returns the number of connect attempts seen so far.
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    /// Simulates an engine crash: all configured state is lost and the
    /// session is dropped. The request log is kept.
    pub fn restart(&self) {
        let mut state = self.state.lock();
        info!("sim: engine restart");
        state.reset_tables();
        state.connected = false;
        while self.rx.try_recv().is_ok() {}
    }

    /// Changes the link state of an interface and emits an event if
    /// subscribed.
    pub fn set_link(&self, sw_if_index: InterfaceHandle, link_up: bool) {
        let event = {
            let mut state = self.state.lock();
            let index = sw_if_index.value();
            match state.interfaces.get_mut(&index) {
                Some(itf) => itf.link_up = link_up,
                None => return,
            }
            state.interface_event(index, false)
        };
        if let Some(event) = event {
            let _ = self.tx.send(Incoming::Event(event));
        }
    }

    /// Returns the engine's view of an interface by name.
    pub fn interface(&self, name: &str) -> Option<InterfaceDetails> {
        let state = self.state.lock();
        let index = state.find_by_name(name)?;
        state.interfaces.get(&index).map(|itf| InterfaceDetails {
            sw_if_index: InterfaceHandle::new(index),
            name: itf.name.clone(),
            interface_type: itf.interface_type,
            admin_up: itf.admin_up,
            link_up: itf.link_up,
        })
    }

    /// Returns the engine's view of a bridge domain.
    pub fn bridge_domain(&self, bd_id: u32) -> Option<BridgeDomainDetails> {
        let state = self.state.lock();
        state.bridge_domains.get(&bd_id).map(|bd| BridgeDomainDetails {
            bd_id,
            learn: bd.learn,
            members: bd.members.iter().map(|i| InterfaceHandle::new(*i)).collect(),
        })
    }
}

impl Transport for SimEngine {
    fn connect(&self) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(ApiError::connect_failed("connection refused"));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn send(&self, context: u32, request: Request) -> ApiResult<()> {
        let (replies, events) = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(ApiError::NotConnected);
            }
            debug!("sim: [{}] {}", context, request);
            state.log.push(request.clone());

            if state.take_stall(request.kind()) {
                return Ok(());
            }
            match state.take_fault(request.kind()) {
                Some(retval) => {
                    let reply = match request {
                        Request::AfPacketCreate { .. } | Request::CreateLoopback { .. } => {
                            Reply::InterfaceCreated {
                                retval: retval.as_raw(),
                                sw_if_index: InterfaceHandle::INVALID,
                            }
                        }
                        _ => Reply::status(retval),
                    };
                    (vec![reply], Vec::new())
                }
                None => state.handle(&request),
            }
        };

        for reply in replies {
            self.tx
                .send(Incoming::Reply { context, reply })
                .map_err(|_| ApiError::Closed)?;
        }
        for event in events {
            self.tx
                .send(Incoming::Event(event))
                .map_err(|_| ApiError::Closed)?;
        }
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> Option<Incoming> {
        self.rx.recv_timeout(timeout).ok()
    }
}
