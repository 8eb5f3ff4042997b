//! Desired-state file loading.
//!
//! The file is a JSON object mapping owner keys to what each owner wants:
//!
//! ```json
//! {
//!   "owners": {
//!     "uplink": {
//!       "interfaces": [{ "name": "eth1", "kind": "af_packet", "admin_up": true }],
//!       "bridge_domains": [{ "id": 10 }],
//!       "l2_bindings": [{ "interface": "eth1", "bridge_domain": 10 }]
//!     }
//!   }
//! }
//! ```
//!
//! Applying it writes each owner's objects inside a mark/sweep epoch, so
//! anything an owner claimed before and no longer lists is torn down.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use vom_api::{InterfaceType, DEFAULT_BRIDGE_DOMAIN};
use vom_core::{MarkAndSweep, Om, ResultCode};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::bridge_domain::BridgeDomain;
use crate::interface::{AdminState, Interface};
use crate::l2_binding::L2Binding;

/// Errors from loading a desired-state file.
#[derive(Debug, Error)]
pub enum DesiredStateError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid desired-state JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("owner {owner}: {message}")]
    Invalid { owner: String, message: String },
}

impl DesiredStateError {
    fn invalid(owner: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            owner: owner.to_string(),
            message: message.into(),
        }
    }
}

/// Interface kinds an owner may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    #[default]
    AfPacket,
    Loopback,
}

impl From<InterfaceKind> for InterfaceType {
    fn from(kind: InterfaceKind) -> Self {
        match kind {
            InterfaceKind::AfPacket => InterfaceType::AfPacket,
            InterfaceKind::Loopback => InterfaceType::Loopback,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    #[serde(default)]
    pub kind: InterfaceKind,
    #[serde(default = "default_true")]
    pub admin_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomainConfig {
    pub id: u32,
    #[serde(default = "default_true")]
    pub learn: bool,
}

/// Binds a listed interface into a listed bridge domain of the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2BindingConfig {
    pub interface: String,
    pub bridge_domain: u32,
}

/// One owner's desired objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub bridge_domains: Vec<BridgeDomainConfig>,
    #[serde(default)]
    pub l2_bindings: Vec<L2BindingConfig>,
}

/// Desired state of every owner, keyed by owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub owners: BTreeMap<String, OwnerConfig>,
}

impl DesiredState {
    /// Reads and validates a desired-state file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DesiredStateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DesiredStateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, DesiredStateError> {
        let state: DesiredState = serde_json::from_str(text)?;
        state.validate()?;
        Ok(state)
    }

    /// Checks each owner is self-consistent: names and ids are unique, the
    /// default bridge domain is not claimed and bindings refer to objects the
    /// same owner lists.
    pub fn validate(&self) -> Result<(), DesiredStateError> {
        for (owner, config) in &self.owners {
            let mut names = BTreeSet::new();
            for itf in &config.interfaces {
                if itf.name.is_empty() {
                    return Err(DesiredStateError::invalid(owner, "empty interface name"));
                }
                if !names.insert(itf.name.as_str()) {
                    return Err(DesiredStateError::invalid(
                        owner,
                        format!("interface {} listed twice", itf.name),
                    ));
                }
            }

            let mut ids = BTreeSet::new();
            for bd in &config.bridge_domains {
                if bd.id == DEFAULT_BRIDGE_DOMAIN {
                    return Err(DesiredStateError::invalid(
                        owner,
                        "bridge domain 0 is reserved",
                    ));
                }
                if !ids.insert(bd.id) {
                    return Err(DesiredStateError::invalid(
                        owner,
                        format!("bridge domain {} listed twice", bd.id),
                    ));
                }
            }

            let mut bound = BTreeSet::new();
            for binding in &config.l2_bindings {
                if !names.contains(binding.interface.as_str()) {
                    return Err(DesiredStateError::invalid(
                        owner,
                        format!("binding refers to unknown interface {}", binding.interface),
                    ));
                }
                if !ids.contains(&binding.bridge_domain) {
                    return Err(DesiredStateError::invalid(
                        owner,
                        format!(
                            "binding refers to unknown bridge domain {}",
                            binding.bridge_domain
                        ),
                    ));
                }
                if !bound.insert(binding.interface.as_str()) {
                    return Err(DesiredStateError::invalid(
                        owner,
                        format!("interface {} bound twice", binding.interface),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Writes every owner's objects. Returns the first failure seen, or `Ok`.
    pub fn apply(&self) -> ResultCode {
        let mut result = ResultCode::Ok;
        for (owner, config) in &self.owners {
            let rc = apply_owner(owner, config);
            if !rc.is_ok() {
                warn!("owner {}: apply returned {}", owner, rc);
                if result.is_ok() {
                    result = rc;
                }
            }
        }
        result
    }
}

/// Reasserts one owner's objects in a mark/sweep epoch.
pub fn apply_owner(owner: &str, config: &OwnerConfig) -> ResultCode {
    info!(
        "owner {}: {} interface(s), {} bridge domain(s), {} binding(s)",
        owner,
        config.interfaces.len(),
        config.bridge_domains.len(),
        config.l2_bindings.len()
    );
    let epoch = MarkAndSweep::new(owner);
    let mut result = ResultCode::Ok;
    let mut note = |rc: ResultCode| {
        if result.is_ok() && !rc.is_ok() {
            result = rc;
        }
    };

    let mut interfaces = BTreeMap::new();
    for itf in &config.interfaces {
        let desired = Interface::new(
            itf.name.clone(),
            itf.kind.into(),
            AdminState::from(itf.admin_up),
        );
        note(Om::write(owner, &desired));
        interfaces.insert(itf.name.as_str(), desired);
    }

    let mut bridge_domains = BTreeMap::new();
    for bd in &config.bridge_domains {
        let desired = BridgeDomain::with_learning(bd.id, bd.learn);
        note(Om::write(owner, &desired));
        bridge_domains.insert(bd.id, desired);
    }

    for binding in &config.l2_bindings {
        let itf = interfaces.get(binding.interface.as_str());
        let bd = bridge_domains.get(&binding.bridge_domain);
        if let (Some(itf), Some(bd)) = (itf, bd) {
            note(Om::write(owner, &L2Binding::new(itf, bd)));
        }
    }
    note(epoch.finish());

    audit_log!(apply_record(owner, config, result));
    result
}

fn apply_record(owner: &str, config: &OwnerConfig, result: ResultCode) -> AuditRecord {
    let record = if result.is_ok() {
        AuditRecord::new(AuditCategory::OwnerChange, "DesiredState", "apply_owner")
            .with_outcome(AuditOutcome::Success)
    } else {
        AuditRecord::new(AuditCategory::ErrorCondition, "DesiredState", "apply_owner")
            .with_error(format!("apply returned {}", result))
    };
    record
        .with_object_id(owner)
        .with_object_type("owner")
        .with_details(serde_json::json!({
            "interfaces": config.interfaces.len(),
            "bridge_domains": config.bridge_domains.len(),
            "l2_bindings": config.l2_bindings.len(),
            "result": result.to_string(),
        }))
}
