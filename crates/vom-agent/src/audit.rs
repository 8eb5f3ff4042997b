//! Audit records for reconciliation lifecycle events.
//!
//! Connects, disconnects, boot reconciliation, replays and owner changes are
//! recorded as structured [`AuditRecord`]s and emitted through [`audit_log!`]
//! on the `audit` target. Each record carries a UTC timestamp, the component
//! that produced it, the action, its outcome and optional object and JSON
//! details, so the stream can be filtered or shipped as-is.
//!
//! # Severity Mapping
//!
//! | Outcome | Level |
//! |---------|-------|
//! | Success | info |
//! | InProgress | debug |
//! | Failure | warn |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Daemon startup and shutdown
    SystemLifecycle,
    /// Engine connect, disconnect and liveness
    Connection,
    /// Populate, mark, sweep and replay epochs
    Reconciliation,
    /// An owner's desired state changed
    OwnerChange,
    /// Asynchronous engine notifications
    EngineEvent,
    /// Error and failure events
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
            AuditCategory::Connection => write!(f, "CONNECTION"),
            AuditCategory::Reconciliation => write!(f, "RECONCILIATION"),
            AuditCategory::OwnerChange => write!(f, "OWNER_CHANGE"),
            AuditCategory::EngineEvent => write!(f, "ENGINE_EVENT"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC time the record was created
    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    /// Component producing the record (e.g. "VomDaemon", "Interface")
    pub source: String,

    pub action: String,

    pub outcome: AuditOutcome,

    /// Affected object, e.g. an owner key or interface name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Kind of the affected object, e.g. "owner", "interface"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record stamped now. The outcome starts as `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the failure reason and sets the outcome to `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    /// Serializes the record to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`] on the `audit` target at the level matching its
/// outcome.
///
/// # Usage
/// ```ignore
/// let record = AuditRecord::new(AuditCategory::Connection, "VomDaemon", "connect")
///     .with_outcome(AuditOutcome::Success);
/// audit_log!(record);
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::InProgress => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::Failure => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    };
}
