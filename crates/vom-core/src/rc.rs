//! Remote-operation result codes and core error types.

use std::fmt;
use thiserror::Error;
use vom_api::{ApiError, RetVal};

/// Outcome of one remote operation, or of a batch of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultCode {
    /// Never issued.
    #[default]
    Unset,
    /// Accepted by the engine.
    Ok,
    /// Nothing was done (e.g. not connected).
    Noop,
    /// Issued; completion arrives later out of band.
    InProgress,
    /// Rejected by the engine or could not be sent.
    Invalid,
    /// No reply within the deadline.
    Timeout,
}

impl ResultCode {
    /// Maps an engine return value to a result code.
    ///
    /// "Already exists" replies mean the engine already holds what we asked
    /// for, so they count as success.
    pub fn from_retval(retval: i32) -> Self {
        let rv = RetVal::from_raw(retval);
        if rv.is_success() || rv.is_already_exists() {
            ResultCode::Ok
        } else {
            ResultCode::Invalid
        }
    }

    /// Returns true if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        *self == ResultCode::Ok
    }

    /// Returns true if the operation failed and aborts a batch.
    pub fn is_failure(&self) -> bool {
        matches!(self, ResultCode::Invalid | ResultCode::Timeout)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultCode::Unset => "unset",
            ResultCode::Ok => "ok",
            ResultCode::Noop => "noop",
            ResultCode::InProgress => "in-progress",
            ResultCode::Invalid => "invalid",
            ResultCode::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// Error type for misuse of the core.
#[derive(Debug, Clone, Error)]
pub enum HwError {
    /// No command queue has been installed with `hw::init`.
    #[error("HW command queue not initialized")]
    NotInitialized,

    /// An internal guarantee of the object model did not hold.
    #[error("Object model contract violated: {message}")]
    Contract { message: String },

    /// Transport failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl HwError {
    /// Creates a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        HwError::Contract {
            message: message.into(),
        }
    }
}

/// Result type for core operations that can fail outside a batch.
pub type HwResult<T> = Result<T, HwError>;
