//! Engine return codes and API error handling.
//!
//! Every reply from the forwarding engine carries a signed `retval`. This
//! module gives those raw values names and converts transport failures into
//! Rust's Result type.

use std::fmt;
use thiserror::Error;

/// Forwarding-engine return codes.
///
/// These values correspond to the engine's `vnet_api_error_t` values for the
/// calls this crate knows about.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetVal {
    Success = 0,
    Unspecified = -1,
    InvalidSwIfIndex = -2,
    NoSuchEntry = -6,
    InvalidInterface = -12,
    SubifAlreadyExists = -68,
    InvalidValue = -73,
    ValueExist = -79,
    BdNotModifiable = -92,
}

impl RetVal {
    /// Creates a RetVal from a raw i32 value.
    pub fn from_raw(retval: i32) -> Self {
        match retval {
            0 => RetVal::Success,
            -1 => RetVal::Unspecified,
            -2 => RetVal::InvalidSwIfIndex,
            -6 => RetVal::NoSuchEntry,
            -12 => RetVal::InvalidInterface,
            -68 => RetVal::SubifAlreadyExists,
            -73 => RetVal::InvalidValue,
            -79 => RetVal::ValueExist,
            -92 => RetVal::BdNotModifiable,
            _ => RetVal::Unspecified,
        }
    }

    /// Returns the raw value sent on the wire.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true if the engine accepted the request.
    pub fn is_success(&self) -> bool {
        *self == RetVal::Success
    }

    /// Returns true if the engine refused the request because the resource
    /// it was asked to create is already present.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RetVal::ValueExist | RetVal::SubifAlreadyExists)
    }
}

impl fmt::Display for RetVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetVal::Success => "success",
            RetVal::Unspecified => "unspecified-error",
            RetVal::InvalidSwIfIndex => "invalid-sw-if-index",
            RetVal::NoSuchEntry => "no-such-entry",
            RetVal::InvalidInterface => "invalid-interface",
            RetVal::SubifAlreadyExists => "subif-already-exists",
            RetVal::InvalidValue => "invalid-value",
            RetVal::ValueExist => "value-exist",
            RetVal::BdNotModifiable => "bd-not-modifiable",
        };
        write!(f, "{}({})", s, self.as_raw())
    }
}

/// Error type for transport-level operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport has no live session with the engine.
    #[error("Not connected to the forwarding engine")]
    NotConnected,

    /// Connecting to the engine failed.
    #[error("Connect failed: {reason}")]
    ConnectFailed { reason: String },

    /// The engine rejected a request.
    #[error("Engine returned {retval} for {request}")]
    Rejected { request: String, retval: RetVal },

    /// The transport is shutting down.
    #[error("Transport closed")]
    Closed,
}

impl ApiError {
    /// Creates a connect failure with a reason.
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        ApiError::ConnectFailed {
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::NotConnected | ApiError::ConnectFailed { .. })
    }
}

/// Result type for transport-level operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retval_from_raw() {
        assert_eq!(RetVal::from_raw(0), RetVal::Success);
        assert_eq!(RetVal::from_raw(-79), RetVal::ValueExist);
        assert_eq!(RetVal::from_raw(-6), RetVal::NoSuchEntry);
        assert_eq!(RetVal::from_raw(-9999), RetVal::Unspecified);
    }

    #[test]
    fn test_retval_raw_roundtrip_for_known_codes() {
        for rv in [RetVal::InvalidSwIfIndex, RetVal::InvalidValue, RetVal::BdNotModifiable] {
            assert_eq!(RetVal::from_raw(rv.as_raw()), rv);
        }
    }

    #[test]
    fn test_already_exists_classification() {
        assert!(RetVal::ValueExist.is_already_exists());
        assert!(RetVal::SubifAlreadyExists.is_already_exists());
        assert!(!RetVal::InvalidValue.is_already_exists());
        assert!(!RetVal::Success.is_already_exists());
    }

    #[test]
    fn test_retval_display() {
        assert_eq!(RetVal::ValueExist.to_string(), "value-exist(-79)");
    }

    #[test]
    fn test_error_retryable() {
        assert!(ApiError::NotConnected.is_retryable());
        assert!(ApiError::connect_failed("refused").is_retryable());
        assert!(!ApiError::Closed.is_retryable());
    }
}
