//! Type-safe engine handle wrappers.
//!
//! The engine hands out 32-bit indices for the resources it creates. This
//! module wraps them in strongly-typed handles so an interface index can't be
//! mixed up with an arbitrary integer such as a bridge-domain id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw handle type as carried in engine messages.
pub type RawHandle = u32;

/// Marker trait for engine resource kinds.
pub trait HandleKind: Send + Sync + 'static {
    /// Returns the resource kind name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe engine handle.
///
/// # Examples
///
/// ```
/// use vom_api::{InterfaceHandle, Handle};
///
/// let itf = InterfaceHandle::new(3);
/// assert!(itf.is_valid());
/// assert!(!InterfaceHandle::INVALID.is_valid());
/// ```
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Handle<T: HandleKind> {
    raw: RawHandle,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: HandleKind> Handle<T> {
    /// The engine's "no such resource" value (`~0`).
    pub const INVALID: Self = Self {
        raw: RawHandle::MAX,
        _marker: PhantomData,
    };

    /// Creates a handle from a raw value.
    pub const fn new(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the raw value.
    pub const fn value(&self) -> RawHandle {
        self.raw
    }

    /// Returns true unless this is [`Handle::INVALID`].
    pub const fn is_valid(&self) -> bool {
        self.raw != RawHandle::MAX
    }
}

impl<T: HandleKind> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: HandleKind> Copy for Handle<T> {}

impl<T: HandleKind> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::type_name(), self)
    }
}

impl<T: HandleKind> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.raw)
        } else {
            write!(f, "invalid")
        }
    }
}

impl<T: HandleKind> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: HandleKind> Eq for Handle<T> {}

impl<T: HandleKind> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: HandleKind> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: HandleKind> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: HandleKind> Default for Handle<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

macro_rules! define_handle_kind {
    ($name:ident, $type_name:literal, $alias:ident) => {
        /// Marker type for $type_name handles.
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl HandleKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        /// Type alias for $type_name handles.
        pub type $alias = Handle<$name>;
    };
}

define_handle_kind!(InterfaceKind, "Interface", InterfaceHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_creation() {
        let h = InterfaceHandle::new(7);
        assert_eq!(h.value(), 7);
        assert!(h.is_valid());
    }

    #[test]
    fn test_invalid_handle() {
        assert!(!InterfaceHandle::INVALID.is_valid());
        assert_eq!(InterfaceHandle::default(), InterfaceHandle::INVALID);
        assert_eq!(InterfaceHandle::INVALID.to_string(), "invalid");
    }

    #[test]
    fn test_handle_debug() {
        let debug = format!("{:?}", InterfaceHandle::new(10));
        assert_eq!(debug, "Interface(10)");
    }

    #[test]
    fn test_handle_ordering() {
        assert!(InterfaceHandle::new(1) < InterfaceHandle::new(2));
        assert_eq!(InterfaceHandle::new(4), InterfaceHandle::new(4));
    }
}
