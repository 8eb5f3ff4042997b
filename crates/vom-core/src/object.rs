//! The entity traits.

use std::fmt;
use std::sync::Arc;

/// Any configuration object the model tracks.
pub trait Object: fmt::Display + Send + Sync + 'static {
    /// Enqueues the commands that remove this object from the engine.
    fn sweep(&self);

    /// Enqueues the commands that recreate this object in an empty engine.
    fn replay(&self);
}

/// A configuration object with one canonical instance per key.
///
/// `Drop` of a canonical instance is expected to call `sweep()` and then
/// release its key from the type's [`SingularDb`](crate::SingularDb).
pub trait Entity: Object + Sized {
    /// Domain key identifying the canonical instance.
    type Key: Ord + Clone + fmt::Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;

    /// Returns the canonical instance for this object's key, creating it
    /// from `self` if there is none.
    fn singular(&self) -> Arc<Self>;

    /// Moves the canonical instance towards `desired`, enqueueing only the
    /// commands for attributes not already in place.
    fn update(&self, desired: &Self);
}
