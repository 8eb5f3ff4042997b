//! HW items: desired data paired with the last remote result.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::rc::ResultCode;

#[derive(Debug, Clone)]
struct ItemState<T> {
    data: T,
    rc: ResultCode,
}

/// One attribute of an entity as it is believed to stand in the engine.
///
/// The cell is shared between the owning entity and the commands that act on
/// it, so a command can record the reply (and e.g. the handle the engine
/// assigned) after the entity has moved on. [`HwItem::share`] hands out the
/// same cell; `clone()` makes an independent copy.
pub struct HwItem<T> {
    inner: Arc<Mutex<ItemState<T>>>,
}

impl<T: Clone + PartialEq> HwItem<T> {
    /// Creates an item that has never been written to the engine.
    pub fn new(data: T) -> Self {
        Self::with_rc(data, ResultCode::Unset)
    }

    /// Creates an item with a known result code.
    pub fn with_rc(data: T, rc: ResultCode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ItemState { data, rc })),
        }
    }

    /// Returns another handle on the same cell.
    pub fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns a copy of the data.
    pub fn data(&self) -> T {
        self.inner.lock().data.clone()
    }

    /// Returns the last result code.
    pub fn rc(&self) -> ResultCode {
        self.inner.lock().rc
    }

    /// Records the result of a remote operation.
    pub fn set(&self, rc: ResultCode) {
        self.inner.lock().rc = rc;
    }

    /// Overwrites the data, leaving the result code alone.
    pub fn set_data(&self, data: T) {
        self.inner.lock().data = data;
    }

    /// Overwrites both data and result code.
    pub fn set_with(&self, data: T, rc: ResultCode) {
        let mut state = self.inner.lock();
        state.data = data;
        state.rc = rc;
    }

    /// True iff the last remote operation on this item succeeded.
    pub fn is_configured(&self) -> bool {
        self.rc().is_ok()
    }

    /// Takes the desired data and reports whether a remote call is needed:
    /// the data differs or the last attempt did not succeed.
    pub fn update(&self, desired: &HwItem<T>) -> bool {
        let want = desired.data();
        let mut state = self.inner.lock();
        let need = state.data != want || state.rc != ResultCode::Ok;
        state.data = want;
        need
    }
}

impl<T: Clone> Clone for HwItem<T> {
    fn clone(&self) -> Self {
        let state = self.inner.lock().clone();
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HwItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("HwItem")
            .field("data", &state.data)
            .field("rc", &state.rc)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for HwItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        write!(f, "hw-item:[rc:{} data:{}]", state.rc, state.data)
    }
}
