//! Ownership tracking: which owner claims which canonical instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::object::Object;

/// An owner's claim on one canonical instance.
pub struct ObjectRef {
    obj: Arc<dyn Object>,
    stale: bool,
}

impl ObjectRef {
    pub fn new(obj: Arc<dyn Object>) -> Self {
        Self { obj, stale: false }
    }

    pub fn obj(&self) -> &Arc<dyn Object> {
        &self.obj
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark(&mut self) {
        self.stale = true;
    }

    pub fn clear(&mut self) {
        self.stale = false;
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}{}]", if self.stale { "stale " } else { "" }, self.obj)
    }
}

/// Identity of an instance: the address of its allocation.
fn identity(obj: &Arc<dyn Object>) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// The set of instances one owner claims, ordered by instance identity.
#[derive(Default)]
pub struct ObjectRefList {
    refs: BTreeMap<usize, ObjectRef>,
}

impl ObjectRefList {
    /// Claims `obj`: an existing claim is refreshed, otherwise a new one is
    /// added. Returns the reference that was not stored, so the caller can
    /// drop it outside any lock.
    pub fn claim(&mut self, obj: Arc<dyn Object>) -> Option<Arc<dyn Object>> {
        match self.refs.get_mut(&identity(&obj)) {
            Some(existing) => {
                existing.clear();
                Some(obj)
            }
            None => {
                self.refs.insert(identity(&obj), ObjectRef::new(obj));
                None
            }
        }
    }

    /// Marks every claim stale.
    pub fn mark(&mut self) {
        for r in self.refs.values_mut() {
            r.mark();
        }
    }

    /// Removes and returns every stale claim.
    pub fn take_stale(&mut self) -> Vec<ObjectRef> {
        let stale: Vec<usize> = self
            .refs
            .iter()
            .filter(|(_, r)| r.is_stale())
            .map(|(id, _)| *id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.refs.remove(&id))
            .collect()
    }

    /// Returns true if `obj` is claimed.
    pub fn contains(&self, obj: &Arc<dyn Object>) -> bool {
        self.refs.contains_key(&identity(obj))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRef> {
        self.refs.values()
    }
}

/// Owner key -> claimed instances.
#[derive(Default)]
pub struct KeyDb {
    owners: BTreeMap<String, ObjectRefList>,
}

impl KeyDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owner's list, creating an empty one if absent.
    pub fn find(&mut self, key: &str) -> &mut ObjectRefList {
        self.owners.entry(key.to_string()).or_default()
    }

    /// Returns the owner's list without creating one.
    pub fn get(&self, key: &str) -> Option<&ObjectRefList> {
        self.owners.get(key)
    }

    /// Removes the owner's whole list.
    pub fn remove(&mut self, key: &str) -> Option<ObjectRefList> {
        self.owners.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
