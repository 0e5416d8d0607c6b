//! IdentitySet: lock-guarded set of elements that carry their own identifier.

use crate::lock::{LockedIter, SharedLock};
use crate::record::Identify;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashSet;
use std::collections::hash_map::RandomState;

/// Set of `K` with lookup by [`Identify::identifier`].
///
/// Membership is decided by `K: Eq`, not by the identifier. Two distinct
/// elements may report the same identifier; `find_by_identifier` then
/// returns one of them and which one is unspecified.
pub struct IdentitySet<K, S = RandomState> {
    set: SharedLock<HashSet<K, S>>,
}

impl<K> IdentitySet<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K> Default for IdentitySet<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> IdentitySet<K, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            set: SharedLock::new(HashSet::with_hasher(hasher)),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            set: SharedLock::new(HashSet::with_capacity_and_hasher(capacity, hasher)),
        }
    }

    pub fn exists<Q>(&self, element: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.set.read().contains(element)
    }

    /// Returns `true` if the element was not already present.
    pub fn add(&self, element: K) -> bool {
        self.set.write().insert(element)
    }

    /// Returns `true` if the element was present. Absent elements are a no-op.
    pub fn remove<Q>(&self, element: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.set.write().remove(element)
    }

    pub fn len(&self) -> usize {
        self.set.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.read().is_empty()
    }
}

impl<K, S> IdentitySet<K, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Lazily walk every element under the shared lock.
    ///
    /// Writers block until the iterator is dropped, while reads of the same
    /// set from inside the loop proceed; see [`snapshot`](Self::snapshot)
    /// for the copy-then-iterate alternative.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        // SAFETY: items are owned clones of each element.
        unsafe { LockedIter::new(self.set.read(), |set| set.iter().cloned()) }
    }

    /// Point-in-time copy of the elements, in unspecified order.
    pub fn snapshot(&self) -> Vec<K> {
        self.set.read().iter().cloned().collect()
    }
}

impl<K, S> IdentitySet<K, S>
where
    K: Eq + Hash + Clone + Identify,
    S: BuildHasher,
{
    /// Linear scan for an element reporting `id`.
    pub fn find_by_identifier(&self, id: &str) -> Option<K> {
        self.set
            .read()
            .iter()
            .find(|k| k.identifier() == id)
            .cloned()
    }
}
