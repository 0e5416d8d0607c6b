//! KeyedCollection: lock-guarded `K -> V` map with soft-delete.

use crate::error::CollectionError;
use crate::lock::{LockedIter, SharedLock};
use crate::record::{Identify, Tombstone};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;

/// A general map from `K` to `V`, safe to share between threads.
///
/// Every method takes `&self` and is atomic with respect to every other
/// method on the same instance. Reads (`exists`, `get`, `get_all`, `len`,
/// `iter`) share the lock; writes (`add`, `add_if_changed`, `set`, `remove`,
/// `delete`, `undelete`) take it exclusively.
pub struct KeyedCollection<K, V, S = RandomState> {
    map: SharedLock<HashMap<K, V, S>>,
}

impl<K, V> KeyedCollection<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V> Default for KeyedCollection<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: SharedLock::new(HashMap::with_hasher(hasher)),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            map: SharedLock::new(HashMap::with_capacity_and_hasher(capacity, hasher)),
        }
    }

    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Insert or overwrite.
    pub fn add(&self, key: K, value: V) {
        self.map.write().insert(key, value);
    }

    /// Remove the entry for `key`, returning it if it was present.
    /// Absent keys leave the collection untouched.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.write().remove(key)
    }

    /// Atomically replace the whole backing map.
    pub fn set(&self, map: HashMap<K, V, S>) {
        log::debug!("keyed collection replaced with {} entries", map.len());
        *self.map.write() = map;
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Store `value` only if the key is absent or its stored value differs
    /// under `V: PartialEq`. Returns whether the collection changed.
    ///
    /// The comparison is exactly as deep as `V`'s `PartialEq`: a derived impl
    /// recurses into nested structs and sequences, a hand-written one that
    /// skips a field will under-report changes to that field.
    pub fn add_if_changed(&self, key: K, value: V) -> bool {
        use hashbrown::hash_map::Entry;

        match self.map.write().entry(key) {
            Entry::Occupied(o) if *o.get() == value => false,
            Entry::Occupied(mut o) => {
                o.insert(value);
                true
            }
            Entry::Vacant(v) => {
                v.insert(value);
                true
            }
        }
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Clone of the stored value, or `None` when the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().get(key).cloned()
    }

    /// Lazily walk every `(key, value)` pair.
    ///
    /// The shared lock is held until the iterator is exhausted or dropped, so
    /// a slow consumer stalls every writer on this collection. Reads of the
    /// same collection from inside the loop are fine; calling a write method
    /// of the same collection deadlocks (debug builds panic instead). For
    /// large collections or slow consumers, iterate over
    /// [`get_all`](Self::get_all) instead: one O(n) copy in exchange for
    /// releasing the lock immediately.
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        // SAFETY: items are owned clones of each pair.
        unsafe {
            LockedIter::new(self.map.read(), |map| {
                map.iter().map(|(k, v)| (k.clone(), v.clone()))
            })
        }
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Point-in-time copy of the whole map.
    pub fn get_all(&self) -> HashMap<K, V, S> {
        self.map.read().clone()
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Identify + Clone,
    S: BuildHasher,
{
    /// Linear scan for the first entry whose value reports `id`.
    /// With duplicate identifiers, which entry wins is unspecified.
    pub fn find_by_identifier(&self, id: &str) -> Option<(K, V)> {
        self.map
            .read()
            .iter()
            .find(|(_, v)| v.identifier() == id)
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}

impl<K, V, S> KeyedCollection<K, V, S>
where
    K: Eq + Hash,
    V: Tombstone,
    S: BuildHasher,
{
    /// Mark the stored value deleted without removing it.
    ///
    /// Fails with [`CollectionError::MissingKey`] and changes nothing when
    /// there is no entry for `key`.
    pub fn delete<Q>(&self, key: &Q) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.mark(key, true)
    }

    /// Clear the deleted mark set by [`delete`](Self::delete).
    pub fn undelete<Q>(&self, key: &Q) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.mark(key, false)
    }

    fn mark<Q>(&self, key: &Q, deleted: bool) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.map.write().get_mut(key) {
            Some(v) => {
                v.mark_deleted(deleted);
                Ok(())
            }
            None => {
                log::debug!("soft-delete (deleted={deleted}) rejected: key not present");
                Err(CollectionError::MissingKey)
            }
        }
    }
}
