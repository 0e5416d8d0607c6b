//! NestedCollection: two-level `K -> I -> V` map under a single lock.

use crate::error::CollectionError;
use crate::lock::{LockedIter, SharedLock};
use crate::record::Tombstone;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;

/// Grouped map: each outer key `K` owns a group `I -> V`.
///
/// One lock guards both levels; inner maps are never handed out by
/// reference, only as copies. Inserting into a group that does not exist yet
/// creates it. `len` counts groups, [`entry_count`](Self::entry_count)
/// counts entries across all groups.
pub struct NestedCollection<K, I, V, S = RandomState> {
    map: SharedLock<HashMap<K, HashMap<I, V, S>, S>>,
}

impl<K, I, V> NestedCollection<K, I, V>
where
    K: Eq + Hash,
    I: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, I, V> Default for NestedCollection<K, I, V>
where
    K: Eq + Hash,
    I: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash,
    I: Eq + Hash,
    S: BuildHasher,
{
    /// `hasher` is cloned into every group the collection creates.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: SharedLock::new(HashMap::with_hasher(hasher)),
        }
    }

    /// `capacity` reserves outer slots only; groups start empty.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            map: SharedLock::new(HashMap::with_capacity_and_hasher(capacity, hasher)),
        }
    }

    /// Whether a group exists for `key`, even an empty one.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().contains_key(key)
    }

    pub fn contains<Q, R>(&self, key: &Q, inner: &R) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        self.map
            .read()
            .get(key)
            .is_some_and(|group| group.contains_key(inner))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Number of entries summed over every group.
    pub fn entry_count(&self) -> usize {
        self.map.read().values().map(|group| group.len()).sum()
    }

    /// Atomically replace both levels.
    pub fn set(&self, map: HashMap<K, HashMap<I, V, S>, S>) {
        log::debug!("nested collection replaced with {} groups", map.len());
        *self.map.write() = map;
    }

    /// Remove one entry. The group stays, even if it becomes empty.
    pub fn remove<Q, R>(&self, key: &Q, inner: &R) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        self.map.write().get_mut(key)?.remove(inner)
    }

    /// Remove a whole group and every entry in it.
    pub fn remove_group<Q>(&self, key: &Q) -> Option<HashMap<I, V, S>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.write().remove(key)
    }
}

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash,
    I: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Insert or overwrite one entry, creating the group if needed.
    pub fn add(&self, key: K, inner: I, value: V) {
        let mut map = self.map.write();
        let hasher = map.hasher().clone();
        map.entry(key)
            .or_insert_with(|| HashMap::with_hasher(hasher))
            .insert(inner, value);
    }
}

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash,
    I: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Clone,
{
    /// Store `value` unless the entry already holds an equal one.
    /// Returns whether the collection changed.
    pub fn add_if_changed(&self, key: K, inner: I, value: V) -> bool {
        use hashbrown::hash_map::Entry;

        let mut map = self.map.write();
        let hasher = map.hasher().clone();
        let group = map
            .entry(key)
            .or_insert_with(|| HashMap::with_hasher(hasher));
        match group.entry(inner) {
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

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash + Clone,
    I: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    pub fn get<Q, R>(&self, key: &Q, inner: &R) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        self.map.read().get(key)?.get(inner).cloned()
    }

    /// Lazily walk every `(key, inner, value)` triple under the shared lock.
    ///
    /// Writers block until the iterator is dropped, reads from inside the
    /// loop do not; use [`get_all`](Self::get_all) to copy first and release
    /// the lock.
    pub fn iter(&self) -> impl Iterator<Item = (K, I, V)> + '_ {
        // SAFETY: items are owned clones of each triple.
        unsafe {
            LockedIter::new(self.map.read(), |map| {
                map.iter().flat_map(|(k, group)| {
                    group
                        .iter()
                        .map(move |(i, v)| (k.clone(), i.clone(), v.clone()))
                })
            })
        }
    }
}

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash + Clone,
    I: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Copy of one group.
    pub fn get_group<Q>(&self, key: &Q) -> Option<HashMap<I, V, S>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().get(key).cloned()
    }

    /// Point-in-time copy of both levels.
    pub fn get_all(&self) -> HashMap<K, HashMap<I, V, S>, S> {
        self.map.read().clone()
    }
}

impl<K, I, V, S> NestedCollection<K, I, V, S>
where
    K: Eq + Hash,
    I: Eq + Hash,
    V: Tombstone,
    S: BuildHasher,
{
    /// Mark one entry deleted without removing it.
    ///
    /// There is no group-level tombstone: both keys are required. Fails with
    /// `MissingGroup` or `MissingEntry` and changes nothing when the target
    /// does not exist.
    pub fn delete<Q, R>(&self, key: &Q, inner: &R) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        self.mark(key, inner, true)
    }

    pub fn undelete<Q, R>(&self, key: &Q, inner: &R) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        self.mark(key, inner, false)
    }

    fn mark<Q, R>(&self, key: &Q, inner: &R, deleted: bool) -> Result<(), CollectionError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        I: Borrow<R>,
        R: ?Sized + Hash + Eq,
    {
        let mut map = self.map.write();
        let group = map.get_mut(key).ok_or_else(|| {
            log::debug!("nested soft-delete (deleted={deleted}) rejected: no group");
            CollectionError::MissingGroup
        })?;
        let value = group.get_mut(inner).ok_or_else(|| {
            log::debug!("nested soft-delete (deleted={deleted}) rejected: no entry");
            CollectionError::MissingEntry
        })?;
        value.mark_deleted(deleted);
        Ok(())
    }
}
