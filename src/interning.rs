//! InterningCollection: `K -> V` map whose values live in a shared
//! [`Interner`], so change detection is a pointer comparison.

use crate::interner::{Interned, Interner};
use crate::lock::{LockedIter, SharedLock};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

/// Map from `K` to interned `V`.
///
/// Every stored value is a handle from the collection's interner. Writing a
/// value that is structurally equal to the one already stored yields the
/// same handle, so [`add`](Self::add) reports "unchanged" without a deep
/// comparison against the old value. Canonicalization is shared by every
/// collection holding the same `Arc<Interner<V>>`.
pub struct InterningCollection<K, V, S = RandomState, VS = RandomState> {
    interner: Arc<Interner<V, VS>>,
    map: SharedLock<HashMap<K, Interned<V>, S>>,
}

impl<K, V, VS> InterningCollection<K, V, RandomState, VS>
where
    K: Eq + Hash,
    V: Eq + Hash,
    VS: BuildHasher,
{
    pub fn new(interner: Arc<Interner<V, VS>>) -> Self {
        Self::with_hasher(interner, Default::default())
    }
}

impl<K, V, S, VS> InterningCollection<K, V, S, VS>
where
    K: Eq + Hash,
    V: Eq + Hash,
    S: BuildHasher,
    VS: BuildHasher,
{
    pub fn with_hasher(interner: Arc<Interner<V, VS>>, hasher: S) -> Self {
        Self {
            interner,
            map: SharedLock::new(HashMap::with_hasher(hasher)),
        }
    }

    pub fn with_capacity_and_hasher(
        interner: Arc<Interner<V, VS>>,
        capacity: usize,
        hasher: S,
    ) -> Self {
        Self {
            interner,
            map: SharedLock::new(HashMap::with_capacity_and_hasher(capacity, hasher)),
        }
    }

    /// The interner this collection canonicalizes through.
    pub fn interner(&self) -> &Arc<Interner<V, VS>> {
        &self.interner
    }

    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().contains_key(key)
    }

    /// The stored handle for `key`. Handles deref to `V` and compare by identity.
    pub fn get<Q>(&self, key: &Q) -> Option<Interned<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Intern `value`, store it under `key`, and report whether the stored
    /// handle changed. A fresh key always counts as changed.
    pub fn add(&self, key: K, value: V) -> bool {
        let handle = self.interner.intern(value);
        let previous = self.map.write().insert(key, handle.clone());
        previous.map_or(true, |old| old != handle)
    }

    /// Intern and store every pair, overwriting existing keys, without
    /// reporting per-key changes.
    pub fn merge<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let handles = self.intern_all(entries);
        log::debug!("interning collection merging {} entries", handles.len());
        self.map.write().extend(handles);
    }

    /// Clear the collection, then [`merge`](Self::merge) `entries`.
    /// Both steps happen under one exclusive acquisition.
    pub fn overwrite<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let handles = self.intern_all(entries);
        log::debug!("interning collection overwritten with {} entries", handles.len());
        let mut map = self.map.write();
        map.clear();
        map.extend(handles);
    }

    /// Remove `key`, returning its handle. Absent keys are a no-op.
    pub fn remove<Q>(&self, key: &Q) -> Option<Interned<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.write().remove(key)
    }

    fn intern_all<I>(&self, entries: I) -> Vec<(K, Interned<V>)>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .map(|(k, v)| (k, self.interner.intern(v)))
            .collect()
    }
}

impl<K, V, S, VS> InterningCollection<K, V, S, VS>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
    S: BuildHasher + Clone,
    VS: BuildHasher,
{
    /// Materialize a plain map by resolving every handle. O(n) clones of `V`.
    pub fn get_all(&self) -> HashMap<K, V, S> {
        let map = self.map.read();
        let mut out = HashMap::with_capacity_and_hasher(map.len(), map.hasher().clone());
        for (k, v) in map.iter() {
            out.insert(k.clone(), V::clone(v));
        }
        out
    }
}

impl<K, V, S, VS> InterningCollection<K, V, S, VS>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash,
    S: BuildHasher,
    VS: BuildHasher,
{
    /// Clone of the stored value rather than its handle.
    pub fn get_value<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.map.read().get(key).map(|v| V::clone(v))
    }

    /// Lazily walk every `(key, handle)` pair under the shared lock.
    ///
    /// Yielded handles are cheap clones and deref to `V`. Writers block until
    /// the iterator is dropped, reads from inside the loop do not;
    /// [`get_all`](Self::get_all) is the copy-then-iterate alternative.
    pub fn iter(&self) -> impl Iterator<Item = (K, Interned<V>)> + '_ {
        // SAFETY: items are owned keys and cloned handles.
        unsafe {
            LockedIter::new(self.map.read(), |map| {
                map.iter().map(|(k, v)| (k.clone(), v.clone()))
            })
        }
    }
}
