//! Interner: canonical store that maps structurally equal values to one
//! shared allocation, so equality becomes a pointer comparison.
//!
//! Layout
//! - `index`: `HashTable<Slot<V>>`, each slot keeping the value's
//!   precomputed hash and a `Weak` to the canonical allocation. Probing and
//!   rehashing use the stored hash; `V: Hash` runs once per `intern` call.
//! - Handles (`Interned<V>`) own the strong references. The table never
//!   keeps a value alive on its own: when the last handle drops, the slot
//!   goes dead and is reclaimed by the next prune.
//!
//! Equality contract
//! - `V: Eq + Hash` is the canonicalization function. It must be total and
//!   structural (field by field, recursing into nested sequences), and
//!   `Hash` must agree with it. Derived impls satisfy this; a hand-written
//!   `PartialEq` that ignores a field makes values differing only in that
//!   field share one handle. This is not detected at runtime.
//!
//! Locking
//! - One `parking_lot::Mutex` guards the table. Collections intern before
//!   taking their own lock, so the interner is never acquired while a
//!   collection lock is held.

use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::ops::Deref;
use hashbrown::HashTable;
use parking_lot::Mutex;
use std::collections::hash_map::RandomState;
use std::sync::{Arc, Weak};

// Slots below this count are never pruned.
const MIN_PRUNE_AT: usize = 64;

/// Canonical, identity-comparable handle to an interned value.
///
/// Clones are cheap. `==` and `Hash` use the allocation address, so two
/// handles are equal iff they came from the same interner for structurally
/// equal values while at least one handle stayed alive.
pub struct Interned<V> {
    value: Arc<V>,
}

impl<V> Interned<V> {
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }

    /// Borrow the canonical value.
    #[inline]
    pub fn get(&self) -> &V {
        &self.value
    }
}

impl<V> Clone for Interned<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<V> Deref for Interned<V> {
    type Target = V;
    #[inline]
    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V> PartialEq for Interned<V> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<V> Eq for Interned<V> {}

impl<V> Hash for Interned<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.value) as usize).hash(state);
    }
}

impl<V: fmt::Debug> fmt::Debug for Interned<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Interned").field(&*self.value).finish()
    }
}

struct Slot<V> {
    hash: u64,
    value: Weak<V>,
}

struct Table<V> {
    index: HashTable<Slot<V>>,
    // Prune dead slots once the table reaches this many.
    prune_at: usize,
}

impl<V: Eq> Table<V> {
    /// Upgrade the slot holding a value equal to `value`, if it is still live.
    /// The upgrade happens inside the probe so a handle dropped concurrently
    /// can never be returned half-dead.
    fn find_live(&self, hash: u64, value: &V) -> Option<Arc<V>> {
        let mut hit = None;
        self.index.find(hash, |slot| {
            if slot.hash != hash {
                return false;
            }
            match slot.value.upgrade() {
                Some(live) if *live == *value => {
                    hit = Some(live);
                    true
                }
                _ => false,
            }
        })?;
        hit
    }
}

impl<V> Table<V> {
    fn prune(&mut self) -> usize {
        let before = self.index.len();
        self.index.retain(|slot| slot.value.strong_count() > 0);
        let removed = before - self.index.len();
        self.prune_at = MIN_PRUNE_AT.max(self.index.len() * 2);
        removed
    }
}

/// Shared canonicalization service for `InterningCollection`s.
///
/// Create one per value type (or per isolated test), wrap it in an `Arc`, and
/// hand clones of that `Arc` to every collection that should share
/// canonical values.
pub struct Interner<V, S = RandomState> {
    hasher: S,
    table: Mutex<Table<V>>,
}

impl<V> Interner<V>
where
    V: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<V> Default for Interner<V>
where
    V: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S> Interner<V, S>
where
    V: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            table: Mutex::new(Table {
                index: HashTable::with_capacity(capacity),
                prune_at: MIN_PRUNE_AT.max(capacity),
            }),
        }
    }

    /// Return the live canonical handle for a value equal to `value`, or
    /// store `value` as the new canonical one.
    pub fn intern(&self, value: V) -> Interned<V> {
        let hash = self.hasher.hash_one(&value);
        let mut table = self.table.lock();
        if let Some(value) = table.find_live(hash, &value) {
            return Interned { value };
        }

        let value = Arc::new(value);
        table.index.insert_unique(
            hash,
            Slot {
                hash,
                value: Arc::downgrade(&value),
            },
            |slot| slot.hash,
        );
        if table.index.len() >= table.prune_at {
            let removed = table.prune();
            log::trace!(
                "interner pruned {removed} dead slots, {} remain",
                table.index.len()
            );
        }
        Interned { value }
    }

    /// Look up the canonical handle for `value` without storing it.
    pub fn lookup(&self, value: &V) -> Option<Interned<V>> {
        let hash = self.hasher.hash_one(value);
        let table = self.table.lock();
        table.find_live(hash, value).map(|value| Interned { value })
    }
}

impl<V, S> Interner<V, S> {
    /// Slots currently tracked, including dead ones awaiting prune.
    pub fn len(&self) -> usize {
        self.table.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().index.is_empty()
    }

    /// Canonical values that still have at least one live handle.
    pub fn live_len(&self) -> usize {
        self.table
            .lock()
            .index
            .iter()
            .filter(|slot| slot.value.strong_count() > 0)
            .count()
    }

    /// Drop every dead slot now. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let removed = self.table.lock().prune();
        log::trace!("interner purge removed {removed} dead slots");
        removed
    }
}
