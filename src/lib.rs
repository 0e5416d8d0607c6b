//! syncmap: lock-guarded generic maps and sets for state shared between
//! many reader and writer threads.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: hold shared runtime records (peers, devices, networks) behind
//!   `&self` methods so callers never lock anything themselves.
//! - Shapes, all independent of one another:
//!   - KeyedCollection<K, V, S>: `K -> V` with snapshot reads and
//!     soft-delete (`delete`/`undelete` flip a tombstone on the value).
//!   - IdentitySet<K, S>: set of self-identifying elements with lookup by
//!     identifier.
//!   - InterningCollection<K, V, S>: `K -> V` whose values are canonicalized
//!     through a shared `Interner`, so `add` reports change with a pointer
//!     comparison instead of a deep one.
//!   - NestedCollection<K, I, V, S>: `K -> I -> V` grouped data under one
//!     lock, with whole-group removal.
//!
//! Locking
//! - Exactly one `parking_lot::RwLock` per instance (`lock::SharedLock`).
//!   Reads share it, writes take it exclusively, and every acquisition
//!   blocks until granted. Nothing is ever skipped on contention.
//! - No method of one instance calls into another instance, so two
//!   collection locks are never held together by this crate.
//! - `iter()` keeps the shared lock for the iterator's whole life. This
//!   serializes writers behind slow consumers; `get_all()`/`snapshot()` is
//!   the copy-then-iterate alternative and is what large collections should
//!   use. Items are yielded as owned clones, so keep `V` cheap to clone
//!   (e.g. `Arc<T>`) when iterating often.
//! - Shared acquisition is recursive, so reading a collection inside its
//!   own `iter()` loop never queues behind a waiting writer.
//! - Debug builds panic on same-thread exclusive re-acquisition (which
//!   would otherwise deadlock), e.g. writing to a collection inside its own
//!   `iter()` loop.
//!
//! Equality and interning
//! - `add_if_changed` uses `V: PartialEq`; it is exactly as deep as that
//!   impl. Derive it so nested sequences participate.
//! - `Interner` is an explicit service passed as `Arc<Interner<V>>`. Two
//!   handles compare equal iff they point at the same canonical allocation.
//!   `V: Eq + Hash` must be structural and consistent; an incomplete impl
//!   silently merges distinct values and is not detected at runtime.
//! - The interner keeps weak references only: a canonical value is freed
//!   once no collection (or caller) holds its handle.
//!
//! Missing keys
//! - Reads report absence through `Option`/`bool` and never fail.
//! - `delete`/`undelete` of an absent key return `Err(CollectionError)` and
//!   change nothing. Nested `add` always creates the group it writes into.
//!
//! Notes and non-goals
//! - Purely in-memory: no persistence, serialization, or replication.
//! - No multi-key transactions beyond `set`/`overwrite` replacing a whole
//!   instance atomically.
//! - Values are not deep-copied on insert; mutate them only through the
//!   collection (soft-delete) once stored.

mod error;
mod identity_set;
mod interner;
mod interning;
mod keyed;
#[cfg(test)]
mod keyed_proptest;
mod lock;
mod nested;
mod record;

// Public surface
pub use error::CollectionError;
pub use identity_set::IdentitySet;
pub use interner::{Interned, Interner};
pub use interning::InterningCollection;
pub use keyed::KeyedCollection;
pub use nested::NestedCollection;
pub use record::{Identify, Tombstone};

pub use hashbrown::HashMap;
