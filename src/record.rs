//! Capabilities a stored value or set element can expose to a collection.

/// A caller-defined stable identifier, independent of the map key.
pub trait Identify {
    fn identifier(&self) -> &str;
}

/// Tombstone flag used by `delete`/`undelete`.
///
/// Implementations must only flip the deleted marker and leave every other
/// field untouched, so that `delete` followed by `undelete` restores the
/// value exactly.
pub trait Tombstone {
    fn mark_deleted(&mut self, deleted: bool);
}

impl<T: Identify + ?Sized> Identify for Box<T> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

impl<T: Identify + ?Sized> Identify for std::sync::Arc<T> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

impl<T: Tombstone + ?Sized> Tombstone for Box<T> {
    fn mark_deleted(&mut self, deleted: bool) {
        (**self).mark_deleted(deleted)
    }
}
