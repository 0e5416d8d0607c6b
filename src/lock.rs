//! Per-instance blocking read-write lock with a debug-only reentrancy guard.
//!
//! Every collection owns exactly one `SharedLock` around its backing map.
//! Reads take the shared side, writes the exclusive side, and acquisition
//! always blocks until granted; there is no try-and-skip path.
//!
//! Shared acquisition is recursive: a thread that already holds the shared
//! side (for example inside an `iter` loop) gets it again immediately, even
//! when a writer is queued. A fair `read` would park behind that writer,
//! which is itself waiting on the first guard.
//!
//! Exclusive acquisition is never reentrant. Calling `add` inside an `iter`
//! loop over the same collection, or reading while holding the write side,
//! would deadlock on the underlying lock. In debug builds each thread
//! remembers which locks it holds and in which mode, and panics on those
//! nestings instead. In release builds the tracker compiles to a zero-sized
//! no-op.

use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(debug_assertions)]
thread_local! {
    static HELD: core::cell::RefCell<Vec<(usize, Mode)>> = const { core::cell::RefCell::new(Vec::new()) };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Shared,
    Exclusive,
}

/// RAII marker that records "this thread holds lock `addr` in `mode`".
struct Reentry {
    #[cfg(debug_assertions)]
    addr: usize,
    #[cfg(debug_assertions)]
    mode: Mode,
    // Guards are released on the thread that took them.
    _nosend: PhantomData<*mut ()>,
}

impl Reentry {
    #[inline]
    fn enter(addr: usize, mode: Mode) -> Self {
        #[cfg(debug_assertions)]
        {
            HELD.with(|held| {
                let mut held = held.borrow_mut();
                let conflict = held.iter().any(|&(a, m)| {
                    a == addr && (m == Mode::Exclusive || mode == Mode::Exclusive)
                });
                assert!(
                    !conflict,
                    "reentrancy detected: collection lock re-acquired by the thread holding it"
                );
                held.push((addr, mode));
            });
            Reentry {
                addr,
                mode,
                _nosend: PhantomData,
            }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = (addr, mode);
            Reentry {
                _nosend: PhantomData,
            }
        }
    }
}

impl Drop for Reentry {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let entry = (self.addr, self.mode);
            let _ = HELD.try_with(|held| {
                let mut held = held.borrow_mut();
                if let Some(pos) = held.iter().rposition(|&e| e == entry) {
                    held.swap_remove(pos);
                }
            });
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SharedLock<T> {
    inner: RwLock<T>,
}

impl<T> SharedLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    #[inline]
    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// Block until the shared side is granted. Succeeds immediately if this
    /// thread already holds the shared side.
    pub(crate) fn read(&self) -> ReadGuard<'_, T> {
        let reentry = Reentry::enter(self.addr(), Mode::Shared);
        ReadGuard {
            guard: self.inner.read_recursive(),
            _reentry: reentry,
        }
    }

    /// Block until the exclusive side is granted.
    pub(crate) fn write(&self) -> WriteGuard<'_, T> {
        let reentry = Reentry::enter(self.addr(), Mode::Exclusive);
        WriteGuard {
            guard: self.inner.write(),
            _reentry: reentry,
        }
    }
}

pub(crate) struct ReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    _reentry: Reentry,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

pub(crate) struct WriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    _reentry: Reentry,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Lazy, single-pass iterator that keeps the collection's shared lock for
/// as long as it is alive.
///
/// Writers on the same collection block until the iterator is exhausted or
/// dropped; stopping early is simply dropping it. Items are owned clones, so
/// nothing yielded can outlive the guard's protection.
pub(crate) struct LockedIter<'a, T, I> {
    // Declared before `_guard` so it is dropped while the lock is still held.
    inner: I,
    _guard: ReadGuard<'a, T>,
}

impl<'a, T: 'a, I: Iterator> LockedIter<'a, T, I> {
    /// Build the iterator from a borrow of the guarded data.
    ///
    /// # Safety
    ///
    /// `make` is handed `&'a T` even though the data is only protected while
    /// `guard` lives. The caller must ensure that `I::Item` never borrows
    /// from `T` (items are owned clones), so nothing yielded outlives the
    /// guard.
    pub(crate) unsafe fn new<F>(guard: ReadGuard<'a, T>, make: F) -> Self
    where
        F: FnOnce(&'a T) -> I,
    {
        // SAFETY: `T` lives inside the `RwLock` borrowed for `'a`, not inside
        // the guard, so moving the guard does not move it. The shared guard is
        // stored next to `inner` and released only after `inner` is dropped,
        // so no writer can reach `T` while `inner` borrows it. The caller
        // guarantees items are owned, so no borrow escapes the iterator.
        let data: &'a T = unsafe { &*(&*guard as *const T) };
        Self {
            inner: make(data),
            _guard: guard,
        }
    }
}

impl<T, I: Iterator> Iterator for LockedIter<'_, T, I> {
    type Item = I::Item;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
