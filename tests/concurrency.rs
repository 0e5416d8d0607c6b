// Multi-threaded behavior of every collection shape.
//
// Invariants exercised:
// - No lost writes: every add from every thread is present afterwards,
//   because writers block rather than skip on contention.
// - No torn reads: a reader never observes a value that no writer stored.
// - Interning identity holds across threads sharing one interner.
// - A live iterator blocks writers until it is dropped.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use syncmap::{
    Identify, IdentitySet, Interned, Interner, InterningCollection, KeyedCollection,
    NestedCollection,
};

const THREADS: usize = 8;
const PER_THREAD: usize = 500;

// Test: concurrent writers to disjoint keys lose nothing.
// Verifies: final len equals the number of distinct keys written.
#[test]
fn concurrent_adds_are_not_dropped() {
    let c: KeyedCollection<usize, usize> = KeyedCollection::new();
    let start = Barrier::new(THREADS);
    thread::scope(|s| {
        for t in 0..THREADS {
            let c = &c;
            let start = &start;
            s.spawn(move || {
                start.wait();
                for i in 0..PER_THREAD {
                    c.add(t * PER_THREAD + i, t);
                }
            });
        }
    });
    assert_eq!(c.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        assert_eq!(c.get(&(t * PER_THREAD)), Some(t));
    }
}

// Values written as whole pairs; a torn write would show mismatched halves.
#[derive(Clone, Debug, PartialEq)]
struct Pair {
    left: u64,
    right: u64,
}

// Test: readers only ever observe complete writes.
// Verifies: every read value satisfies left == right.
#[test]
fn readers_never_see_partial_writes() {
    let c: KeyedCollection<u8, Pair> = KeyedCollection::new();
    c.add(0, Pair { left: 0, right: 0 });
    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let c = &c;
        let done = &done;
        s.spawn(move || {
            for n in 1..5_000u64 {
                c.add(0, Pair { left: n, right: n });
                c.add_if_changed(0, Pair { left: n, right: n });
            }
            done.store(true, Ordering::SeqCst);
        });
        for _ in 0..3 {
            s.spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let p = c.get(&0).expect("key never removed");
                    assert_eq!(p.left, p.right);
                    for (_, p) in c.iter() {
                        assert_eq!(p.left, p.right);
                    }
                }
            });
        }
    });
    assert_eq!(c.get(&0), Some(Pair { left: 4_999, right: 4_999 }));
}

// Test: an open iterator holds off writers until dropped.
// Assumes: the writer thread starts while the iterator is alive.
// Verifies: the write is not visible before the iterator is dropped and is
// visible (not dropped) after.
#[test]
fn iterator_blocks_writers_until_dropped() {
    let c: KeyedCollection<u32, u32> = KeyedCollection::new();
    c.add(1, 1);
    let wrote = AtomicBool::new(false);
    thread::scope(|s| {
        let it = c.iter();
        let writer = s.spawn(|| {
            c.add(2, 2);
            wrote.store(true, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!wrote.load(Ordering::SeqCst), "writer must wait for the reader");
        drop(it);
        writer.join().unwrap();
    });
    assert!(wrote.load(Ordering::SeqCst));
    assert_eq!(c.get(&2), Some(2));
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Network {
    nwid: String,
    routes: Vec<String>,
}

// Test: interning identity across threads and collections.
// Verifies: equal values added from different threads into different
// collections on one interner all share a single canonical allocation.
#[test]
fn interning_identity_across_threads() {
    let interner = Arc::new(Interner::new());
    let collections: Vec<InterningCollection<usize, Network>> = (0..THREADS)
        .map(|_| InterningCollection::new(interner.clone()))
        .collect();
    thread::scope(|s| {
        for c in &collections {
            s.spawn(move || {
                for i in 0..50 {
                    c.add(
                        i,
                        Network {
                            nwid: format!("net-{}", i % 5),
                            routes: vec!["10.0.0.0/8".to_string()],
                        },
                    );
                }
            });
        }
    });
    let first = collections[0].get(&3).unwrap();
    for c in &collections {
        for i in (3..50).step_by(5) {
            assert!(Interned::ptr_eq(&first, &c.get(&i).unwrap()));
        }
    }
    assert_eq!(interner.live_len(), 5);
}

// Test: concurrent change detection on a shared key.
// Verifies: for N threads storing the same value, exactly one add reports a change.
#[test]
fn exactly_one_change_for_identical_writes() {
    let c: InterningCollection<&'static str, Network> =
        InterningCollection::new(Arc::new(Interner::new()));
    let changes = std::sync::atomic::AtomicUsize::new(0);
    let start = Barrier::new(THREADS);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                start.wait();
                let v = Network {
                    nwid: "same".to_string(),
                    routes: vec![],
                };
                if c.add("k", v) {
                    changes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Device {
    id: String,
}

impl Identify for Device {
    fn identifier(&self) -> &str {
        &self.id
    }
}

// Test: set and nested shapes under concurrent writers.
// Verifies: every element and every grouped entry from every thread is present.
#[test]
fn set_and_nested_under_contention() {
    let set: IdentitySet<Arc<Device>> = IdentitySet::new();
    let nested: NestedCollection<usize, usize, usize> = NestedCollection::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let (set, nested) = (&set, &nested);
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    set.add(Arc::new(Device {
                        id: format!("{t}-{i}"),
                    }));
                    nested.add(t, i, t * i);
                }
            });
        }
    });
    assert_eq!(set.len(), THREADS * PER_THREAD);
    assert!(set.find_by_identifier("3-42").is_some());
    assert_eq!(nested.len(), THREADS);
    assert_eq!(nested.entry_count(), THREADS * PER_THREAD);
    assert_eq!(nested.get(&7, &9), Some(63));
}
