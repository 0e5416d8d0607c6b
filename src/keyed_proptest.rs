// Property tests for KeyedCollection kept inside the crate so the model can
// also run against a constant (all-colliding) hasher.

use crate::error::CollectionError;
use crate::keyed::KeyedCollection;
use crate::record::Tombstone;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Rec {
    n: i32,
    deleted: bool,
}
impl Tombstone for Rec {
    fn mark_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
fn rec(n: i32) -> Rec {
    Rec { n, deleted: false }
}

// Pool-indexed operations so shrinking converges on few keys.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    AddIfChanged(usize, i32),
    Remove(usize),
    Delete(usize),
    Undelete(usize),
    Get(usize),
    Exists(String),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let exists_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), -3i32..3).prop_map(|(i, v)| OpI::Add(i, v)),
            (idx.clone(), -3i32..3).prop_map(|(i, v)| OpI::AddIfChanged(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Delete),
            idx.clone().prop_map(OpI::Undelete),
            idx.clone().prop_map(OpI::Get),
            prop_oneof![exists_pool, "[a-z]{0,4}".prop_map(|s| s)].prop_map(OpI::Exists),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drive one scenario against `sut`, mirroring every op on a std HashMap model.
// Invariants checked after each op:
// - `get`/`exists` parity with the model, including soft-delete flags.
// - `add_if_changed` returns true iff the model value changed or was absent.
// - `delete`/`undelete` fail with MissingKey iff the key is absent.
// - `iter` and `get_all` expose exactly the model's entries; `len` parity.
fn run_scenario<S>(
    sut: KeyedCollection<Key, Rec, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model: HashMap<Key, Rec> = HashMap::new();
    for op in ops {
        match op {
            OpI::Add(i, v) => {
                let k = key_from(pool, i);
                sut.add(k.clone(), rec(v));
                model.insert(k, rec(v));
            }
            OpI::AddIfChanged(i, v) => {
                let k = key_from(pool, i);
                let expect = model.get(&k) != Some(&rec(v));
                prop_assert_eq!(sut.add_if_changed(k.clone(), rec(v)), expect);
                if expect {
                    model.insert(k, rec(v));
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            OpI::Delete(i) | OpI::Undelete(i) => {
                let deleted = matches!(op, OpI::Delete(_));
                let k = key_from(pool, i);
                let res = if deleted {
                    sut.delete(&k)
                } else {
                    sut.undelete(&k)
                };
                match model.get_mut(&k) {
                    Some(m) => {
                        prop_assert_eq!(res, Ok(()));
                        m.deleted = deleted;
                    }
                    None => prop_assert_eq!(res, Err(CollectionError::MissingKey)),
                }
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k).cloned());
            }
            OpI::Exists(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.exists(s.as_str()), has_model);
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<Key> = sut.iter().map(|(k, _)| k).collect();
                let m_keys: BTreeSet<Key> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                let all = sut.get_all();
                for (k, v) in &model {
                    prop_assert_eq!(all.get(k), Some(v));
                }
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(KeyedCollection::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(KeyedCollection::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
