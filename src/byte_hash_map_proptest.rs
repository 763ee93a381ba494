#![cfg(test)]

// Property tests for ByteHashMap kept inside the crate so they can reach
// `Handle` internals without widening the public surface.

use crate::byte_hash_map::{ByteHashMap, Handle, InsertError, KeyHasher};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hasher;

// Keys drawn from a tiny alphabet that includes the zero byte, so that
// prefixes, embedded zeros and the empty key all show up.
fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(0u8), Just(b'a'), Just(b'b')], 0..4)
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(Vec<u8>),
    Mutate(usize, i32),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<OpI>)> {
    proptest::collection::vec(arb_key(), 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            arb_key().prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap<Vec<u8>, _>.
// Checked after every op: stale handles never resolve, len/is_empty parity.
fn run_state_machine<S: KeyHasher>(
    mut sut: ByteHashMap<i32, S>,
    pool: &[Vec<u8>],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Vec<u8>, i32> = HashMap::new();
    let mut live: HashMap<Vec<u8>, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = &pool[i];
                let already = model.contains_key(k);
                match sut.insert(k.clone().into_boxed_slice(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        let prev = live.insert(k.clone(), h);
                        prop_assert!(prev.is_none());
                        model.insert(k.clone(), v);
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                if let Some(h) = live.remove(k) {
                    let (kk, vv) = sut.remove(h).expect("handle valid for removal");
                    prop_assert_eq!(&*kk, k.as_slice());
                    let mv = model.remove(k).expect("present in model");
                    prop_assert_eq!(vv, mv);
                    stale.push(h);
                } else {
                    prop_assert!(sut.find(k).is_none());
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k);
                prop_assert_eq!(found.is_some(), model.contains_key(k));
                if let Some(h) = found {
                    prop_assert_eq!(Some(&h), live.get(k));
                    prop_assert_eq!(h.value(&sut), model.get(k));
                }
            }
            OpI::Contains(k) => {
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    match h.value_mut(&mut sut) {
                        Some(vr) => {
                            *vr = vr.saturating_add(d);
                            if let Some(mv) = model.get_mut(k) {
                                *mv = mv.saturating_add(d);
                            }
                        }
                        None => prop_assert!(false, "live handle should resolve"),
                    }
                }
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<Vec<u8>> = sut.iter().map(|(_, k, _)| k.to_vec()).collect();
                let m_keys: BTreeSet<Vec<u8>> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
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
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(ByteHashMap::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(ByteHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    // Equal byte strings hash identically; unequal lengths never compare equal.
    #[test]
    fn prop_hash_consistent_with_equality(a in arb_key(), b in arb_key()) {
        let hasher = std::collections::hash_map::RandomState::new();
        if crate::bytes_eq(&a, &b) {
            prop_assert_eq!(hasher.hash_key(&a), hasher.hash_key(&b));
        }
        prop_assert_eq!(crate::bytes_eq(&a, &b), a == b);
    }
}
