#![cfg(test)]

// Property tests for Dict kept inside the crate so they can inspect both
// tables while a migration is in flight.

use crate::dict::{Dict, SetOutcome};
use crate::dict_type::{StdHash, Value};
use crate::error::DictError;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations: indices shrink to earlier keys, the pool shrinks,
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Set(usize, i32),
    Delete(usize),
    Take(usize),
    Find(usize),
    Step(usize),
    Expand(usize),
    Resize,
    Iterate,
    SafeSweep(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            2 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Take),
            2 => idx.clone().prop_map(OpI::Find),
            1 => (0usize..8).prop_map(OpI::Step),
            1 => (0usize..64).prop_map(OpI::Expand),
            1 => Just(OpI::Resize),
            1 => Just(OpI::Iterate),
            1 => idx.clone().prop_map(OpI::SafeSweep),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn check_invariants<S: BuildHasher>(sut: &Dict<String, i32, StdHash<S>>, model: &HashMap<String, i32>) {
    assert_eq!(sut.len(), model.len());
    assert!(sut.table_size(0) == 0 || sut.table_size(0).is_power_of_two());
    if !sut.is_rehashing() {
        assert_eq!(sut.table_size(1), 0);
        assert_eq!(sut.table_used(1), 0);
    }
    let stats = sut.stats();
    assert_eq!(stats.main.total_chain_len, stats.main.used);
    if let Some(t) = &stats.rehash_target {
        assert_eq!(t.total_chain_len, t.used);
    }
}

fn run_scenario<S: BuildHasher>(
    mut sut: Dict<String, i32, StdHash<S>>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(_) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        model.insert(k, v);
                    }
                    Err(DictError::KeyAlreadyExists) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                    Err(e) => prop_assert!(false, "unexpected error {:?}", e),
                }
            }
            OpI::Set(i, v) => {
                let k = pool[i].clone();
                let outcome = sut.set(k.clone(), v).unwrap();
                let prev = model.insert(k, v);
                prop_assert_eq!(outcome == SetOutcome::Replaced, prev.is_some());
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                let res = sut.delete(k);
                prop_assert_eq!(res.is_ok(), model.remove(k).is_some());
            }
            OpI::Take(i) => {
                let k = &pool[i];
                match (sut.take(k), model.remove(k)) {
                    (Ok((kk, vv)), Some(mv)) => {
                        prop_assert_eq!(&kk, k);
                        prop_assert_eq!(vv, Value::Ptr(mv));
                    }
                    (Err(DictError::KeyNotFound), None) => {}
                    (r, m) => prop_assert!(false, "take mismatch: {:?} vs {:?}", r, m),
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let got = sut.get(k).cloned();
                prop_assert_eq!(got, model.get(k).map(|v| Value::Ptr(*v)));
            }
            OpI::Step(n) => {
                let still = sut.rehash(n);
                prop_assert_eq!(still, sut.is_rehashing());
            }
            OpI::Expand(size) => {
                let rehashing = sut.is_rehashing();
                let used = sut.table_used(0);
                let res = sut.expand(size);
                prop_assert_eq!(res.is_ok(), !rehashing && size >= used);
            }
            OpI::Resize => {
                let rehashing = sut.is_rehashing();
                prop_assert_eq!(sut.resize().is_ok(), !rehashing);
            }
            OpI::Iterate => {
                let keys: Vec<String> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let s_keys: BTreeSet<_> = keys.iter().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(keys.len(), s_keys.len(), "iteration yielded a duplicate");
                prop_assert_eq!(s_keys, m_keys);
            }
            OpI::SafeSweep(i) => {
                // Delete every yielded entry whose key sorts before pool[i]
                // and insert pool[i] mid-walk; the final key set must match
                // the same operations issued without an iterator.
                let pivot = pool[i].clone();
                let mut it = sut.safe_iter();
                let mut inserted = false;
                while let Some(h) = it.next_entry(&sut) {
                    let k = h.key_ref(&sut).cloned().unwrap();
                    if k < pivot {
                        sut.delete(&k).unwrap();
                        model.remove(&k);
                    }
                    if !inserted {
                        inserted = true;
                        if sut.insert(pivot.clone(), 0).is_ok() {
                            model.insert(pivot.clone(), 0);
                        }
                    }
                }
                it.close();
            }
        }
        check_invariants(&sut, &model);
    }

    // Drain the migration; contents must be unchanged.
    while sut.rehash(1) {}
    check_invariants(&sut, &model);
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(&Value::Ptr(*v)));
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap
// with manual rehash steps, expands and safe sweeps interleaved.
// - Duplicate inserts are rejected; set overwrites.
// - Lookups agree with the model whether or not a rehash is in flight.
// - `len` equals the entries reachable through both tables' chains.
// - Table 1 is empty whenever no rehash is in flight.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(Dict::new(), pool, ops)?;
    }
}

// Collision variant: every key hashes to 0, so every entry shares one chain
// in whichever table holds it.
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
        let sut = Dict::with_type(StdHash::with_hasher(ConstBuildHasher), ());
        run_scenario(sut, pool, ops)?;
    }
}
