#![cfg(test)]

// Property tests for RobinHoodMap kept inside the crate so they can walk the
// probe table with `check_invariants` after every operation.

use crate::error::MapError;
use crate::robin_hood_map::{Handle, RobinHoodMap};
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::HashMap;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    GetOrDefault(usize, i32),
    Remove(usize),
    Find(usize),
    At(usize),
    Mutate(usize, i32),
    Clear,
    CloneAndCompare,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::GetOrDefault(i, d)),
            4 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            1 => idx.clone().prop_map(OpI::At),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Clear),
            1 => Just(OpI::CloneAndCompare),
            2 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Model: value per key plus the insertion order of live keys.
#[derive(Default)]
struct Model {
    values: HashMap<String, i32>,
    order: Vec<String>,
}

impl Model {
    fn insert(&mut self, k: &str, v: i32) -> bool {
        if self.values.contains_key(k) {
            return false;
        }
        self.values.insert(k.to_string(), v);
        self.order.push(k.to_string());
        true
    }

    fn remove(&mut self, k: &str) -> Option<i32> {
        let v = self.values.remove(k)?;
        self.order.retain(|o| o != k);
        Some(v)
    }
}

fn run_state_machine<S>(
    mut sut: RobinHoodMap<String, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model = Model::default();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = &pool[i];
                let inserted = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, model.insert(k, v));
                if inserted {
                    let h = sut.find(k.as_str()).expect("just inserted");
                    live.insert(k.clone(), h);
                }
            }
            OpI::GetOrDefault(i, d) => {
                let k = &pool[i];
                let v = sut.get_or_default(k.clone());
                *v = v.wrapping_add(d);
                let updated = *v;
                if model.insert(k, 0) {
                    live.insert(k.clone(), sut.find(k.as_str()).expect("just inserted"));
                }
                let mv = model.values.get_mut(k.as_str()).expect("present in model");
                *mv = mv.wrapping_add(d);
                prop_assert_eq!(updated, *mv);
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove_entry(k.as_str());
                let expected = model.remove(k);
                prop_assert_eq!(removed.as_ref().map(|(_, v)| *v), expected);
                if let Some((kk, _)) = removed {
                    prop_assert_eq!(&kk, k);
                    stale.push(live.remove(k).expect("tracked live handle"));
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.find(k.as_str());
                prop_assert_eq!(found.is_some(), model.values.contains_key(k));
                if let Some(h) = found {
                    prop_assert_eq!(Some(&h), live.get(k));
                    prop_assert_eq!(h.value(&sut), model.values.get(k));
                }
            }
            OpI::At(i) => {
                let k = &pool[i];
                match model.values.get(k) {
                    Some(v) => {
                        prop_assert_eq!(sut.at(k.as_str()), Ok(v));
                    }
                    None => {
                        prop_assert_eq!(sut.at(k.as_str()), Err(MapError::KeyNotFound));
                    }
                }
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&h) = live.get(k) {
                    let vr = h.value_mut(&mut sut).expect("live handle should resolve");
                    *vr = vr.saturating_add(d);
                    let mv = model.values.get_mut(k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(sut.get_mut(k.as_str()).is_none());
                }
            }
            OpI::Clear => {
                sut.clear();
                model = Model::default();
                stale.extend(live.drain().map(|(_, h)| h));
            }
            OpI::CloneAndCompare => {
                let c = sut.clone();
                c.check_invariants();
                prop_assert!(c == sut);
                let a: Vec<_> = c.iter().collect();
                let b: Vec<_> = sut.iter().collect();
                prop_assert_eq!(a, b);
            }
            OpI::Iterate => {
                let keys: Vec<&String> = sut.keys().collect();
                let expected: Vec<&String> = model.order.iter().collect();
                prop_assert_eq!(keys, expected);
                for (k, v) in sut.iter() {
                    prop_assert_eq!(Some(v), model.values.get(k));
                }
            }
        }

        // Post-conditions after each op
        sut.check_invariants();
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.values.len());
        prop_assert_eq!(sut.is_empty(), model.values.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against a HashMap + Vec model.
// Invariants exercised across random operation sequences:
// - First insert wins; later inserts of a present key are no-ops.
// - Iteration order equals first-successful-insert order of live keys.
// - Probe chains stay contiguous with exact distances (check_invariants).
// - Removed entries' handles never resolve again, even after re-insert.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(RobinHoodMap::new(), &pool, ops)?;
    }
}

// Hash by length only: many keys share a home slot and chains interleave.
#[derive(Clone, Default)]
struct LenBuildHasher;
#[derive(Default)]
struct LenHasher(u64);
impl BuildHasher for LenBuildHasher {
    type Hasher = LenHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LenHasher::default()
    }
}
impl Hasher for LenHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0 = self.0.wrapping_add(bytes.len() as u64);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Property: Same state machine under heavy collisions, which stresses Robin
// Hood displacement, wrap-around and backward shifts across chains.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(RobinHoodMap::with_hasher(LenBuildHasher), &pool, ops)?;
    }
}

// Property: a map starting from any small table capacity keeps the load
// factor bound and finds every key after arbitrary inserts.
proptest! {
    #[test]
    fn prop_load_factor_from_any_capacity(
        cap in 0usize..8,
        keys in proptest::collection::vec(any::<u16>(), 0..200),
    ) {
        let mut m: RobinHoodMap<u16, usize> = RobinHoodMap::with_capacity(cap);
        for (i, k) in keys.iter().enumerate() {
            m.insert(*k, i);
            prop_assert!(m.len() as f64 <= m.capacity() as f64 * crate::LOAD_FACTOR + 1e-9);
        }
        m.check_invariants();
        for k in &keys {
            prop_assert!(m.contains_key(k));
        }
    }
}
