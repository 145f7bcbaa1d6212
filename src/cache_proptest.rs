#![cfg(test)]

// Property tests for Cache kept inside the crate so they can observe the
// migration state that the public surface hides.

use crate::cache::Cache;
use crate::config::{needs_rehash, Bounds};
use crate::error::CacheError;
use crate::hasher::{KeyHasher, Times33};
use crate::migration::quota;
use crate::naive_cache::NaiveCache;
use crate::probe::ProbingPolicy;
use crate::record::Record;
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize, i32),
    Update(usize, i32, i32),
    Policy(ProbingPolicy),
}

const KEYS: [&str; 8] = ["c++", "python", "java", "scheme", "prolog", "c#", "c", "js"];

fn arb_policy() -> impl Strategy<Value = ProbingPolicy> {
    prop_oneof![
        Just(ProbingPolicy::Linear),
        Just(ProbingPolicy::Quadratic),
        Just(ProbingPolicy::DoubleHash),
    ]
}

// Ids stray one past each end of [1, 40] to exercise range rejection.
fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let key = 0..KEYS.len();
    let id = 0i32..=41;
    let op = prop_oneof![
        6 => (key.clone(), id.clone()).prop_map(|(k, i)| Op::Insert(k, i)),
        3 => (key.clone(), id.clone()).prop_map(|(k, i)| Op::Remove(k, i)),
        1 => (key, id.clone(), id).prop_map(|(k, i, n)| Op::Update(k, i, n)),
        1 => arb_policy().prop_map(Op::Policy),
    ];
    proptest::collection::vec(op, 1..300)
}

// Capacity never drops below 101, so every policy reaches a free slot
// while the table stays under half full.
fn bounds() -> Bounds {
    Bounds::new(101, 997, 1, 40).unwrap()
}

/// Whether the next mutating call runs with no migration active once its
/// slice has executed.
fn stable_at_mutation<H: KeyHasher>(c: &Cache<H>) -> bool {
    match c.migration_state() {
        None => true,
        Some((cursor, cap, _, _)) => cursor + quota(cap) >= cap,
    }
}

/// Checks the trigger rule for a call that just mutated the current table
/// with no migration active.
fn check_trigger<H: KeyHasher>(c: &Cache<H>) -> Result<(), TestCaseError> {
    match c.migration_state() {
        Some((cursor, cap, size, deleted)) => {
            prop_assert_eq!(cursor, 0, "a fresh migration starts at slot 0");
            prop_assert!(needs_rehash(size, deleted, cap), "migration started below threshold");
        }
        None => {
            let (size, deleted, cap) = c.current_counters();
            prop_assert!(!needs_rehash(size, deleted, cap), "threshold crossed without migrating");
        }
    }
    Ok(())
}

// Property: state-machine equivalence against a set of live (key, id) pairs.
// - No data loss: every modelled record is retrievable after every call.
// - No duplication: live records across both tables are unique and match the model.
// - No leaks: the arena holds exactly the occupied slots of both tables.
// - Trigger: a migration starts iff a current-table mutation crosses a threshold.
// - Termination: a migration never outlives ceil(C / quota) mutating calls.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_cache_matches_model(policy in arb_policy(), ops in arb_ops()) {
        let mut sut = Cache::with_bounds(101, Times33, policy, bounds());
        let mut model: BTreeSet<(String, i32)> = BTreeSet::new();
        let mut in_flight: Option<(usize, usize)> = None;

        for op in ops {
            let stable = stable_at_mutation(&sut);
            let mut mutated_current = false;
            let mut mutating = true;

            match op {
                Op::Insert(k, id) => {
                    let key = KEYS[k].to_string();
                    let res = sut.insert(Record::new(key.clone(), id));
                    if !(1..=40).contains(&id) {
                        prop_assert!(matches!(res, Err(CacheError::InvalidId { .. })), "expected InvalidId, got {:?}", res);
                    } else if model.contains(&(key.clone(), id)) {
                        prop_assert_eq!(res, Err(CacheError::DuplicateKey));
                    } else {
                        prop_assert_eq!(res, Ok(()));
                        model.insert((key, id));
                        mutated_current = true;
                    }
                }
                Op::Remove(k, id) => {
                    let key = KEYS[k].to_string();
                    let res = sut.remove(&Record::new(key.clone(), id));
                    if model.remove(&(key, id)) {
                        prop_assert_eq!(res, Ok(()));
                        mutated_current = stable;
                    } else {
                        prop_assert_eq!(res, Err(CacheError::NotFound));
                    }
                }
                Op::Update(k, id, new_id) => {
                    mutating = false;
                    let key = KEYS[k].to_string();
                    let res = sut.update_id(&Record::new(key.clone(), id), new_id);
                    if !(1..=40).contains(&new_id) {
                        prop_assert!(matches!(res, Err(CacheError::InvalidId { .. })), "expected InvalidId, got {:?}", res);
                    } else if !model.contains(&(key.clone(), id)) {
                        prop_assert_eq!(res, Err(CacheError::NotFound));
                    } else if new_id != id && model.contains(&(key.clone(), new_id)) {
                        prop_assert_eq!(res, Err(CacheError::DuplicateKey));
                    } else {
                        prop_assert_eq!(res, Ok(()));
                        model.remove(&(key.clone(), id));
                        model.insert((key, new_id));
                    }
                }
                Op::Policy(p) => {
                    mutating = false;
                    let before = sut.probing_policy();
                    sut.change_probing_policy(p);
                    prop_assert_eq!(sut.probing_policy(), before);
                }
            }

            if mutated_current && stable {
                check_trigger(&sut)?;
            }

            // A slice always moves the cursor off 0, so cursor 0 marks a
            // migration started by this call.
            if mutating {
                match sut.migration_state() {
                    None => in_flight = None,
                    Some((0, cap, _, _)) => in_flight = Some((cap, 0)),
                    Some(_) => {
                        prop_assert!(in_flight.is_some(), "untracked migration");
                        if let Some((cap, calls)) = in_flight.as_mut() {
                            *calls += 1;
                            prop_assert!(*calls < cap.div_ceil(quota(*cap)), "migration overran");
                        }
                    }
                }
            }

            for (key, id) in &model {
                let found = sut.get(key, *id);
                prop_assert!(found.is_some(), "lost {} ({})", key, id);
            }
            let live: Vec<(String, i32)> = sut.iter().map(|r| (r.key().to_string(), r.id())).collect();
            let unique: BTreeSet<_> = live.iter().cloned().collect();
            prop_assert_eq!(live.len(), unique.len(), "record present twice");
            prop_assert_eq!(&unique, &model);
            prop_assert_eq!(sut.len(), model.len());

            let (size, _, _) = sut.current_counters();
            let old_size = sut.migration_state().map_or(0, |s| s.2);
            prop_assert_eq!(sut.arena_len(), size + old_size);
        }
    }
}

// Property: the naive baseline accepts and rejects exactly what the
// incremental cache does and ends with the same live set.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_naive_agrees_with_incremental(ops in arb_ops()) {
        let mut inc = Cache::with_bounds(101, Times33, ProbingPolicy::Linear, bounds());
        let mut naive = NaiveCache::with_bounds(101, Times33, ProbingPolicy::Linear, bounds());

        for op in ops {
            match op {
                Op::Insert(k, id) => {
                    let r = Record::new(KEYS[k], id);
                    prop_assert_eq!(inc.insert(r.clone()), naive.insert(r));
                }
                Op::Remove(k, id) => {
                    let r = Record::new(KEYS[k], id);
                    prop_assert_eq!(inc.remove(&r), naive.remove(&r));
                }
                Op::Update(k, id, new_id) => {
                    let r = Record::new(KEYS[k], id);
                    prop_assert_eq!(inc.update_id(&r, new_id), naive.update_id(&r, new_id));
                }
                Op::Policy(_) => {}
            }
            prop_assert_eq!(inc.len(), naive.len());
        }

        for r in inc.iter() {
            prop_assert_eq!(naive.get(r.key(), r.id()), Some(r));
        }
    }
}
