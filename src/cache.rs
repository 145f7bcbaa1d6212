//! Cache: open-addressing record store with incremental rehashing.

use crate::config::{self, Bounds, DEFAULT_POLICY, MINPRIME};
use crate::error::CacheError;
use crate::hasher::{KeyHasher, Times33};
use crate::migration::{Migration, Step};
use crate::prime::{initial_capacity, rehash_capacity};
use crate::probe::ProbingPolicy;
use crate::record::Record;
use crate::table::{RecordArena, RecordKey, Table};
use slotmap::SlotMap;

#[derive(Debug)]
enum Phase {
    Stable,
    Migrating(Migration),
}

/// Where a live `(key, id)` currently sits.
#[derive(Debug, Clone, Copy)]
enum Location {
    Current(usize),
    Old(usize),
}

/// Record cache that spreads each rehash over the following mutating calls.
///
/// When the current table passes the load or tombstone threshold it is
/// retired as the old table and a fresh one is allocated; every later
/// `insert`/`remove` first moves one quota of old slots across. Lookups
/// consult both tables and never advance the migration.
#[derive(Debug)]
pub struct Cache<H = Times33> {
    hasher: H,
    bounds: Bounds,
    records: RecordArena,
    current: Table,
    phase: Phase,
    // Policy for the next table a rehash builds.
    pending: ProbingPolicy,
}

impl Cache {
    /// Cache hashing keys with `Times33` under `DEFAULT_POLICY`.
    pub fn with_capacity(size_hint: i64) -> Self {
        Self::new(size_hint, Times33, DEFAULT_POLICY)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::with_capacity(MINPRIME as i64)
    }
}

/// Iterator over the live records of a [`Cache`], old table included.
pub struct Iter<'a> {
    it: slotmap::basic::Values<'a, RecordKey, Record>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Record;

    #[inline]
    fn next(&mut self) -> Option<&'a Record> {
        self.it.by_ref().find(|r| r.live)
    }
}

impl<H: KeyHasher> Cache<H> {
    pub fn new(size_hint: i64, hasher: H, policy: ProbingPolicy) -> Self {
        Self::with_bounds(size_hint, hasher, policy, Bounds::default())
    }

    pub fn with_bounds(size_hint: i64, hasher: H, policy: ProbingPolicy, bounds: Bounds) -> Self {
        let capacity = initial_capacity(size_hint, &bounds);
        Self {
            hasher,
            bounds,
            records: SlotMap::with_key(),
            current: Table::new(capacity, policy),
            phase: Phase::Stable,
            pending: policy,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Capacity of the current table.
    pub fn capacity(&self) -> usize {
        self.current.capacity()
    }

    /// Capacity of the table being drained, if a migration is active.
    pub fn old_capacity(&self) -> Option<usize> {
        match &self.phase {
            Phase::Stable => None,
            Phase::Migrating(m) => Some(m.old().capacity()),
        }
    }

    pub fn is_migrating(&self) -> bool {
        matches!(self.phase, Phase::Migrating(_))
    }

    /// Live records across both tables.
    pub fn len(&self) -> usize {
        let old = match &self.phase {
            Phase::Stable => 0,
            Phase::Migrating(m) => m.old().live(),
        };
        self.current.live() + old
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots (live and tombstone) over capacity, current table only.
    pub fn load_factor(&self) -> f32 {
        config::load_factor(self.current.size(), self.current.capacity())
    }

    /// Tombstones over occupied slots, current table only; 0 when empty.
    pub fn deleted_ratio(&self) -> f32 {
        config::deleted_ratio(self.current.size(), self.current.deleted())
    }

    /// Policy of the current table.
    pub fn probing_policy(&self) -> ProbingPolicy {
        self.current.policy()
    }

    /// Policy the next rehash will build its table with.
    pub fn pending_policy(&self) -> ProbingPolicy {
        self.pending
    }

    /// Takes effect when the next rehash allocates a table.
    pub fn change_probing_policy(&mut self, policy: ProbingPolicy) {
        self.pending = policy;
    }

    fn locate(&self, hashed: u32, key: &str, id: i32) -> Option<Location> {
        if let Some(idx) = self.current.find_index(&self.records, hashed, key, id) {
            return Some(Location::Current(idx));
        }
        match &self.phase {
            Phase::Migrating(m) => m
                .old()
                .find_index(&self.records, hashed, key, id)
                .map(Location::Old),
            Phase::Stable => None,
        }
    }

    pub fn contains(&self, key: &str, id: i32) -> bool {
        self.get(key, id).is_some()
    }

    pub fn get(&self, key: &str, id: i32) -> Option<&Record> {
        let hashed = self.hasher.hash_key(key);
        match self.locate(hashed, key, id)? {
            Location::Current(idx) => self.current.record(&self.records, idx),
            Location::Old(idx) => match &self.phase {
                Phase::Migrating(m) => m.old().record(&self.records, idx),
                Phase::Stable => None,
            },
        }
    }

    /// Owned copy of the record, or `Record::empty()` on a miss.
    pub fn get_record(&self, key: &str, id: i32) -> Record {
        self.get(key, id).cloned().unwrap_or_else(Record::empty)
    }

    pub fn insert(&mut self, record: Record) -> Result<(), CacheError> {
        self.advance_migration();
        self.bounds.check_id(record.id())?;

        let hashed = self.hasher.hash_key(record.key());
        if self.locate(hashed, record.key(), record.id()).is_some() {
            return Err(CacheError::DuplicateKey);
        }
        // While migrating, every record still in the old table needs a
        // reachable slot in the current one.
        if self.is_migrating()
            && self.len() >= self.current.policy().reach(self.current.capacity())
        {
            tracing::trace!(%record, pending = self.len(), "no room reserved for insert");
            return Err(CacheError::TableFull);
        }
        if let Err(record) = self.current.insert(&mut self.records, hashed, record) {
            tracing::trace!(%record, capacity = self.current.capacity(), "probe sequence exhausted");
            return Err(CacheError::TableFull);
        }

        if !self.is_migrating() {
            self.maybe_start_rehash();
        }
        Ok(())
    }

    pub fn remove(&mut self, record: &Record) -> Result<(), CacheError> {
        self.advance_migration();

        let hashed = self.hasher.hash_key(record.key());
        match self.locate(hashed, record.key(), record.id()) {
            Some(Location::Current(idx)) => {
                self.current.tombstone(&mut self.records, idx);
                if !self.is_migrating() {
                    self.maybe_start_rehash();
                }
                Ok(())
            }
            Some(Location::Old(idx)) => {
                if let Phase::Migrating(m) = &mut self.phase {
                    m.old_mut().tombstone(&mut self.records, idx);
                }
                Ok(())
            }
            None => Err(CacheError::NotFound),
        }
    }

    /// Change the id of a stored record in place. The slot does not move:
    /// placement depends only on the key.
    pub fn update_id(&mut self, record: &Record, new_id: i32) -> Result<(), CacheError> {
        self.bounds.check_id(new_id)?;

        let hashed = self.hasher.hash_key(record.key());
        let loc = self
            .locate(hashed, record.key(), record.id())
            .ok_or(CacheError::NotFound)?;
        if new_id != record.id() && self.locate(hashed, record.key(), new_id).is_some() {
            return Err(CacheError::DuplicateKey);
        }

        let stored = match (loc, &self.phase) {
            (Location::Current(idx), _) => self.current.record_mut(&mut self.records, idx),
            (Location::Old(idx), Phase::Migrating(m)) => m.old().record_mut(&mut self.records, idx),
            (Location::Old(_), Phase::Stable) => None,
        };
        let stored = stored.ok_or(CacheError::NotFound)?;
        stored.set_id(new_id);
        Ok(())
    }

    /// Live records in both tables, in arena order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            it: self.records.values(),
        }
    }

    /// Occupied slots of both tables, one per line.
    pub fn dump(&self) -> String {
        let mut out = String::from("Dump for the current table:\n");
        self.current.dump_into(&mut out, &self.records);
        out.push_str("Dump for the old table:\n");
        if let Phase::Migrating(m) = &self.phase {
            m.old().dump_into(&mut out, &self.records);
        }
        out
    }

    fn advance_migration(&mut self) {
        let Phase::Migrating(m) = &mut self.phase else {
            return;
        };
        if m.step(&mut self.current, &mut self.records, &self.hasher) == Step::InProgress {
            return;
        }
        if let Phase::Migrating(m) = core::mem::replace(&mut self.phase, Phase::Stable) {
            let old_capacity = m.old().capacity();
            m.finish(&mut self.records);
            tracing::debug!(old_capacity, capacity = self.current.capacity(), "migration complete");
        }
    }

    fn maybe_start_rehash(&mut self) {
        if !config::needs_rehash(self.current.size(), self.current.deleted(), self.current.capacity()) {
            return;
        }
        let live = self.current.live();
        let capacity = rehash_capacity(live, &self.bounds);
        if live > self.pending.reach(capacity) {
            tracing::debug!(capacity, live, policy = %self.pending, "rehash deferred: new table too small");
            return;
        }
        self.start_rehash(live, capacity);
    }

    fn start_rehash(&mut self, live: usize, capacity: usize) {
        let old = core::mem::replace(&mut self.current, Table::new(capacity, self.pending));
        tracing::debug!(
            old_capacity = old.capacity(),
            capacity,
            live,
            policy = %self.pending,
            "migration started"
        );
        self.phase = Phase::Migrating(Migration::new(old));
    }
}

#[cfg(test)]
impl<H: KeyHasher> Cache<H> {
    /// `(cursor, capacity, size, deleted)` of the old table.
    pub(crate) fn migration_state(&self) -> Option<(usize, usize, usize, usize)> {
        match &self.phase {
            Phase::Stable => None,
            Phase::Migrating(m) => {
                let old = m.old();
                Some((m.cursor(), old.capacity(), old.size(), old.deleted()))
            }
        }
    }

    /// `(size, deleted, capacity)` of the current table.
    pub(crate) fn current_counters(&self) -> (usize, usize, usize) {
        (self.current.size(), self.current.deleted(), self.current.capacity())
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn in_old_table(&self, key: &str, id: i32) -> bool {
        let hashed = self.hasher.hash_key(key);
        matches!(self.locate(hashed, key, id), Some(Location::Old(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAXID, MINID};

    fn small_bounds() -> Bounds {
        Bounds::new(11, 997, 1, 1000).unwrap()
    }

    fn small_linear() -> Cache {
        Cache::with_bounds(11, Times33, ProbingPolicy::Linear, small_bounds())
    }

    /// Invariant: the sixth insert into capacity 11 starts a migration to capacity 29;
    /// six further mutating calls finish it; nothing is lost on the way.
    #[test]
    fn migration_scenario_capacity_11() {
        let mut c = small_linear();
        let originals: Vec<Record> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|k| Record::new(*k, 7))
            .collect();
        for (i, r) in originals.iter().enumerate() {
            c.insert(r.clone()).unwrap();
            assert_eq!(c.is_migrating(), i == 5);
        }
        assert_eq!(c.old_capacity(), Some(11));
        assert_eq!(c.capacity(), 29);

        for (n, k) in ["g", "h", "i", "j", "k", "l"].iter().enumerate() {
            assert!(c.is_migrating());
            c.insert(Record::new(*k, 7)).unwrap();
            for r in &originals {
                assert_eq!(c.get(r.key(), r.id()), Some(r));
            }
            assert_eq!(c.is_migrating(), n < 5);
        }
        assert_eq!(c.len(), 12);
        assert_eq!(c.arena_len(), 12);
    }

    /// Invariant: the deleted-ratio trigger is strict; 4/5 does not start a migration, 5/5 does.
    #[test]
    fn deleted_ratio_boundary_is_strict() {
        let mut c = Cache::new(MINPRIME as i64, Times33, ProbingPolicy::Linear);
        let rs: Vec<Record> = (0..5).map(|i| Record::new(format!("key{i}"), MINID + i)).collect();
        for r in &rs {
            c.insert(r.clone()).unwrap();
        }
        for r in &rs[..4] {
            c.remove(r).unwrap();
        }
        assert_eq!(c.deleted_ratio(), 0.8);
        assert!(!c.is_migrating());

        c.remove(&rs[4]).unwrap();
        assert!(c.is_migrating());
        assert_eq!(c.capacity(), MINPRIME);
        assert_eq!(c.deleted_ratio(), 0.0);
    }

    #[test]
    fn duplicate_rejected_across_tables() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e", "f"] {
            c.insert(Record::new(k, 3)).unwrap();
        }
        assert!(c.in_old_table("a", 3));
        let before = c.len();
        assert_eq!(c.insert(Record::new("a", 3)), Err(CacheError::DuplicateKey));
        assert_eq!(c.len(), before);
        // Same key with another id is a different record.
        assert!(c.insert(Record::new("a", 4)).is_ok());
    }

    #[test]
    fn invalid_ids_rejected() {
        let mut c = Cache::with_capacity(0);
        let r = Record::new("java", MINID);
        assert!(matches!(
            c.insert(Record::new("java", MINID - 1)),
            Err(CacheError::InvalidId { .. })
        ));
        assert!(matches!(
            c.insert(Record::new("java", MAXID + 1)),
            Err(CacheError::InvalidId { .. })
        ));
        assert!(c.is_empty());
        c.insert(r.clone()).unwrap();
        assert!(matches!(c.update_id(&r, MAXID + 1), Err(CacheError::InvalidId { .. })));
        assert_eq!(c.get("java", MINID), Some(&r));
    }

    /// Invariant: a double-hash step equal to the capacity pins every attempt to one slot,
    /// so the second colliding insert fails cleanly instead of looping.
    #[test]
    fn exhausted_probe_reports_table_full() {
        let mut c = Cache::with_bounds(11, |_: &str| 0u32, ProbingPolicy::DoubleHash, small_bounds());
        c.insert(Record::new("x", 1)).unwrap();
        assert_eq!(c.insert(Record::new("y", 1)), Err(CacheError::TableFull));
        assert_eq!(c.len(), 1);
        assert!(c.get("y", 1).is_none());
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut c = small_linear();
        assert_eq!(c.remove(&Record::new("a", 1)), Err(CacheError::NotFound));
        c.insert(Record::new("a", 1)).unwrap();
        c.remove(&Record::new("a", 1)).unwrap();
        assert_eq!(c.remove(&Record::new("a", 1)), Err(CacheError::NotFound));
    }

    /// Invariant: removing from the old table tombstones it there and does not start
    /// a second migration.
    #[test]
    fn remove_from_old_table() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e", "f"] {
            c.insert(Record::new(k, 1)).unwrap();
        }
        // "f" sits in slot 3, beyond the first slice (slots 0 and 1).
        assert!(c.in_old_table("f", 1));
        c.remove(&Record::new("f", 1)).unwrap();
        let (cursor, cap, _size, deleted) = c.migration_state().unwrap();
        assert_eq!((cursor, cap, deleted), (2, 11, 1));
        assert!(!c.contains("f", 1));
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn get_record_returns_sentinel_on_miss() {
        let mut c = small_linear();
        c.insert(Record::new("scheme", 42)).unwrap();
        assert_eq!(c.get_record("scheme", 42), Record::new("scheme", 42));
        assert!(c.get_record("scheme", 43).is_empty());
        assert!(c.get_record("prolog", 42).is_empty());
    }

    /// Invariant: update_id mutates in place in whichever table holds the record and
    /// does not advance the migration.
    #[test]
    fn update_id_in_both_tables() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e", "f"] {
            c.insert(Record::new(k, 1)).unwrap();
        }
        let cursor = c.migration_state().unwrap().0;
        c.update_id(&Record::new("f", 1), 9).unwrap();
        assert_eq!(c.migration_state().unwrap().0, cursor);
        assert!(c.in_old_table("f", 9));
        assert!(!c.contains("f", 1));

        c.insert(Record::new("z", 1)).unwrap();
        c.update_id(&Record::new("z", 1), 2).unwrap();
        assert_eq!(c.get("z", 2).map(Record::id), Some(2));
        assert_eq!(c.update_id(&Record::new("nope", 1), 2), Err(CacheError::NotFound));

        while c.is_migrating() {
            c.remove(&Record::new("absent", 1)).unwrap_err();
        }
        assert!(c.contains("f", 9));
    }

    #[test]
    fn update_id_rejects_collision() {
        let mut c = small_linear();
        c.insert(Record::new("a", 1)).unwrap();
        c.insert(Record::new("a", 2)).unwrap();
        assert_eq!(c.update_id(&Record::new("a", 1), 2), Err(CacheError::DuplicateKey));
        assert!(c.update_id(&Record::new("a", 1), 1).is_ok());
        assert_eq!(c.len(), 2);
    }

    /// Invariant: a policy change waits for the next rehash; the old table keeps its policy.
    #[test]
    fn policy_change_is_deferred() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e"] {
            c.insert(Record::new(k, 1)).unwrap();
        }
        c.change_probing_policy(ProbingPolicy::Quadratic);
        assert_eq!(c.probing_policy(), ProbingPolicy::Linear);
        assert_eq!(c.pending_policy(), ProbingPolicy::Quadratic);
        for k in ["a", "b", "c", "d", "e"] {
            assert!(c.contains(k, 1));
        }

        c.insert(Record::new("f", 1)).unwrap();
        assert!(c.is_migrating());
        assert_eq!(c.probing_policy(), ProbingPolicy::Quadratic);
        while c.is_migrating() {
            let _ = c.remove(&Record::new("absent", 1));
        }
        for k in ["a", "b", "c", "d", "e", "f"] {
            assert!(c.contains(k, 1));
        }
    }

    #[test]
    fn iter_yields_live_records_of_both_tables() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e", "f"] {
            c.insert(Record::new(k, 1)).unwrap();
        }
        c.remove(&Record::new("b", 1)).unwrap();
        let mut keys: Vec<&str> = c.iter().map(Record::key).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "c", "d", "e", "f"]);
    }

    #[test]
    fn dump_lists_both_tables() {
        let mut c = small_linear();
        for k in ["a", "b", "c", "d", "e", "f"] {
            c.insert(Record::new(k, 1)).unwrap();
        }
        c.insert(Record::new("g", 1)).unwrap();
        let d = c.dump();
        let (cur, old) = d.split_once("Dump for the old table:\n").unwrap();
        assert!(cur.starts_with("Dump for the current table:\n"));
        assert!(cur.contains("g (1)"));
        assert!(old.contains("[0] : drained"));
        assert!(old.contains("[9] : a (1)"));
    }

    /// Invariant: at the capacity ceiling an insert that cannot be guaranteed a slot is
    /// rejected with `TableFull`; every accepted record stays retrievable.
    #[test]
    fn capacity_ceiling_rejects_instead_of_dropping() {
        for policy in [ProbingPolicy::Linear, ProbingPolicy::Quadratic, ProbingPolicy::DoubleHash] {
            let bounds = Bounds::new(11, 13, 1, 1000).unwrap();
            let mut c = Cache::with_bounds(11, Times33, policy, bounds);
            let mut accepted = Vec::new();
            let mut full = 0;
            for i in 0..40 {
                let r = Record::new(format!("k{i}"), 1);
                match c.insert(r.clone()) {
                    Ok(()) => accepted.push(r),
                    Err(e) => {
                        assert_eq!(e, CacheError::TableFull, "{policy}");
                        full += 1;
                    }
                }
                assert!(c.capacity() <= 13);
                assert_eq!(c.len(), accepted.len(), "{policy} after call {i}");
                for r in &accepted {
                    assert_eq!(c.get(r.key(), r.id()), Some(r), "{policy} lost {r}");
                }
            }
            assert!(full > 0, "{policy} never filled up");
            assert_eq!(c.arena_len(), accepted.len());
        }
    }

    /// Invariant: a rehash whose table could not take every live record is not started.
    #[test]
    fn rehash_deferred_when_new_table_too_small() {
        let bounds = Bounds::new(11, 13, 1, 1000).unwrap();
        let mut c = Cache::with_bounds(13, Times33, ProbingPolicy::Linear, bounds);
        for i in 0..7 {
            c.insert(Record::new(format!("k{i}"), 1)).unwrap();
        }
        assert_eq!(c.old_capacity(), Some(13));
        while c.is_migrating() {
            c.remove(&Record::new("absent", 1)).unwrap_err();
        }
        // Quadratic probing over 13 slots only guarantees 7.
        c.change_probing_policy(ProbingPolicy::Quadratic);
        c.insert(Record::new("k7", 1)).unwrap();
        assert!(!c.is_migrating());
        assert_eq!(c.probing_policy(), ProbingPolicy::Linear);
        assert_eq!(c.len(), 8);
    }
}
