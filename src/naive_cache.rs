//! NaiveCache: the same record store with stop-the-world rehashing.
//!
//! Kept as the measurement baseline for [`Cache`](crate::Cache): when the
//! table crosses a threshold every live record is moved to a new table in
//! one pass before the triggering call returns.

use crate::config::{self, Bounds, DEFAULT_POLICY};
use crate::error::CacheError;
use crate::hasher::{KeyHasher, Times33};
use crate::prime::{initial_capacity, rehash_capacity};
use crate::probe::ProbingPolicy;
use crate::record::Record;
use crate::table::{RecordArena, Table};
use slotmap::SlotMap;

#[derive(Debug)]
pub struct NaiveCache<H = Times33> {
    hasher: H,
    bounds: Bounds,
    records: RecordArena,
    table: Table,
}

impl NaiveCache {
    pub fn with_capacity(size_hint: i64) -> Self {
        Self::new(size_hint, Times33, DEFAULT_POLICY)
    }
}

impl<H: KeyHasher> NaiveCache<H> {
    pub fn new(size_hint: i64, hasher: H, policy: ProbingPolicy) -> Self {
        Self::with_bounds(size_hint, hasher, policy, Bounds::default())
    }

    pub fn with_bounds(size_hint: i64, hasher: H, policy: ProbingPolicy, bounds: Bounds) -> Self {
        Self {
            table: Table::new(initial_capacity(size_hint, &bounds), policy),
            hasher,
            bounds,
            records: SlotMap::with_key(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Occupied slots, tombstones included.
    pub fn size(&self) -> usize {
        self.table.size()
    }

    pub fn len(&self) -> usize {
        self.table.live()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_factor(&self) -> f32 {
        config::load_factor(self.table.size(), self.table.capacity())
    }

    pub fn deleted_ratio(&self) -> f32 {
        config::deleted_ratio(self.table.size(), self.table.deleted())
    }

    pub fn get(&self, key: &str, id: i32) -> Option<&Record> {
        let hashed = self.hasher.hash_key(key);
        let idx = self.table.find_index(&self.records, hashed, key, id)?;
        self.table.record(&self.records, idx)
    }

    pub fn get_record(&self, key: &str, id: i32) -> Record {
        self.get(key, id).cloned().unwrap_or_else(Record::empty)
    }

    pub fn contains(&self, key: &str, id: i32) -> bool {
        self.get(key, id).is_some()
    }

    pub fn insert(&mut self, record: Record) -> Result<(), CacheError> {
        self.bounds.check_id(record.id())?;
        let hashed = self.hasher.hash_key(record.key());
        if self
            .table
            .find_index(&self.records, hashed, record.key(), record.id())
            .is_some()
        {
            return Err(CacheError::DuplicateKey);
        }
        self.table
            .insert(&mut self.records, hashed, record)
            .map_err(|_| CacheError::TableFull)?;
        self.maybe_rehash();
        Ok(())
    }

    pub fn remove(&mut self, record: &Record) -> Result<(), CacheError> {
        let hashed = self.hasher.hash_key(record.key());
        let idx = self
            .table
            .find_index(&self.records, hashed, record.key(), record.id())
            .ok_or(CacheError::NotFound)?;
        self.table.tombstone(&mut self.records, idx);
        self.maybe_rehash();
        Ok(())
    }

    pub fn update_id(&mut self, record: &Record, new_id: i32) -> Result<(), CacheError> {
        self.bounds.check_id(new_id)?;
        let hashed = self.hasher.hash_key(record.key());
        let idx = self
            .table
            .find_index(&self.records, hashed, record.key(), record.id())
            .ok_or(CacheError::NotFound)?;
        if new_id != record.id() && self.contains(record.key(), new_id) {
            return Err(CacheError::DuplicateKey);
        }
        let stored = self
            .table
            .record_mut(&mut self.records, idx)
            .ok_or(CacheError::NotFound)?;
        stored.set_id(new_id);
        Ok(())
    }

    pub fn dump(&self) -> String {
        let mut out = String::from("Dump for the table:\n");
        self.table.dump_into(&mut out, &self.records);
        out
    }

    fn maybe_rehash(&mut self) {
        if config::needs_rehash(self.table.size(), self.table.deleted(), self.table.capacity()) {
            self.full_rehash();
        }
    }

    /// Move every live record into a fresh table and drop the tombstones.
    /// If the fresh table cannot take every record the current one is kept.
    fn full_rehash(&mut self) {
        let live = self.table.live();
        let capacity = rehash_capacity(live, &self.bounds);
        let mut fresh = Table::new(capacity, self.table.policy());
        for rk in self.table.live_keys(&self.records) {
            let hashed = self.hasher.hash_key(self.records[rk].key());
            if fresh.link(hashed, rk).is_err() {
                tracing::debug!(capacity, live, "rehash abandoned: new table too small");
                return;
            }
        }
        tracing::debug!(old_capacity = self.table.capacity(), capacity, live, "full rehash");
        let old = core::mem::replace(&mut self.table, fresh);
        old.discard_tombstones(&mut self.records);
    }
}
