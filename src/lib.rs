//! rehash-cache: an open-addressing record cache whose rehashes are
//! spread across the calls that follow them.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bound the work any single mutating call does. A growing table
//!   is not copied in one pass; the retired table stays alive next to the
//!   new one and a fixed quota of its slots is moved on every subsequent
//!   `insert`/`remove` until it is empty.
//! - Layers:
//!   - `prime` / `probe`: capacity sizing and the probe sequence, shared
//!     by both engines.
//!   - `table::Table`: one prime-capacity slot array holding keys into a
//!     record arena, with size/tombstone accounting.
//!   - `migration::Migration`: the old table plus its transfer cursor.
//!   - `Cache`: the public engine, `Stable` or `Migrating`.
//!   - `NaiveCache`: same contract with a one-shot full rehash; the
//!     measurement baseline.
//!
//! Constraints
//! - Single-threaded; every call runs to completion on the caller's thread.
//! - Identity is `(key, id)`; ids outside the configured range are refused.
//! - At most one old table exists; a migration never starts while one is
//!   in flight.
//! - A `(key, id)` lives in at most one of {current, old}: migration moves
//!   arena keys, it never copies records.
//!
//! Tombstones and early exit
//! - Lookups stop at the first never-written slot. Removal only clears a
//!   record's `live` flag, and migration leaves a drained marker behind
//!   instead of emptying a slot, so no probe chain is ever cut short.
//!
//! Rehash trigger
//! - After a successful current-table mutation with no migration active:
//!   `size / capacity > 0.5` or `deleted / size > 0.8`. The new table is
//!   sized `next_prime(4 × live)`, a load of about one quarter.
//! - The per-call quota is a quarter of the old capacity, never less than
//!   one slot, so a migration of capacity `C` ends after
//!   `ceil(C / quota)` mutating calls.
//!
//! Capacity ceiling
//! - Once `next_prime(4 × live)` saturates at `max_prime` the new table
//!   may be no larger than the old one. A rehash then starts only if every
//!   live record fits within `ProbingPolicy::reach` of the new table, and
//!   while migrating an insert is refused with `TableFull` unless a slot
//!   stays reserved for every record still in the old table. A migrated
//!   record that finds no slot is left in the old table for another sweep.
//!
//! Notes and non-goals
//! - Probing policy changes apply to the next table a rehash builds.
//! - Lookups (`get`, `get_record`, `contains`) never advance a migration.
//! - No eviction, persistence, or concurrent access.

mod cache;
mod cache_proptest;
pub mod config;
mod error;
pub mod hasher;
mod migration;
mod naive_cache;
pub mod prime;
pub mod probe;
mod record;
mod table;

// Public surface
pub use cache::{Cache, Iter};
pub use config::{Bounds, DEFAULT_POLICY, MAXID, MAXPRIME, MINID, MINPRIME};
pub use error::{BoundsError, CacheError};
pub use hasher::{BuildKeyHasher, KeyHasher, Times33};
pub use naive_cache::NaiveCache;
pub use probe::ProbingPolicy;
pub use record::Record;

/// Operations shared by [`Cache`] and [`NaiveCache`], so a harness can time
/// either engine through one interface.
pub trait RecordCache {
    fn insert(&mut self, record: Record) -> Result<(), CacheError>;
    fn remove(&mut self, record: &Record) -> Result<(), CacheError>;
    fn get(&self, key: &str, id: i32) -> Option<&Record>;
    fn load_factor(&self) -> f32;
    fn deleted_ratio(&self) -> f32;
    fn capacity(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: KeyHasher> RecordCache for Cache<H> {
    fn insert(&mut self, record: Record) -> Result<(), CacheError> {
        Cache::insert(self, record)
    }
    fn remove(&mut self, record: &Record) -> Result<(), CacheError> {
        Cache::remove(self, record)
    }
    fn get(&self, key: &str, id: i32) -> Option<&Record> {
        Cache::get(self, key, id)
    }
    fn load_factor(&self) -> f32 {
        Cache::load_factor(self)
    }
    fn deleted_ratio(&self) -> f32 {
        Cache::deleted_ratio(self)
    }
    fn capacity(&self) -> usize {
        Cache::capacity(self)
    }
    fn len(&self) -> usize {
        Cache::len(self)
    }
}

impl<H: KeyHasher> RecordCache for NaiveCache<H> {
    fn insert(&mut self, record: Record) -> Result<(), CacheError> {
        NaiveCache::insert(self, record)
    }
    fn remove(&mut self, record: &Record) -> Result<(), CacheError> {
        NaiveCache::remove(self, record)
    }
    fn get(&self, key: &str, id: i32) -> Option<&Record> {
        NaiveCache::get(self, key, id)
    }
    fn load_factor(&self) -> f32 {
        NaiveCache::load_factor(self)
    }
    fn deleted_ratio(&self) -> f32 {
        NaiveCache::deleted_ratio(self)
    }
    fn capacity(&self) -> usize {
        NaiveCache::capacity(self)
    }
    fn len(&self) -> usize {
        NaiveCache::len(self)
    }
}
