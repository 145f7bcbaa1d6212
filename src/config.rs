//! Contract constants and the configurable capacity/id bounds.

use crate::error::{BoundsError, CacheError};
use crate::prime::is_prime;
use crate::probe::ProbingPolicy;

/// Smallest table capacity.
pub const MINPRIME: usize = 101;
/// Largest table capacity; capacity never grows past it.
pub const MAXPRIME: usize = 99991;
/// Smallest admissible record id.
pub const MINID: i32 = 1000;
/// Largest admissible record id.
pub const MAXID: i32 = 9999;
pub const DEFAULT_POLICY: ProbingPolicy = ProbingPolicy::DoubleHash;

/// A rehash starts once `size / capacity` exceeds this.
pub const MAX_LOAD_FACTOR: f32 = 0.5;
/// A rehash starts once `deleted / size` exceeds this.
pub const MAX_DELETED_RATIO: f32 = 0.8;
/// Fraction of the old table's capacity drained per mutating call.
pub const TRANSFER_FRACTION: f64 = 0.25;

/// Capacity and id bounds shared by a cache and every table it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    min_prime: usize,
    max_prime: usize,
    min_id: i32,
    max_id: i32,
}

impl Bounds {
    pub fn new(
        min_prime: usize,
        max_prime: usize,
        min_id: i32,
        max_id: i32,
    ) -> Result<Self, BoundsError> {
        for p in [min_prime, max_prime] {
            if !is_prime(p) {
                return Err(BoundsError::NotPrime(p));
            }
        }
        if min_prime > max_prime {
            return Err(BoundsError::CapacityRange {
                min: min_prime,
                max: max_prime,
            });
        }
        if min_id > max_id {
            return Err(BoundsError::IdRange {
                min: min_id,
                max: max_id,
            });
        }
        Ok(Self {
            min_prime,
            max_prime,
            min_id,
            max_id,
        })
    }

    pub fn min_prime(&self) -> usize {
        self.min_prime
    }
    pub fn max_prime(&self) -> usize {
        self.max_prime
    }
    pub fn min_id(&self) -> i32 {
        self.min_id
    }
    pub fn max_id(&self) -> i32 {
        self.max_id
    }

    pub(crate) fn check_id(&self, id: i32) -> Result<(), CacheError> {
        if id < self.min_id || id > self.max_id {
            return Err(CacheError::InvalidId {
                id,
                min: self.min_id,
                max: self.max_id,
            });
        }
        Ok(())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_prime: MINPRIME,
            max_prime: MAXPRIME,
            min_id: MINID,
            max_id: MAXID,
        }
    }
}

/// True when a table with these counters should be rebuilt.
pub(crate) fn needs_rehash(size: usize, deleted: usize, capacity: usize) -> bool {
    load_factor(size, capacity) > MAX_LOAD_FACTOR || deleted_ratio(size, deleted) > MAX_DELETED_RATIO
}

pub(crate) fn load_factor(size: usize, capacity: usize) -> f32 {
    size as f32 / capacity as f32
}

pub(crate) fn deleted_ratio(size: usize, deleted: usize) -> f32 {
    if size == 0 {
        return 0.0;
    }
    deleted as f32 / size as f32
}
