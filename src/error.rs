//! Failure reasons reported by the cache engines.

use thiserror::Error;

/// Why a mutating call was rejected. Every variant leaves the cache
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("id {id} outside the valid range [{min}, {max}]")]
    InvalidId { id: i32, min: i32, max: i32 },
    #[error("record with the same key and id already present")]
    DuplicateKey,
    #[error("probe sequence exhausted without a free slot")]
    TableFull,
    #[error("record not present")]
    NotFound,
}

/// Rejected `Bounds` configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("capacity bound {0} is not prime")]
    NotPrime(usize),
    #[error("min_prime {min} exceeds max_prime {max}")]
    CapacityRange { min: usize, max: usize },
    #[error("min_id {min} exceeds max_id {max}")]
    IdRange { min: i32, max: i32 },
}
