//! Injected key hashing.
//!
//! A cache hashes only the record key, never the id, so a record's probe
//! chain is fixed for its whole stay in a table. The hasher must be pure:
//! the same key always hashes to the same value for one cache instance.

use core::hash::BuildHasher;
use hashbrown::hash_map::DefaultHashBuilder;

pub trait KeyHasher {
    fn hash_key(&self, key: &str) -> u32;
}

impl<F> KeyHasher for F
where
    F: Fn(&str) -> u32,
{
    #[inline]
    fn hash_key(&self, key: &str) -> u32 {
        self(key)
    }
}

/// `val = val * 33 + byte`, wrapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Times33;

impl KeyHasher for Times33 {
    #[inline]
    fn hash_key(&self, key: &str) -> u32 {
        key.bytes()
            .fold(0u32, |val, b| val.wrapping_mul(33).wrapping_add(b as u32))
    }
}

/// Adapts any `BuildHasher` by truncating its 64-bit output.
#[derive(Debug, Clone)]
pub struct BuildKeyHasher<S = DefaultHashBuilder>(pub S);

impl BuildKeyHasher {
    pub fn new() -> Self {
        BuildKeyHasher(DefaultHashBuilder::default())
    }
}

impl Default for BuildKeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> KeyHasher for BuildKeyHasher<S> {
    #[inline]
    fn hash_key(&self, key: &str) -> u32 {
        self.0.hash_one(key) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times33_known_values() {
        assert_eq!(Times33.hash_key(""), 0);
        assert_eq!(Times33.hash_key("a"), 97);
        assert_eq!(Times33.hash_key("ab"), 97 * 33 + 98);
        assert_eq!(Times33.hash_key("key0"), 3_959_289);
    }

    /// Invariant: one hasher instance is deterministic per key.
    #[test]
    fn build_key_hasher_is_pure() {
        let h = BuildKeyHasher::new();
        for k in ["c++", "python", "java", "scheme"] {
            assert_eq!(h.hash_key(k), h.hash_key(k));
        }
    }

    #[test]
    fn closures_are_hashers() {
        let constant = |_: &str| 7u32;
        assert_eq!(constant.hash_key("anything"), 7);
    }
}
