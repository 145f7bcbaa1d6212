//! Prime capacities for the open-addressing tables.

use crate::config::Bounds;

/// Trial division up to `n / 2`. Values below 2 are not prime.
pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    (2..=n / 2).all(|d| n % d != 0)
}

/// Smallest prime strictly greater than `n`, never below `min_prime` and
/// saturating at `max_prime`.
pub fn find_next_prime(n: usize, bounds: &Bounds) -> usize {
    let from = n.max(bounds.min_prime() - 1);
    (from.saturating_add(1)..bounds.max_prime())
        .find(|&c| is_prime(c))
        .unwrap_or(bounds.max_prime())
}

/// Capacity for a freshly constructed table given the caller's size hint.
pub fn initial_capacity(size_hint: i64, bounds: &Bounds) -> usize {
    if size_hint < bounds.min_prime() as i64 {
        bounds.min_prime()
    } else if size_hint > bounds.max_prime() as i64 {
        bounds.max_prime()
    } else if !is_prime(size_hint as usize) {
        find_next_prime(size_hint as usize, bounds)
    } else {
        size_hint as usize
    }
}

/// Capacity of the table built by a rehash holding `live` records.
pub(crate) fn rehash_capacity(live: usize, bounds: &Bounds) -> usize {
    find_next_prime(live.saturating_mul(4), bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAXPRIME, MINPRIME};

    fn small() -> Bounds {
        Bounds::new(11, 997, 1, 1000).unwrap()
    }

    #[test]
    fn primality() {
        let primes: Vec<usize> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(is_prime(MINPRIME));
        assert!(is_prime(MAXPRIME));
    }

    /// Invariant: the next prime is strictly greater than the input, even when the input is prime.
    #[test]
    fn next_prime_is_strictly_greater() {
        let b = small();
        assert_eq!(find_next_prime(24, &b), 29);
        assert_eq!(find_next_prime(23, &b), 29);
        assert_eq!(find_next_prime(11, &b), 13);
    }

    /// Invariant: results stay within [min_prime, max_prime].
    #[test]
    fn next_prime_is_clamped() {
        let b = small();
        assert_eq!(find_next_prime(0, &b), 11);
        assert_eq!(find_next_prime(3, &b), 11);
        assert_eq!(find_next_prime(996, &b), 997);
        assert_eq!(find_next_prime(5000, &b), 997);
        let d = Bounds::default();
        assert_eq!(find_next_prime(0, &d), MINPRIME);
        assert_eq!(find_next_prime(usize::MAX / 2, &d), MAXPRIME);
    }

    #[test]
    fn initial_capacity_rounds_and_clamps() {
        let b = small();
        assert_eq!(initial_capacity(-5, &b), 11);
        assert_eq!(initial_capacity(11, &b), 11);
        assert_eq!(initial_capacity(12, &b), 13);
        assert_eq!(initial_capacity(100, &b), 101);
        assert_eq!(initial_capacity(1 << 40, &b), 997);
    }

    #[test]
    fn rehash_capacity_targets_quarter_load() {
        let b = small();
        assert_eq!(rehash_capacity(6, &b), 29);
        assert_eq!(rehash_capacity(0, &b), 11);
    }
}
