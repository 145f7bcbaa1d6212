//! Collision policies and the probe sequence they generate.

/// Open-addressing collision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbingPolicy {
    /// `(h + i) mod capacity`
    Linear,
    /// `(h + i²) mod capacity`
    Quadratic,
    /// `(h + i·d) mod capacity` with `d = 11 - (h mod 11)`
    DoubleHash,
}

impl core::fmt::Display for ProbingPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ProbingPolicy::Linear => "linear",
            ProbingPolicy::Quadratic => "quadratic",
            ProbingPolicy::DoubleHash => "double-hash",
        })
    }
}

impl ProbingPolicy {
    /// Fewest distinct slots any key's probe sequence visits in a table of
    /// prime `capacity`. A key always finds a free slot while fewer than this
    /// many slots hold live records.
    pub fn reach(self, capacity: usize) -> usize {
        match self {
            ProbingPolicy::Linear => capacity,
            // i² takes (p + 1) / 2 distinct values mod an odd prime p.
            ProbingPolicy::Quadratic => (capacity + 1) / 2,
            ProbingPolicy::DoubleHash => (1..=11)
                .map(|step| capacity / gcd(step, capacity))
                .min()
                .unwrap_or(capacity),
        }
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Slot index for attempt `i` (0-based) of `hashed` in a table of `capacity`.
#[inline]
pub fn probe_index(hashed: u32, i: usize, capacity: usize, policy: ProbingPolicy) -> usize {
    let h = hashed as u64;
    let i = i as u64;
    let cap = capacity as u64;
    let idx = match policy {
        ProbingPolicy::Linear => (h + i) % cap,
        ProbingPolicy::Quadratic => (h + (i * i) % cap) % cap,
        ProbingPolicy::DoubleHash => {
            let mut step = 11 - (h % 11);
            if step == 0 {
                step = 1;
            }
            (h + (i * step) % cap) % cap
        }
    };
    idx as usize
}

/// The first `capacity` slot indices tried for one key.
#[derive(Debug, Clone)]
pub struct ProbeSeq {
    hashed: u32,
    capacity: usize,
    policy: ProbingPolicy,
    attempt: usize,
}

impl ProbeSeq {
    pub fn new(hashed: u32, capacity: usize, policy: ProbingPolicy) -> Self {
        Self {
            hashed,
            capacity,
            policy,
            attempt: 0,
        }
    }
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.attempt >= self.capacity {
            return None;
        }
        let idx = probe_index(self.hashed, self.attempt, self.capacity, self.policy);
        self.attempt += 1;
        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.capacity - self.attempt;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for ProbeSeq {}
