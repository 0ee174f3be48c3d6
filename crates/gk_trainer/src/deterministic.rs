//! Deterministic utilities for reproducible training
//!
//! LCG-based RNG, seed derivation and split tie-breaking, so the same seed
//! yields the same split, the same bootstrap samples and the same trees on
//! every platform.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    // LCG constants (compatible with glibc)
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.rem_euclid(Self::MODULUS)),
        }
    }

    /// Generate next random i64 in range [0, MODULUS)
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Generate random value in range [0, max)
    ///
    /// Scales by the high bits; the low bits of a power-of-two LCG cycle
    /// with short periods.
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        ((self.next_i64() as u128 * max as u128) >> 31) as usize
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }

    /// `n` indices drawn uniformly from `0..n` with replacement
    pub fn bootstrap(&mut self, n: usize) -> Vec<usize> {
        (0..n).map(|_| self.next_range(n)).collect()
    }
}

/// Deterministic xxhash64-like hash in pure i64 arithmetic
/// Used to derive independent per-tree seeds from the forest seed
pub fn xxhash64_i64(data: &[i64], seed: i64) -> i64 {
    const PRIME1: i64 = 0x9E3779B185EBCA87_u64 as i64;
    const PRIME2: i64 = 0xC2B2AE3D27D4EB4F_u64 as i64;
    const PRIME3: i64 = 0x165667B19E3779F9_u64 as i64;
    const PRIME5: i64 = 0x85EBCA77C2B2AE63_u64 as i64;

    let mut h = seed.wrapping_add(PRIME5);

    for &val in data {
        h = h.wrapping_add(val.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME2);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

/// Deterministic tie-breaker for split selection
/// Equal gains resolve to the lowest feature, then the lowest threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    /// Position of the threshold among the node's sorted distinct values
    pub threshold_rank: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold_rank: usize) -> Self {
        Self {
            feature_idx,
            threshold_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..1000 {
            let val = rng.next_range(10);
            assert!(val < 10);
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_negative_seed() {
        let mut rng = LcgRng::new(i64::MIN);
        assert!(rng.next_i64() >= 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut items: Vec<usize> = (0..50).collect();
        LcgRng::new(42).shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);

        let mut again: Vec<usize> = (0..50).collect();
        LcgRng::new(42).shuffle(&mut again);
        assert_eq!(items, again);
    }

    #[test]
    fn test_bootstrap_covers_both_parities() {
        let sample = LcgRng::new(7).bootstrap(100);
        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|&i| i < 100));
        assert!(sample.iter().any(|i| i % 2 == 0));
        assert!(sample.iter().any(|i| i % 2 == 1));
    }

    #[test]
    fn test_xxhash64_different_seeds() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 42));
        assert_ne!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 43));
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 3);
        let t2 = SplitTieBreaker::new(0, 4);
        let t3 = SplitTieBreaker::new(1, 0);

        assert!(t1 < t2);
        assert!(t2 < t3);
    }
}
