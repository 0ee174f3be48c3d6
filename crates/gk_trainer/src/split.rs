//! Deterministic train/test split

use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

/// Share of rows held out for testing, in percent
pub const TEST_PERCENT: usize = 20;

/// Row indices of each side of the split
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with the seeded LCG; the first `ceil(n * 20%)` shuffled
/// indices form the test set.
pub fn train_test_split(n: usize, seed: i64) -> Result<SplitIndices> {
    if n < 2 {
        return Err(TrainerError::InsufficientRows {
            needed: 2,
            actual: n,
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    LcgRng::new(seed).shuffle(&mut indices);

    let n_test = (n * TEST_PERCENT).div_ceil(100);
    let train = indices.split_off(n_test);

    Ok(SplitIndices {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        for (n, expected_test) in [(2, 1), (5, 1), (10, 2), (11, 3), (100, 20), (101, 21)] {
            let split = train_test_split(n, 42).unwrap();
            assert_eq!(split.test.len(), expected_test, "n = {n}");
            assert_eq!(split.train.len(), n - expected_test);
        }
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let split = train_test_split(37, 42).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_determinism() {
        assert_eq!(train_test_split(50, 42).unwrap(), train_test_split(50, 42).unwrap());
        assert_ne!(train_test_split(50, 42).unwrap(), train_test_split(50, 7).unwrap());
    }

    #[test]
    fn test_too_few_rows() {
        assert!(matches!(
            train_test_split(1, 42),
            Err(TrainerError::InsufficientRows { needed: 2, actual: 1 })
        ));
    }
}
