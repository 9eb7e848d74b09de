//! Train/test splitting and k-fold cross-validation splits
//!
//! Splits operate on raw row positions, before anything is fitted.

use crate::error::{ClassifierError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Hold-out split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// Shuffle seed; `None` draws from entropy
    pub seed: Option<u64>,
    /// Shuffle before splitting; otherwise the last rows form the test split
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: Some(42),
            shuffle: true,
        }
    }
}

impl SplitConfig {
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ClassifierError::InvalidParameter {
                name: "test_fraction".into(),
                value: self.test_fraction.to_string(),
                reason: "must be in (0, 1)".into(),
            });
        }
        Ok(())
    }
}

fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Partition rows into (train, test). Both sides get at least one row.
pub fn train_test_split<T: Clone>(rows: &[T], config: &SplitConfig) -> Result<(Vec<T>, Vec<T>)> {
    config.validate()?;
    let n = rows.len();
    if n < 2 {
        return Err(ClassifierError::InvalidInput(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    if config.shuffle {
        indices.shuffle(&mut make_rng(config.seed));
    }

    let n_test = ((n as f64 * config.test_fraction).round() as usize).clamp(1, n - 1);
    let (train_idx, test_idx) = indices.split_at(n - n_test);

    // keep source order within each side
    let mut train_idx = train_idx.to_vec();
    let mut test_idx = test_idx.to_vec();
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok((
        train_idx.iter().map(|&i| rows[i].clone()).collect(),
        test_idx.iter().map(|&i| rows[i].clone()).collect(),
    ))
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(ClassifierError::InvalidParameter {
                name: "n_splits".into(),
                value: self.n_splits.to_string(),
                reason: "must be at least 2".into(),
            });
        }
        if n_samples < self.n_splits {
            return Err(ClassifierError::InvalidInput(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut make_rng(self.random_state));
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut current = 0;
        for fold_idx in 0..self.n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_test_split_sizes_and_disjointness() {
        let rows: Vec<usize> = (0..100).collect();
        let (train, test) = train_test_split(&rows, &SplitConfig::default()).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
        assert!(test.iter().all(|t| !train.contains(t)));
    }

    #[test]
    fn test_split_is_reproducible_with_seed() {
        let rows: Vec<usize> = (0..50).collect();
        let config = SplitConfig::default().with_seed(Some(7));
        let a = train_test_split(&rows, &config).unwrap();
        let b = train_test_split(&rows, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unshuffled_split_takes_tail() {
        let rows: Vec<usize> = (0..10).collect();
        let config = SplitConfig::default().with_shuffle(false);
        let (train, test) = train_test_split(&rows, &config).unwrap();
        assert_eq!(test, vec![8, 9]);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_invalid_fraction() {
        let rows = vec![1, 2, 3];
        assert!(train_test_split(&rows, &SplitConfig::default().with_test_fraction(1.0)).is_err());
        assert!(train_test_split(&[1], &SplitConfig::default()).is_err());
    }

    #[test]
    fn test_k_fold_split() {
        let splits = KFold::new(3).with_random_state(Some(1)).split(10).unwrap();
        assert_eq!(splits.len(), 3);
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 10);
        }
    }
}
