//! Train/validation splitting

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::Partition;
use crate::utils::error::{RecognizerError, Result};

/// Default held-out fraction
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Default split seed
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Shuffle `partition` with a seeded RNG and hold out the last
/// `ceil(n * test_size)` samples.
///
/// Returns `(train, held_out)`.
pub fn train_test_split(
    partition: &Partition,
    test_size: f64,
    seed: u64,
) -> Result<(Partition, Partition)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RecognizerError::InvalidInput(format!(
            "test_size must lie in (0, 1), got {test_size}"
        )));
    }

    let n = partition.len();
    let held_out = (n as f64 * test_size).ceil() as usize;
    if held_out >= n {
        return Err(RecognizerError::Dataset(format!(
            "Cannot split {n} samples with test_size {test_size}: training set would be empty"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (train_idx, test_idx) = indices.split_at(n - held_out);
    Ok((partition.select(train_idx), partition.select(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::synthetic_partition;

    #[test]
    fn test_split_sizes() {
        let partition = synthetic_partition(101, 10);
        let (train, valid) = train_test_split(&partition, 0.2, 42).unwrap();
        assert_eq!(valid.len(), 21);
        assert_eq!(train.len(), 80);
    }

    #[test]
    fn test_split_is_deterministic() {
        let partition = synthetic_partition(50, 5);
        let first = train_test_split(&partition, 0.2, 42).unwrap();
        let second = train_test_split(&partition, 0.2, 42).unwrap();
        assert_eq!(first, second);

        let other_seed = train_test_split(&partition, 0.2, 7).unwrap();
        assert_ne!(first.0.labels, other_seed.0.labels);
    }

    #[test]
    fn test_split_is_a_partition() {
        let partition = synthetic_partition(30, 30);
        let (train, valid) = train_test_split(&partition, 0.2, 42).unwrap();
        let mut all: Vec<usize> = train.labels.iter().chain(&valid.labels).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_test_size() {
        let partition = synthetic_partition(10, 2);
        assert!(train_test_split(&partition, 0.0, 42).is_err());
        assert!(train_test_split(&partition, 1.0, 42).is_err());
        assert!(train_test_split(&synthetic_partition(1, 1), 0.2, 42).is_err());
    }
}
