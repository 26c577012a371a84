//! EMNIST character dataset loader

use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::idx::{self, read_idx_images, read_idx_labels};
use super::mapping::CharacterMapping;
use super::{Partition, IMAGE_SIDE};
use crate::utils::error::{RecognizerError, Result};

/// Where and how to load EMNIST
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmnistConfig {
    /// Directory holding the IDX and mapping files
    pub data_dir: PathBuf,
    /// EMNIST split (`byclass`, `balanced`, `letters`, ...)
    pub split_name: String,
    /// Resample the training partition to equal per-class counts
    pub balance: bool,
    pub seed: u64,
}

impl Default for EmnistConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/emnist"),
            split_name: "byclass".to_string(),
            balance: true,
            seed: 42,
        }
    }
}

impl EmnistConfig {
    pub fn images_file(&self, subset: &str) -> String {
        format!("emnist-{}-{}-images-idx3-ubyte", self.split_name, subset)
    }

    pub fn labels_file(&self, subset: &str) -> String {
        format!("emnist-{}-{}-labels-idx1-ubyte", self.split_name, subset)
    }

    pub fn mapping_file(&self) -> String {
        format!("emnist-{}-mapping.txt", self.split_name)
    }
}

/// EMNIST characters held in memory
#[derive(Debug, Clone)]
pub struct EmnistDataset {
    pub mapping: CharacterMapping,
    pub train: Partition,
    pub test: Partition,
}

impl EmnistDataset {
    /// Load the train and test partitions described by `config`
    pub fn load(config: &EmnistConfig) -> Result<Self> {
        let dir = config.data_dir.as_path();
        if !dir.is_dir() {
            return Err(RecognizerError::Dataset(format!(
                "EMNIST directory {} does not exist; run `emnist download` first",
                dir.display()
            )));
        }

        let mapping = CharacterMapping::load(&dir.join(config.mapping_file()))?;
        tracing::info!(
            "Loading EMNIST '{}' ({} classes) from {}",
            config.split_name,
            mapping.len(),
            dir.display()
        );

        let mut train = load_partition(dir, config, "train", mapping.len())?;
        let test = load_partition(dir, config, "test", mapping.len())?;

        if config.balance {
            train = balance_classes(&train, mapping.len(), config.seed);
            tracing::debug!("Balanced training partition to {} samples", train.len());
        }

        Ok(Self {
            mapping,
            train,
            test,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.mapping.len()
    }

    /// Consume the dataset into `(train, test)` partitions
    pub fn into_partitions(self) -> (Partition, Partition) {
        (self.train, self.test)
    }
}

fn load_partition(
    dir: &Path,
    config: &EmnistConfig,
    subset: &str,
    num_classes: usize,
) -> Result<Partition> {
    let images_path = idx::locate(dir, &config.images_file(subset))?;
    let labels_path = idx::locate(dir, &config.labels_file(subset))?;

    let images = read_idx_images(idx::open(&images_path)?)?;
    let labels = read_idx_labels(idx::open(&labels_path)?)?;

    if images.rows != IMAGE_SIDE || images.cols != IMAGE_SIDE {
        return Err(RecognizerError::Dataset(format!(
            "{} holds {}x{} images, expected {IMAGE_SIDE}x{IMAGE_SIDE}",
            images_path.display(),
            images.rows,
            images.cols
        )));
    }
    if images.count != labels.len() {
        return Err(RecognizerError::Dataset(format!(
            "{subset}: {} images but {} labels",
            images.count,
            labels.len()
        )));
    }

    let labels: Vec<usize> = labels.into_iter().map(usize::from).collect();
    if let Some(bad) = labels.iter().find(|&&label| label >= num_classes) {
        return Err(RecognizerError::Dataset(format!(
            "{subset}: label {bad} outside the {num_classes}-class mapping"
        )));
    }

    Partition::new(images.pixels, labels)
}

/// Resample every present class to the mean per-class count, with replacement.
/// Samples labelled outside `0..num_classes` are dropped.
pub fn balance_classes(partition: &Partition, num_classes: usize, seed: u64) -> Partition {
    let counts = partition.class_counts(num_classes);
    let present = counts.iter().filter(|&&c| c > 0).count();
    if present == 0 {
        return partition.clone();
    }
    let target = counts.iter().sum::<usize>() / present;

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); num_classes];
    for (i, &label) in partition.labels.iter().enumerate() {
        if let Some(members) = by_class.get_mut(label) {
            members.push(i);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut picked = Vec::with_capacity(target * present);
    for members in by_class.iter().filter(|m| !m.is_empty()) {
        for _ in 0..target {
            picked.push(members[rng.gen_range(0..members.len())]);
        }
    }

    partition.select(&picked)
}
