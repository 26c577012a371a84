//! Dataset module for EMNIST data handling
//!
//! This module provides functionality for:
//! - Reading the EMNIST IDX files (optionally gzip-compressed)
//! - Downloading the official EMNIST archive
//! - Class balancing and train/validation splitting
//! - Generating synthetic EMNIST text lines for fixtures
//! - Feeding partitions to Burn through `Dataset` and `Batcher`

pub mod burn_dataset;
pub mod download;
pub mod emnist;
pub mod idx;
pub mod lines;
pub mod mapping;
pub mod split;

pub use burn_dataset::{CharacterBatch, CharacterBatcher, CharacterBurnDataset, CharacterItem};
pub use download::download_emnist;
pub use emnist::{EmnistConfig, EmnistDataset};
pub use lines::{EmnistLines, EmnistLinesConfig};
pub use mapping::CharacterMapping;
pub use split::train_test_split;

use crate::utils::error::{RecognizerError, Result};

/// Side length of an EMNIST glyph in pixels
pub const IMAGE_SIDE: usize = 28;

/// Number of pixels in a single glyph
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// An in-memory set of 28x28 grayscale glyphs and their class labels.
///
/// Pixels are stored row-major, one glyph after another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub images: Vec<u8>,
    pub labels: Vec<usize>,
}

impl Partition {
    /// Build a partition, checking that pixel and label counts agree
    pub fn new(images: Vec<u8>, labels: Vec<usize>) -> Result<Self> {
        if images.len() != labels.len() * IMAGE_PIXELS {
            return Err(RecognizerError::Dataset(format!(
                "{} pixels cannot hold {} glyphs of {}x{}",
                images.len(),
                labels.len(),
                IMAGE_SIDE,
                IMAGE_SIDE
            )));
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels of glyph `index`
    pub fn image(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(IMAGE_PIXELS)?;
        self.images.get(start..start + IMAGE_PIXELS)
    }

    /// Shape as `((n, 28, 28), (n,))`
    pub fn shape(&self) -> ((usize, usize, usize), (usize,)) {
        ((self.len(), IMAGE_SIDE, IMAGE_SIDE), (self.len(),))
    }

    /// First `n` samples, or everything when the partition is smaller
    pub fn take(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            images: self.images[..n * IMAGE_PIXELS].to_vec(),
            labels: self.labels[..n].to_vec(),
        }
    }

    /// Gather the samples at `indices` in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut images = Vec::with_capacity(indices.len() * IMAGE_PIXELS);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            if let Some(pixels) = self.image(i) {
                images.extend_from_slice(pixels);
                labels.push(self.labels[i]);
            }
        }
        Self { images, labels }
    }

    /// Number of samples per class, indexed by label
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for &label in &self.labels {
            if label < num_classes {
                counts[label] += 1;
            }
        }
        counts
    }
}

/// Train / validation / test partitions handed to the model
#[derive(Debug, Clone, Default)]
pub struct DatasetSplits {
    pub train: Partition,
    pub valid: Partition,
    pub test: Partition,
}

impl DatasetSplits {
    pub fn log_shapes(&self) {
        let (train_x, train_y) = self.train.shape();
        let (valid_x, valid_y) = self.valid.shape();
        let (test_x, test_y) = self.test.shape();
        tracing::info!("Training shape: {:?} {:?}", train_x, train_y);
        tracing::info!("Validation shape: {:?} {:?}", valid_x, valid_y);
        tracing::info!("Test shape: {:?} {:?}", test_x, test_y);
    }
}
