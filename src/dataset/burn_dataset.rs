//! Burn Dataset Integration for EMNIST
//!
//! This module implements Burn's Dataset trait and Batcher so partitions can
//! be fed to the training loop and to evaluation.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Partition, IMAGE_PIXELS, IMAGE_SIDE};

/// A single glyph ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterItem {
    /// 784 pixel intensities in [0, 1], row-major
    pub image: Vec<f32>,
    /// Class index
    pub label: usize,
}

impl CharacterItem {
    /// Normalize raw `u8` pixels to [0, 1]
    pub fn from_pixels(pixels: &[u8], label: usize) -> Self {
        Self {
            image: pixels.iter().map(|&p| p as f32 / 255.0).collect(),
            label,
        }
    }
}

/// EMNIST partition implementing Burn's Dataset trait
#[derive(Debug, Clone)]
pub struct CharacterBurnDataset {
    partition: Partition,
}

impl CharacterBurnDataset {
    pub fn new(partition: Partition) -> Self {
        Self { partition }
    }
}

impl Dataset<CharacterItem> for CharacterBurnDataset {
    fn get(&self, index: usize) -> Option<CharacterItem> {
        let pixels = self.partition.image(index)?;
        Some(CharacterItem::from_pixels(pixels, self.partition.labels[index]))
    }

    fn len(&self) -> usize {
        self.partition.len()
    }
}

/// A batch of EMNIST glyphs
#[derive(Clone, Debug)]
pub struct CharacterBatch<B: Backend> {
    /// Images with shape [batch_size, 1, 28, 28]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for creating EMNIST batches
#[derive(Clone, Debug, Default)]
pub struct CharacterBatcher;

impl CharacterBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, CharacterItem, CharacterBatch<B>> for CharacterBatcher {
    fn batch(&self, items: Vec<CharacterItem>, device: &B::Device) -> CharacterBatch<B> {
        let batch_size = items.len();

        let mut images_data = Vec::with_capacity(batch_size * IMAGE_PIXELS);
        for item in &items {
            images_data.extend_from_slice(&item.image);
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 1, IMAGE_SIDE, IMAGE_SIDE]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        CharacterBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use crate::dataset::tests::synthetic_partition;

    #[test]
    fn test_item_normalization() {
        let item = CharacterItem::from_pixels(&[0, 255, 51], 3);
        assert_eq!(item.image, vec![0.0, 1.0, 0.2]);
        assert_eq!(item.label, 3);
    }

    #[test]
    fn test_dataset_access() {
        let dataset = CharacterBurnDataset::new(synthetic_partition(4, 2));
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.get(3).unwrap().label, 1);
        assert!(dataset.get(4).is_none());
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let dataset = CharacterBurnDataset::new(synthetic_partition(3, 3));
        let items: Vec<_> = (0..3).filter_map(|i| dataset.get(i)).collect();

        let batch: CharacterBatch<DefaultBackend> = CharacterBatcher::new().batch(items, &device);
        assert_eq!(batch.images.dims(), [3, 1, 28, 28]);
        assert_eq!(batch.targets.dims(), [3]);
    }
}
