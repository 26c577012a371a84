//! Character classifier: a network plus everything needed to interpret it

use std::fmt;
use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, Module},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, Tensor, TensorData},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::network::{Network, NetworkConfig};
use crate::dataset::{CharacterMapping, DatasetSplits, Partition, IMAGE_PIXELS, IMAGE_SIDE};
use crate::registry::RunSpec;
use crate::tracking::ExperimentTracker;
use crate::training::{self, TrainingConfig, TrainingHistory};
use crate::utils::error::{RecognizerError, Result};
use crate::utils::metrics::Metrics;

/// Sidecar describing a set of saved weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub run: RunSpec,
    pub network: NetworkConfig,
    pub mapping: CharacterMapping,
    pub saved_at: DateTime<Utc>,
    /// Test metrics, only present in full model bundles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_metrics: Option<Metrics>,
}

/// A network wired to its character mapping and run names
#[derive(Debug, Clone)]
pub struct CharacterModel<B: Backend> {
    network: Network<B>,
    config: NetworkConfig,
    mapping: CharacterMapping,
    run: RunSpec,
    device: B::Device,
}

impl<B: Backend> CharacterModel<B> {
    /// Freshly initialized model with one output per mapped character
    pub fn new(run: RunSpec, mapping: CharacterMapping, device: &B::Device) -> Self {
        let config = NetworkConfig::new(run.network, mapping.len());
        Self::from_config(run, config, mapping, device)
    }

    pub fn from_config(
        run: RunSpec,
        config: NetworkConfig,
        mapping: CharacterMapping,
        device: &B::Device,
    ) -> Self {
        Self {
            network: config.init(device),
            config,
            mapping,
            run,
            device: device.clone(),
        }
    }

    pub fn network(&self) -> &Network<B> {
        &self.network
    }

    pub(crate) fn replace_network(&mut self, network: Network<B>) {
        self.network = network;
    }

    pub fn mapping(&self) -> &CharacterMapping {
        &self.mapping
    }

    pub fn run(&self) -> RunSpec {
        self.run
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    /// `<dir>/<model>_<dataset>_<network>_weights.mpk`
    pub fn weights_path(dir: &Path, run: &RunSpec) -> PathBuf {
        dir.join(format!("{}_weights.mpk", run.artifact_stem()))
    }

    /// `<dir>/<model>_<dataset>_<network>_config.json`
    pub fn config_path(dir: &Path, run: &RunSpec) -> PathBuf {
        dir.join(format!("{}_config.json", run.artifact_stem()))
    }

    fn card(&self, test_metrics: Option<Metrics>) -> ModelCard {
        ModelCard {
            run: self.run,
            network: self.config.clone(),
            mapping: self.mapping.clone(),
            saved_at: Utc::now(),
            test_metrics,
        }
    }

    fn write(&self, weights: &Path, card_path: &Path, card: &ModelCard) -> Result<()> {
        if let Some(parent) = weights.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.network
            .clone()
            .save_file(weights.to_path_buf(), &CompactRecorder::new())
            .map_err(|e| RecognizerError::Model(format!("Failed to save weights: {e:?}")))?;
        std::fs::write(card_path, serde_json::to_string_pretty(card)?)?;
        Ok(())
    }

    fn read(weights: &Path, card_path: &Path, device: &B::Device) -> Result<Self> {
        if !weights.exists() {
            return Err(RecognizerError::PathNotFound(weights.to_path_buf()));
        }
        let content = std::fs::read_to_string(card_path)
            .map_err(|_| RecognizerError::PathNotFound(card_path.to_path_buf()))?;
        let card: ModelCard = serde_json::from_str(&content)?;

        let network = card
            .network
            .init::<B>(device)
            .load_file(weights.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|e| RecognizerError::Model(format!("Failed to load weights: {e:?}")))?;

        Ok(Self {
            network,
            config: card.network,
            mapping: card.mapping,
            run: card.run,
            device: device.clone(),
        })
    }

    /// Save the weights and their config sidecar into `dir`
    pub fn save_weights(&self, dir: &Path) -> Result<PathBuf> {
        let weights = Self::weights_path(dir, &self.run);
        self.write(&weights, &Self::config_path(dir, &self.run), &self.card(None))?;
        tracing::info!("Saved weights to {}", weights.display());
        Ok(weights)
    }

    /// Load weights previously written by [`save_weights`](Self::save_weights)
    pub fn load_weights(dir: &Path, run: &RunSpec, device: &B::Device) -> Result<Self> {
        Self::read(
            &Self::weights_path(dir, run),
            &Self::config_path(dir, run),
            device,
        )
    }

    /// Write a self-contained bundle directory `<dir>/<stem>/` holding
    /// `model.mpk` and `model.json` (config, mapping and test metrics)
    pub fn save_bundle(&self, dir: &Path, test_metrics: &Metrics) -> Result<PathBuf> {
        let bundle = dir.join(self.run.artifact_stem());
        self.write(
            &bundle.join("model.mpk"),
            &bundle.join("model.json"),
            &self.card(Some(test_metrics.clone())),
        )?;
        tracing::info!("Saved model bundle to {}", bundle.display());
        Ok(bundle)
    }

    pub fn load_bundle(bundle: &Path, device: &B::Device) -> Result<Self> {
        Self::read(&bundle.join("model.mpk"), &bundle.join("model.json"), device)
    }

    /// Class probabilities for a batch of normalized 28x28 glyphs
    pub fn predict_batch(&self, glyphs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if glyphs.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = glyphs.iter().find(|g| g.len() != IMAGE_PIXELS) {
            return Err(RecognizerError::InvalidInput(format!(
                "Expected {IMAGE_PIXELS} pixels per glyph, got {}",
                bad.len()
            )));
        }

        let batch_size = glyphs.len();
        let data: Vec<f32> = glyphs.iter().flatten().copied().collect();
        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [batch_size, 1, IMAGE_SIDE, IMAGE_SIDE]),
            &self.device,
        );

        let probs: Vec<f32> = self
            .network
            .forward_softmax(input)
            .into_data()
            .to_vec()
            .map_err(|e| RecognizerError::Model(format!("Unreadable output tensor: {e:?}")))?;

        Ok(probs
            .chunks(self.num_classes())
            .map(|row| row.to_vec())
            .collect())
    }

    /// Most likely character for one normalized glyph and its probability
    pub fn predict_on_image(&self, glyph: &[f32]) -> Result<(char, f32)> {
        let probs = self.predict_batch(&[glyph.to_vec()])?;
        let row = probs
            .first()
            .ok_or_else(|| RecognizerError::Model("Empty prediction".to_string()))?;
        let (index, confidence) = argmax(row);
        let ch = self.mapping.char_of(index).ok_or_else(|| {
            RecognizerError::Model(format!("Class {index} missing from the mapping"))
        })?;
        Ok((ch, confidence))
    }
}

impl<B: AutodiffBackend> CharacterModel<B> {
    /// Train on `splits.train`, validating on `splits.valid` after every epoch
    pub fn fit(
        &mut self,
        splits: &DatasetSplits,
        config: &TrainingConfig,
        tracker: &mut dyn ExperimentTracker,
    ) -> Result<TrainingHistory> {
        training::train_model(self, splits, config, tracker)
    }

    /// Loss and accuracy on a partition, dropout disabled
    pub fn evaluate(&self, partition: &Partition, batch_size: usize) -> Metrics {
        let network = self.network.clone().valid();
        training::evaluate(&network, partition, batch_size, self.num_classes(), &self.device)
    }
}

/// Index and value of the largest probability
pub fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best })
}

impl<B: Backend> fmt::Display for CharacterModel<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(dataset={}, network={}, classes={}, params={})",
            self.run.model,
            self.run.dataset,
            self.run.network,
            self.num_classes(),
            self.network.num_params()
        )
    }
}
