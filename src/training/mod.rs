//! Training module
//!
//! A hand-written Burn training loop (Adam + cross-entropy) plus the
//! end-to-end run flow used by the `train` binary.

pub mod runner;
pub mod trainer;

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{RecognizerError, Result};

pub use runner::{run, run_with_dataset, RunOptions, RunOutcome};
pub use trainer::{evaluate, train_model};

/// Optimisation hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Stop after this many epochs without a lower validation loss
    pub patience: Option<usize>,
    /// Seed of the epoch shuffling RNG
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            patience: None,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(RecognizerError::Config(
                "Number of epochs must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RecognizerError::Config(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.patience == Some(0) {
            return Err(RecognizerError::Config(
                "Patience must be at least 1 epoch (omit it to disable early stopping)".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(RecognizerError::Config(
                "Learning rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Metrics of one finished epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn best_val_accuracy(&self) -> f64 {
        self.epochs
            .iter()
            .map(|e| e.val_accuracy)
            .fold(0.0, f64::max)
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Write `epoch,loss,accuracy,val_loss,val_accuracy` rows
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "epoch,loss,accuracy,val_loss,val_accuracy")?;
        for e in &self.epochs {
            writeln!(
                file,
                "{},{:.6},{:.6},{:.6},{:.6}",
                e.epoch + 1,
                e.loss,
                e.accuracy,
                e.val_loss,
                e.val_accuracy
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(epoch: usize, val_accuracy: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss: 1.0,
            accuracy: 0.5,
            val_loss: 1.0,
            val_accuracy,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        let zero_batch = TrainingConfig {
            batch_size: 0,
            ..TrainingConfig::default()
        };
        assert!(matches!(zero_batch.validate(), Err(RecognizerError::Config(_))));

        let zero_patience = TrainingConfig {
            patience: Some(0),
            ..TrainingConfig::default()
        };
        assert!(matches!(zero_patience.validate(), Err(RecognizerError::Config(_))));
        let patience = TrainingConfig {
            patience: Some(1),
            ..TrainingConfig::default()
        };
        assert!(patience.validate().is_ok());
    }

    #[test]
    fn test_history_csv() {
        let history = TrainingHistory {
            epochs: vec![epoch(0, 0.4), epoch(1, 0.6)],
            stopped_early: false,
        };
        assert_eq!(history.best_val_accuracy(), 0.6);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        history.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,"));
    }
}
