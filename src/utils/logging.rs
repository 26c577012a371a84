//! Logging Module
//!
//! Structured logging built on `tracing`. Every binary calls [`init_logging`]
//! once; `RUST_LOG` overrides the configured level when set.

use std::time::Instant;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::error::{RecognizerError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug-level logging with module paths
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Pick the verbose or default config from a `--verbose` flag
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::verbose()
        } else {
            Self::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LogConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.include_target)
                .with_ansi(config.ansi_colors)
                .compact(),
        )
        .with(config.env_filter())
        .try_init()
        .map_err(|e| RecognizerError::Config(format!("Failed to initialize logger: {e}")))
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        tracing::debug!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch with metrics
    pub fn end_epoch(&self, train_loss: f64, train_acc: f64, val_loss: f64, val_acc: f64) {
        let epoch_time = self.epoch_start.elapsed();
        let total_time = self.training_start.elapsed();

        let epochs_remaining = self.total_epochs.saturating_sub(self.epoch + 1);
        let avg_epoch_time = total_time.as_secs_f64() / (self.epoch + 1) as f64;
        let eta_secs = epochs_remaining as f64 * avg_epoch_time;

        tracing::info!(
            "Epoch {}/{} in {:.1}s | loss: {:.4} | acc: {:.2}% | val_loss: {:.4} | val_acc: {:.2}% | ETA: {:.0}s",
            self.epoch + 1,
            self.total_epochs,
            epoch_time.as_secs_f64(),
            train_loss,
            train_acc * 100.0,
            val_loss,
            val_acc * 100.0,
            eta_secs
        );
    }

    pub fn log_early_stop(&self, patience: usize) {
        tracing::warn!(
            "Early stopping triggered after {} epochs without improvement",
            patience
        );
    }

    pub fn log_complete(&self, epochs_run: usize, best_val_accuracy: f64) {
        tracing::info!(
            "Training complete: {} epochs in {:.1}s | best val_acc: {:.2}%",
            epochs_run,
            self.training_start.elapsed().as_secs_f64(),
            best_val_accuracy * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.include_target);
    }

    #[test]
    fn test_from_verbose() {
        assert_eq!(LogConfig::from_verbose(true).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbose(false).level, Level::INFO);
    }

    #[test]
    fn test_training_logger_eta_saturates() {
        let mut logger = TrainingLogger::new(1);
        logger.start_epoch(3);
        // epoch index beyond total must not underflow
        logger.end_epoch(0.5, 0.9, 0.6, 0.85);
    }
}
