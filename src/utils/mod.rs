//! Utilities module for logging, metrics, and helper functions
//!
//! - Structured logging with tracing
//! - Metrics computation (accuracy, recall, confusion matrix)
//! - Error handling types
//! - TOML configuration loading

pub mod error;
pub mod logging;
pub mod metrics;

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

pub use error::{RecognizerError, Result};
pub use logging::{init_logging, LogConfig};
pub use metrics::{ConfusionMatrix, Metrics};

/// Load a TOML file into any deserializable configuration type
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path).map_err(|e| {
        RecognizerError::Config(format!("Failed to read config {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        RecognizerError::Config(format!("Failed to parse config {}: {e}", path.display()))
    })
}

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct Sample {
        epochs: usize,
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.5), "30.5s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m");
    }

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "epochs = 3\n").unwrap();

        let sample: Sample = load_toml_config(&path).unwrap();
        assert_eq!(sample.epochs, 3);
    }

    #[test]
    fn test_load_toml_config_missing_file() {
        let result: Result<Sample> = load_toml_config(Path::new("/nonexistent/cfg.toml"));
        assert!(matches!(result, Err(RecognizerError::Config(_))));
    }
}
