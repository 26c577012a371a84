//! Application configuration
//!
//! Loaded from an optional TOML file; command-line flags override individual
//! values afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::{EmnistConfig, EmnistLinesConfig};
use crate::inference::line::SegmentationConfig;
use crate::registry::RunSpec;
use crate::tracking::{ParamMap, TrackingConfig};
use crate::training::{RunOptions, TrainingConfig};
use crate::utils::{load_toml_config, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: String,
    pub model: String,
    pub network: String,
    /// Directory receiving weights and model bundles
    pub output_dir: PathBuf,
    pub save_weights: bool,
    /// Non-zero writes the full model bundle as well
    pub save_model: i64,
    /// Debug cap on train/test sizes
    pub max_samples: Option<usize>,
    /// Root of the fixture directories
    pub support_dir: PathBuf,
    pub training: TrainingConfig,
    pub emnist: EmnistConfig,
    pub lines: EmnistLinesConfig,
    /// Glyph splitting used by line prediction
    pub segmentation: SegmentationConfig,
    pub tracking: TrackingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset: "EMNIST".to_string(),
            model: "Character_Model".to_string(),
            network: "lenet".to_string(),
            output_dir: PathBuf::from("weights"),
            save_weights: true,
            save_model: 0,
            max_samples: None,
            support_dir: PathBuf::from("tests/support"),
            training: TrainingConfig::default(),
            emnist: EmnistConfig::default(),
            lines: EmnistLinesConfig::default(),
            segmentation: SegmentationConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `path` when given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => load_toml_config(path),
            None => Ok(Self::default()),
        }
    }

    pub fn run_spec(&self) -> Result<RunSpec> {
        RunSpec::resolve(&self.dataset, &self.model, &self.network)
    }

    /// Resolve names and assemble the options of one training run
    pub fn run_options(&self, parameters: ParamMap) -> Result<RunOptions> {
        self.training.validate()?;
        Ok(RunOptions {
            run: self.run_spec()?,
            emnist: self.emnist.clone(),
            training: self.training.clone(),
            output_dir: self.output_dir.clone(),
            max_samples: self.max_samples,
            save_weights: self.save_weights,
            save_model: self.save_model != 0,
            parameters,
        })
    }
}

/// Parse a boolean flag value: `true/false`, `1/0`, `yes/no`, `on/off`
pub fn parse_bool_flag(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean (use true/false)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NetworkKind;
    use crate::tracking::TrackerKind;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("True"), Ok(true));
        assert_eq!(parse_bool_flag("0"), Ok(false));
        assert_eq!(parse_bool_flag("no"), Ok(false));
        assert!(parse_bool_flag("maybe").is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.toml");
        std::fs::write(
            &path,
            r#"
network = "mlp"
save_model = 1

[training]
epochs = 3

[segmentation]
space_ratio = 0.8

[tracking]
kind = "none"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.emnist.split_name, "byclass");
        assert_eq!(config.tracking.kind, TrackerKind::None);
        assert_eq!(config.segmentation.space_ratio, 0.8);
        assert_eq!(config.segmentation.ink_threshold, 32);

        let options = config.run_options(ParamMap::new()).unwrap();
        assert_eq!(options.run.network, NetworkKind::Mlp);
        assert!(options.save_model);
        assert!(options.save_weights);
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        let config = AppConfig {
            network: "vgg".to_string(),
            ..AppConfig::default()
        };
        assert!(config.run_options(ParamMap::new()).is_err());
    }
}
