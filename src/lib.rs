//! # EMNIST Recognizer
//!
//! Handwritten character recognition on EMNIST with the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: EMNIST IDX loading, download, splitting and synthetic text lines
//! - `model`: LeNet and MLP networks wrapped in a `CharacterModel`
//! - `training`: Training loop and the end-to-end run flow
//! - `tracking`: Experiment trackers (local JSON, HTTP, no-op)
//! - `inference`: Character and line predictors
//! - `support`: Fixture generation and the prediction regression check
//! - `utils`: Logging, metrics, and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use emnist_recognizer::inference::{CharacterPredictor, Recognize};
//! use emnist_recognizer::registry::RunSpec;
//!
//! let predictor = CharacterPredictor::from_weights("weights".as_ref(), &RunSpec::default(), &Default::default())?;
//! let (text, confidence) = predictor.predict("tests/support/emnist/e.png".as_ref())?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod registry;
pub mod support;
pub mod tracking;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::AppConfig;
pub use dataset::{
    CharacterMapping, DatasetSplits, EmnistConfig, EmnistDataset, EmnistLines, EmnistLinesConfig,
    Partition,
};
pub use inference::{CharacterPredictor, LinePredictor, Recognize};
pub use model::CharacterModel;
pub use registry::RunSpec;
pub use tracking::{ExperimentTracker, TrackingConfig};
pub use training::{TrainingConfig, TrainingHistory};
pub use utils::error::{RecognizerError, Result};
pub use utils::metrics::{ConfusionMatrix, Metrics};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
