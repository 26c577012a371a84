//! Experiment tracking
//!
//! Training runs report parameters, per-epoch metrics and a hash of the
//! training data to an [`ExperimentTracker`]. Metric names are prefixed with
//! the active [`Context`] (`train_loss`, `test_accuracy`, ...).

pub mod http;
pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::error::{RecognizerError, Result};

pub use http::HttpTracker;
pub use local::LocalTracker;

/// Scalar metrics keyed by name
pub type MetricMap = BTreeMap<String, f64>;

/// Run parameters keyed by flag name
pub type ParamMap = BTreeMap<String, String>;

/// Phase of a run, used to prefix metric names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Train,
    Test,
}

impl Context {
    pub fn prefix(&self) -> &'static str {
        match self {
            Context::Train => "train_",
            Context::Test => "test_",
        }
    }
}

/// Apply the context prefix to every metric name
pub fn prefixed(context: Option<Context>, metrics: &MetricMap) -> MetricMap {
    let prefix = context.map(|c| c.prefix()).unwrap_or("");
    metrics
        .iter()
        .map(|(name, value)| (format!("{prefix}{name}"), *value))
        .collect()
}

/// SHA-256 hex digest of raw dataset bytes
pub fn dataset_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Sink for run parameters and metrics
pub trait ExperimentTracker {
    fn context(&self) -> Option<Context>;

    fn set_context(&mut self, context: Option<Context>);

    /// Record metrics under the current context; `step` is the epoch when known
    fn log_metrics(&mut self, metrics: &MetricMap, step: Option<usize>) -> Result<()>;

    fn log_parameters(&mut self, params: &ParamMap) -> Result<()>;

    /// Record the SHA-256 of the training data
    fn log_dataset_hash(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the run; no further events are expected
    fn end(&mut self) -> Result<()>;
}

/// Run `f` with `context` active, restoring the previous context afterwards
pub fn scoped<T, F>(tracker: &mut dyn ExperimentTracker, context: Context, f: F) -> T
where
    F: FnOnce(&mut dyn ExperimentTracker) -> T,
{
    let previous = tracker.context();
    tracker.set_context(Some(context));
    let out = f(tracker);
    tracker.set_context(previous);
    out
}

/// Tracker that records nothing
#[derive(Debug, Default)]
pub struct NoopTracker {
    context: Option<Context>,
}

impl ExperimentTracker for NoopTracker {
    fn context(&self) -> Option<Context> {
        self.context
    }

    fn set_context(&mut self, context: Option<Context>) {
        self.context = context;
    }

    fn log_metrics(&mut self, _metrics: &MetricMap, _step: Option<usize>) -> Result<()> {
        Ok(())
    }

    fn log_parameters(&mut self, _params: &ParamMap) -> Result<()> {
        Ok(())
    }

    fn log_dataset_hash(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Which tracker implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    Local,
    Http,
    None,
}

impl std::str::FromStr for TrackerKind {
    type Err = RecognizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(TrackerKind::Local),
            "http" => Ok(TrackerKind::Http),
            "none" => Ok(TrackerKind::None),
            other => Err(RecognizerError::Config(format!(
                "Unknown tracker '{other}', expected one of: local, http, none"
            ))),
        }
    }
}

/// Tracker settings from the `[tracking]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub kind: TrackerKind,
    pub project: String,
    /// Root directory of local run files
    pub runs_dir: PathBuf,
    /// Base URL of the HTTP tracking service
    pub endpoint: Option<String>,
    /// Environment variable holding the HTTP bearer token
    pub api_key_env: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::Local,
            project: "emnist".to_string(),
            runs_dir: PathBuf::from("runs"),
            endpoint: None,
            api_key_env: "EXPERIMENT_API_KEY".to_string(),
        }
    }
}

/// `<utc timestamp>-<4 hex digits>`
pub fn new_run_id() -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!("{}-{:04x}", chrono::Utc::now().format("%Y%m%d-%H%M%S"), suffix)
}

/// Build the tracker selected by `config`
pub fn build_tracker(config: &TrackingConfig) -> Result<Box<dyn ExperimentTracker>> {
    let run_id = new_run_id();
    match config.kind {
        TrackerKind::Local => Ok(Box::new(LocalTracker::create(
            &config.runs_dir,
            &config.project,
            &run_id,
        )?)),
        TrackerKind::Http => Ok(Box::new(HttpTracker::from_env(config, run_id)?)),
        TrackerKind::None => Ok(Box::new(NoopTracker::default())),
    }
}
