//! Tracker writing one JSON file per run

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{dataset_hash, prefixed, Context, ExperimentTracker, MetricMap, ParamMap};
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

/// Everything recorded for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub project: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub parameters: ParamMap,
    pub dataset_hash: Option<String>,
    pub metrics: Vec<MetricEvent>,
}

/// Writes `runs/<project>/<run-id>.json`, rewritten after every event
#[derive(Debug)]
pub struct LocalTracker {
    path: PathBuf,
    record: RunRecord,
    context: Option<Context>,
}

impl LocalTracker {
    pub fn create(runs_dir: &Path, project: &str, run_id: &str) -> Result<Self> {
        let dir = runs_dir.join(project);
        std::fs::create_dir_all(&dir)?;

        let tracker = Self {
            path: dir.join(format!("{run_id}.json")),
            record: RunRecord {
                project: project.to_string(),
                run_id: run_id.to_string(),
                started_at: Utc::now(),
                ended_at: None,
                parameters: ParamMap::new(),
                dataset_hash: None,
                metrics: Vec::new(),
            },
            context: None,
        };
        tracker.flush()?;
        tracing::info!("Tracking run {} in {}", run_id, tracker.path.display());
        Ok(tracker)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    fn flush(&self) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.record)?)?;
        Ok(())
    }
}

impl ExperimentTracker for LocalTracker {
    fn context(&self) -> Option<Context> {
        self.context
    }

    fn set_context(&mut self, context: Option<Context>) {
        self.context = context;
    }

    fn log_metrics(&mut self, metrics: &MetricMap, step: Option<usize>) -> Result<()> {
        self.record
            .metrics
            .extend(prefixed(self.context, metrics).into_iter().map(|(name, value)| {
                MetricEvent { name, value, step }
            }));
        self.flush()
    }

    fn log_parameters(&mut self, params: &ParamMap) -> Result<()> {
        self.record
            .parameters
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.flush()
    }

    fn log_dataset_hash(&mut self, bytes: &[u8]) -> Result<()> {
        self.record.dataset_hash = Some(dataset_hash(bytes));
        self.flush()
    }

    fn end(&mut self) -> Result<()> {
        self.record.ended_at = Some(Utc::now());
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::scoped;
    use tempfile::TempDir;

    #[test]
    fn test_run_file_contents() {
        let dir = TempDir::new().unwrap();
        let mut tracker = LocalTracker::create(dir.path(), "emnist", "run-1").unwrap();
        assert_eq!(tracker.path(), dir.path().join("emnist/run-1.json"));

        let metrics = MetricMap::from([("accuracy".to_string(), 0.9)]);
        scoped(&mut tracker, Context::Test, |t| t.log_metrics(&metrics, None)).unwrap();
        tracker
            .log_parameters(&ParamMap::from([("epochs".to_string(), "10".to_string())]))
            .unwrap();
        tracker.log_dataset_hash(b"abc").unwrap();
        tracker.end().unwrap();

        let content = std::fs::read_to_string(tracker.path()).unwrap();
        let record: RunRecord = serde_json::from_str(&content).unwrap();
        assert_eq!(record.metrics[0].name, "test_accuracy");
        assert_eq!(record.parameters["epochs"], "10");
        assert!(record.dataset_hash.unwrap().starts_with("ba7816bf"));
        assert!(record.ended_at.is_some());
    }
}
