//! Tracker posting JSON events to a remote service
//!
//! Every call becomes one `POST <endpoint>/events` request:
//!
//! ```json
//! { "project": "emnist", "run_id": "...", "kind": "metrics", "step": 3, "payload": { ... } }
//! ```
//!
//! The bearer token is read from the environment, never from configuration files.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;
use serde_json::{json, Value};

use super::{dataset_hash, prefixed, Context, ExperimentTracker, MetricMap, ParamMap, TrackingConfig};
use crate::utils::error::{RecognizerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Metrics,
    Parameters,
    DatasetHash,
    End,
}

/// Request body of one tracking event
#[derive(Debug, Clone, Serialize)]
pub struct Event<'a> {
    pub project: &'a str,
    pub run_id: &'a str,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub payload: Value,
}

pub struct HttpTracker {
    client: Client,
    url: String,
    headers: HeaderMap,
    project: String,
    run_id: String,
    context: Option<Context>,
}

impl HttpTracker {
    pub fn new(endpoint: &str, project: &str, run_id: String, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("emnist-recognizer"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| RecognizerError::Config("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(Self {
            client: Client::new(),
            url: format!("{}/events", endpoint.trim_end_matches('/')),
            headers,
            project: project.to_string(),
            run_id,
            context: None,
        })
    }

    /// Build from config, reading the key from `config.api_key_env`
    pub fn from_env(config: &TrackingConfig, run_id: String) -> Result<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            RecognizerError::Config("HTTP tracker selected but no endpoint configured".to_string())
        })?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RecognizerError::Config(format!(
                "HTTP tracker selected but ${} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(endpoint, &config.project, run_id, &api_key)
    }

    fn send(&self, kind: EventKind, step: Option<usize>, payload: Value) -> Result<()> {
        let event = Event {
            project: &self.project,
            run_id: &self.run_id,
            kind,
            step,
            payload,
        };

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&event)
            .send()?;

        if !response.status().is_success() {
            return Err(RecognizerError::Tracking(format!(
                "{} rejected {:?} event with status {}",
                self.url,
                kind,
                response.status()
            )));
        }
        tracing::debug!("Sent {:?} event to {}", kind, self.url);
        Ok(())
    }
}

impl ExperimentTracker for HttpTracker {
    fn context(&self) -> Option<Context> {
        self.context
    }

    fn set_context(&mut self, context: Option<Context>) {
        self.context = context;
    }

    fn log_metrics(&mut self, metrics: &MetricMap, step: Option<usize>) -> Result<()> {
        let payload = serde_json::to_value(prefixed(self.context, metrics))?;
        self.send(EventKind::Metrics, step, payload)
    }

    fn log_parameters(&mut self, params: &ParamMap) -> Result<()> {
        self.send(EventKind::Parameters, None, serde_json::to_value(params)?)
    }

    fn log_dataset_hash(&mut self, bytes: &[u8]) -> Result<()> {
        self.send(
            EventKind::DatasetHash,
            None,
            json!({ "sha256": dataset_hash(bytes) }),
        )
    }

    fn end(&mut self) -> Result<()> {
        self.send(EventKind::End, None, json!({}))
    }
}
