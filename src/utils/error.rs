//! Error Handling Module
//!
//! Defines the error type shared by the dataset, model, training, tracking
//! and inference modules. Binaries wrap it in `anyhow` at the call sites.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for EMNIST recognizer operations
#[derive(Error, Debug)]
pub enum RecognizerError {
    /// Error loading, decoding or writing an image
    #[error("Failed to process image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error from the image crate without a path attached
    #[error("Image error: {0}")]
    Image(String),

    /// Malformed or missing dataset files
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Model construction, persistence or shape errors
    #[error("Model error: {0}")]
    Model(String),

    /// Error raised by the training loop
    #[error("Training error: {0}")]
    Training(String),

    /// Experiment tracker failures (local file or remote endpoint)
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A prediction did not match the expected fixture label
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for EMNIST recognizer operations
pub type Result<T> = std::result::Result<T, RecognizerError>;

impl From<serde_json::Error> for RecognizerError {
    fn from(err: serde_json::Error) -> Self {
        RecognizerError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for RecognizerError {
    fn from(err: image::ImageError) -> Self {
        RecognizerError::Image(err.to_string())
    }
}

impl From<reqwest::Error> for RecognizerError {
    fn from(err: reqwest::Error) -> Self {
        RecognizerError::Tracking(err.to_string())
    }
}
