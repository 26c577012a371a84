//! Name -> component lookup for datasets, models and networks
//!
//! The training driver receives plain strings on the command line; this is
//! the single place that turns them into typed choices.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::{RecognizerError, Result};

fn unknown(kind: &str, name: &str, valid: &[&str]) -> RecognizerError {
    RecognizerError::Config(format!(
        "Unknown {kind} '{name}', expected one of: {}",
        valid.join(", ")
    ))
}

/// Datasets available to the training driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    #[serde(rename = "EMNIST")]
    Emnist,
}

impl DatasetKind {
    pub const NAMES: &'static [&'static str] = &["EMNIST"];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Emnist => "EMNIST",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = RecognizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EMNIST" => Ok(DatasetKind::Emnist),
            other => Err(unknown("dataset", other, Self::NAMES)),
        }
    }
}

/// Model wrappers available to the training driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "Character_Model")]
    CharacterModel,
}

impl ModelKind {
    pub const NAMES: &'static [&'static str] = &["Character_Model"];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::CharacterModel => "Character_Model",
        }
    }
}

impl FromStr for ModelKind {
    type Err = RecognizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Character_Model" => Ok(ModelKind::CharacterModel),
            other => Err(unknown("model", other, Self::NAMES)),
        }
    }
}

/// Network architectures available to the training driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Lenet,
    Mlp,
}

impl NetworkKind {
    pub const NAMES: &'static [&'static str] = &["lenet", "mlp"];

    pub fn name(&self) -> &'static str {
        match self {
            NetworkKind::Lenet => "lenet",
            NetworkKind::Mlp => "mlp",
        }
    }
}

impl FromStr for NetworkKind {
    type Err = RecognizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lenet" => Ok(NetworkKind::Lenet),
            "mlp" => Ok(NetworkKind::Mlp),
            other => Err(unknown("network", other, Self::NAMES)),
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        })*
    };
}

display_by_name!(DatasetKind, ModelKind, NetworkKind);

/// The resolved `(dataset, model, network)` triple of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    pub dataset: DatasetKind,
    pub model: ModelKind,
    pub network: NetworkKind,
}

impl RunSpec {
    pub fn resolve(dataset: &str, model: &str, network: &str) -> Result<Self> {
        Ok(Self {
            dataset: dataset.parse()?,
            model: model.parse()?,
            network: network.parse()?,
        })
    }

    /// File stem shared by the weights and config files
    pub fn artifact_stem(&self) -> String {
        format!("{}_{}_{}", self.model, self.dataset, self.network)
    }
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            dataset: DatasetKind::Emnist,
            model: ModelKind::CharacterModel,
            network: NetworkKind::Lenet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let spec = RunSpec::resolve("EMNIST", "Character_Model", "lenet").unwrap();
        assert_eq!(spec, RunSpec::default());
        assert_eq!(spec.artifact_stem(), "Character_Model_EMNIST_lenet");
    }

    #[test]
    fn test_unknown_name_lists_options() {
        let err = RunSpec::resolve("EMNIST", "Character_Model", "resnet").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("resnet"));
        assert!(msg.contains("lenet, mlp"));
        assert!(matches!(err, RecognizerError::Config(_)));
    }

    #[test]
    fn test_names_round_trip_through_serde() {
        let json = serde_json::to_string(&RunSpec::default()).unwrap();
        assert!(json.contains("\"Character_Model\""));
        let back: RunSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RunSpec::default());
    }
}
