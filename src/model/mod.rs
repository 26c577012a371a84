//! Model module: network architectures and the character model wrapper
//!
//! - `lenet`: convolutional network used by default
//! - `mlp`: fully connected baseline
//! - `network`: enum over the architectures, selected by name
//! - `character_model`: network + mapping, training entry points and persistence

pub mod character_model;
pub mod lenet;
pub mod mlp;
pub mod network;

pub use character_model::{CharacterModel, ModelCard};
pub use lenet::{Lenet, LenetConfig};
pub use mlp::{Mlp, MlpConfig};
pub use network::{Network, NetworkConfig};
