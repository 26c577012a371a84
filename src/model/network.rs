//! Network selection

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use super::lenet::{Lenet, LenetConfig};
use super::mlp::{Mlp, MlpConfig};
use crate::registry::NetworkKind;

/// Architecture hyperparameters, persisted next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub kind: NetworkKind,
    pub num_classes: usize,
    pub hidden_size: usize,
    pub dropout_rate: f64,
}

impl NetworkConfig {
    pub fn new(kind: NetworkKind, num_classes: usize) -> Self {
        Self {
            kind,
            num_classes,
            hidden_size: 128,
            dropout_rate: 0.2,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Network<B> {
        match self.kind {
            NetworkKind::Lenet => Network::Lenet(
                LenetConfig::new(self.num_classes)
                    .with_hidden_size(self.hidden_size)
                    .with_dropout_rate(self.dropout_rate)
                    .init(device),
            ),
            NetworkKind::Mlp => Network::Mlp(
                MlpConfig::new(self.num_classes)
                    .with_hidden_size(self.hidden_size)
                    .with_dropout_rate(self.dropout_rate)
                    .init(device),
            ),
        }
    }
}

/// One of the supported architectures
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    Lenet(Lenet<B>),
    Mlp(Mlp<B>),
}

impl<B: Backend> Network<B> {
    /// Logits of shape `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Network::Lenet(net) => net.forward(images),
            Network::Mlp(net) => net.forward(images),
        }
    }

    /// Class probabilities of shape `[batch_size, num_classes]`
    pub fn forward_softmax(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(images), 1)
    }
}
