//! Fully connected baseline network

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor},
};

use crate::dataset::IMAGE_PIXELS;

#[derive(Config, Debug)]
pub struct MlpConfig {
    pub num_classes: usize,

    #[config(default = "128")]
    pub hidden_size: usize,

    #[config(default = "3")]
    pub num_layers: usize,

    #[config(default = "0.2")]
    pub dropout_rate: f64,
}

/// Flatten -> N x [Dense, ReLU, Dropout] -> Dense(classes)
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    dropout: Dropout,
    relu: Relu,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let hidden = (0..self.num_layers)
            .map(|i| {
                let input = if i == 0 { IMAGE_PIXELS } else { self.hidden_size };
                LinearConfig::new(input, self.hidden_size).init(device)
            })
            .collect();
        let last = if self.num_layers == 0 {
            IMAGE_PIXELS
        } else {
            self.hidden_size
        };

        Mlp {
            hidden,
            output: LinearConfig::new(last, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Mlp<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, height, width] = images.dims();
        let mut x = images.reshape([batch_size, channels * height * width]);

        for layer in &self.hidden {
            x = self.dropout.forward(self.relu.forward(layer.forward(x)));
        }
        self.output.forward(x)
    }
}
