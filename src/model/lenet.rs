//! LeNet-style convolutional network for 28x28 glyphs

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the LeNet network
#[derive(Config, Debug)]
pub struct LenetConfig {
    /// Number of output classes
    pub num_classes: usize,

    #[config(default = "0.2")]
    pub dropout_rate: f64,

    #[config(default = "128")]
    pub hidden_size: usize,
}

/// Conv(1->32) -> Conv(32->64) -> MaxPool -> Dense(128) -> Dense(classes)
#[derive(Module, Debug)]
pub struct Lenet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

/// Flattened feature count after two valid 3x3 convolutions and a 2x2 pool
const FLAT_FEATURES: usize = 64 * 12 * 12;

impl LenetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Lenet<B> {
        Lenet {
            conv1: Conv2dConfig::new([1, 32], [3, 3]).init(device),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            fc1: LinearConfig::new(FLAT_FEATURES, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> Lenet<B> {
    /// # Shapes
    /// - images: `[batch_size, 1, 28, 28]`
    /// - output: `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.conv1.forward(images)); // [B, 32, 26, 26]
        let x = self.relu.forward(self.conv2.forward(x)); // [B, 64, 24, 24]
        let x = self.pool.forward(x); // [B, 64, 12, 12]
        let x = self.dropout.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    #[test]
    fn test_lenet_output_shape() {
        let device = Default::default();
        let model: Lenet<DefaultBackend> = LenetConfig::new(62).init(&device);

        let images = Tensor::<DefaultBackend, 4>::zeros([2, 1, 28, 28], &device);
        assert_eq!(model.forward(images).dims(), [2, 62]);
    }
}
