use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Number of rotation classes (0°, 90°, 180°, 270°).
pub const NUM_CLASSES: usize = 4;

/// Input images are single-channel grayscale.
pub const CHANNELS: usize = 1;

/// Input images are assumed pre-sized to 32x32; no resizing is performed.
pub const IMAGE_SIZE: usize = 32;

/// Classifies the rotation angle of a scanned text tile.
///
/// The topology is fixed and must be reproduced exactly on the loading side
/// for weight compatibility:
///
/// 1. Conv 1→32, 3x3, padding 1 → batch norm → ReLU → 2x2 max pool.
/// 2. Conv 32→64, 3x3, padding 1, 4 groups → batch norm → ReLU → 2x2 max pool.
/// 3. Global average pool to a 64-element vector.
/// 4. Linear 64→4 producing raw logits.
///
/// Batch norm uses per-batch statistics and updates its running estimates on
/// an autodiff backend; on the inner backend (after [`valid`](burn::module::AutodiffModule::valid))
/// it switches to the accumulated running statistics.
#[derive(Module, Debug)]
pub struct TextAngleClassifier<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    pool: MaxPool2d,
    global_pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    activation: Relu,
}

impl<B: Backend> TextAngleClassifier<B> {
    /// Builds the classifier with randomly initialized parameters on `device`.
    pub fn new(device: &B::Device) -> Self {
        Self {
            conv1: Conv2dConfig::new([CHANNELS, 32], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            bn1: BatchNormConfig::new(32).init(device),
            // Grouped convolution: each of the 4 groups convolves 8 input
            // channels to 16 output channels.
            conv2: Conv2dConfig::new([32, 64], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(4)
                .init(device),
            bn2: BatchNormConfig::new(64).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(64, NUM_CLASSES).init(device),
            activation: Relu::new(),
        }
    }

    /// Maps a batch of images `[batch_size, 1, 32, 32]` to raw class logits
    /// `[batch_size, 4]`.
    ///
    /// The output is unnormalized; the caller applies cross-entropy (training)
    /// or arg-max (inference) downstream.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images); // [N, 32, 32, 32]
        let x = self.bn1.forward(x);
        let x = self.pool.forward(self.activation.forward(x)); // [N, 32, 16, 16]

        let x = self.conv2.forward(x); // [N, 64, 16, 16]
        let x = self.bn2.forward(x);
        let x = self.pool.forward(self.activation.forward(x)); // [N, 64, 8, 8]

        let x = self.global_pool.forward(x); // [N, 64, 1, 1]
        let x = x.flatten::<2>(1, 3); // [N, 64]

        self.fc.forward(x) // [N, 4]
    }
}
