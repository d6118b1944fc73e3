//! LeNet and MLP - Classic Small-Image Classifiers
//!
//! Both networks have fixed classifier widths. LeNet adapts its first
//! convolution to the input (padding for grayscale, stride for resolution) so
//! that the trunk still ends at 16 x 5 x 5.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::Result;
use archforge_nn::{Conv2d, Linear, MaxPool2d, Module, ReLU, Sequential};

use super::common::{check_classifier_input, is_low_resolution, TrunkAndHead};

/// Hidden width of both MLP hidden layers.
pub const MLP_HIDDEN: usize = 128;

/// Flattened trunk width the LeNet classifier expects.
pub const LENET_FEATURES: usize = 16 * 5 * 5;

// =============================================================================
// MLP
// =============================================================================

/// Three-layer perceptron over the flattened image.
///
/// Structure: flatten -> Linear(C*H*W, 128) -> ReLU -> Linear(128, 128) -> ReLU -> Linear(128, classes)
pub struct MLP {
    net: TrunkAndHead,
}

impl MLP {
    /// Builds an MLP for `channels x H x W` inputs.
    pub fn new(channels: usize, num_classes: usize, input_size: (usize, usize)) -> Self {
        let in_features = channels * input_size.0 * input_size.1;
        Self {
            net: TrunkAndHead {
                features: Sequential::new(),
                classifier: Sequential::new()
                    .add_named("fc1", Linear::new(in_features, MLP_HIDDEN))
                    .add_named("relu1", ReLU)
                    .add_named("fc2", Linear::new(MLP_HIDDEN, MLP_HIDDEN))
                    .add_named("relu2", ReLU)
                    .add_named("fc3", Linear::new(MLP_HIDDEN, num_classes)),
            },
        }
    }
}

super::common::impl_trunk_and_head_module!(MLP, "MLP");

// =============================================================================
// LeNet
// =============================================================================

/// LeNet-5 style network.
///
/// Structure: conv5x5(6) -> ReLU -> pool -> conv5x5(16) -> ReLU -> pool -> 400 -> 120 -> 84 -> classes
pub struct LeNet {
    net: TrunkAndHead,
}

impl LeNet {
    /// Builds a LeNet for `channels x H x W` inputs.
    ///
    /// Grayscale input gets padding 2 on the first convolution; inputs above
    /// 32 pixels get stride 2 there.
    pub fn new(channels: usize, num_classes: usize, input_size: (usize, usize)) -> Result<Self> {
        let padding = if channels == 1 { 2 } else { 0 };
        let stride = if is_low_resolution(input_size) { 1 } else { 2 };

        let features = Sequential::new()
            .add_named("conv1", Conv2d::square(channels, 6, 5, stride, padding, true))
            .add_named("relu1", ReLU)
            .add_named("pool1", MaxPool2d::new(2))
            .add_named("conv2", Conv2d::new(6, 16, 5))
            .add_named("relu2", ReLU)
            .add_named("pool2", MaxPool2d::new(2));

        let trunk = features.output_shape(&[1, channels, input_size.0, input_size.1])?;
        check_classifier_input(LENET_FEATURES, &trunk)?;

        Ok(Self {
            net: TrunkAndHead {
                features,
                classifier: Sequential::new()
                    .add_named("fc1", Linear::new(LENET_FEATURES, 120))
                    .add_named("relu3", ReLU)
                    .add_named("fc2", Linear::new(120, 84))
                    .add_named("relu4", ReLU)
                    .add_named("fc3", Linear::new(84, num_classes)),
            },
        })
    }
}

super::common::impl_trunk_and_head_module!(LeNet, "LeNet");

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archforge_core::Error;
    use archforge_tensor::Tensor;

    #[test]
    fn test_mlp_shapes() {
        let mlp = MLP::new(3, 10, (32, 32));
        assert_eq!(mlp.output_shape(&[4, 3, 32, 32]).unwrap().as_slice(), &[4, 10]);
        let expected = (3 * 32 * 32 * 128 + 128) + (128 * 128 + 128) + (128 * 10 + 10);
        assert_eq!(mlp.num_parameters(), expected);
    }

    #[test]
    fn test_mlp_forward() {
        let mlp = MLP::new(1, 10, (28, 28));
        let out = mlp.forward(&Tensor::zeros(&[2, 1, 28, 28])).unwrap();
        assert_eq!(out.shape(), &[2, 10]);
    }

    #[test]
    fn test_lenet_cifar() {
        let net = LeNet::new(3, 10, (32, 32)).unwrap();
        assert_eq!(net.output_shape(&[1, 3, 32, 32]).unwrap().as_slice(), &[1, 10]);
    }

    #[test]
    fn test_lenet_mnist_padding() {
        let net = LeNet::new(1, 10, (28, 28)).unwrap();
        let out = net.forward(&Tensor::zeros(&[1, 1, 28, 28])).unwrap();
        assert_eq!(out.shape(), &[1, 10]);
    }

    #[test]
    fn test_lenet_high_resolution_stride() {
        assert!(LeNet::new(3, 200, (64, 64)).is_ok());
    }

    #[test]
    fn test_lenet_rejects_mismatched_trunk() {
        let err = LeNet::new(3, 10, (48, 48)).err().unwrap();
        assert!(matches!(err, Error::ShapeMismatch { ref context, .. } if context == "classifier input"));
    }

    #[test]
    fn test_lenet_summary_paths() {
        let net = LeNet::new(3, 10, (32, 32)).unwrap();
        let mut rows = Vec::new();
        net.summarize(&[1, 3, 32, 32], "", &mut rows).unwrap();
        assert_eq!(rows.first().unwrap().path, "features.conv1");
        assert_eq!(rows.last().unwrap().path, "classifier.fc3");
        assert_eq!(rows.last().unwrap().output_shape, vec![1, 10]);
    }
}
