//! AlexNet - Five-Convolution Classifier for Small Images
//!
//! A narrowed AlexNet for 28-64 pixel inputs. The first convolution widens
//! its padding for grayscale input and doubles its stride above 32 pixels so
//! the trunk always ends at 192 x 4 x 4.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::Result;
use archforge_nn::{Conv2d, Linear, MaxPool2d, Module, ReLU, Sequential};

use super::common::{check_classifier_input, is_low_resolution, TrunkAndHead};

/// Flattened trunk width the AlexNet classifier expects.
pub const ALEXNET_FEATURES: usize = 192 * 4 * 4;

/// AlexNet-style network.
///
/// Structure: conv5x5(128) -> pool -> conv5x5(192) -> pool -> conv3x3(256)
/// -> conv3x3(192) -> conv3x3(192) -> pool -> Linear(3072, classes)
pub struct AlexNet {
    net: TrunkAndHead,
}

impl AlexNet {
    /// Builds an AlexNet for `channels x H x W` inputs.
    pub fn new(channels: usize, num_classes: usize, input_size: (usize, usize)) -> Result<Self> {
        let padding = if channels == 1 { 4 } else { 2 };
        let stride = if is_low_resolution(input_size) { 1 } else { 2 };

        let features = Sequential::new()
            .add_named("conv1", Conv2d::square(channels, 128, 5, stride, padding, true))
            .add_named("relu1", ReLU)
            .add_named("pool1", MaxPool2d::new(2))
            .add_named("conv2", Conv2d::square(128, 192, 5, 1, 2, true))
            .add_named("relu2", ReLU)
            .add_named("pool2", MaxPool2d::new(2))
            .add_named("conv3", Conv2d::square(192, 256, 3, 1, 1, true))
            .add_named("relu3", ReLU)
            .add_named("conv4", Conv2d::square(256, 192, 3, 1, 1, true))
            .add_named("relu4", ReLU)
            .add_named("conv5", Conv2d::square(192, 192, 3, 1, 1, true))
            .add_named("relu5", ReLU)
            .add_named("pool3", MaxPool2d::new(2));

        let trunk = features.output_shape(&[1, channels, input_size.0, input_size.1])?;
        check_classifier_input(ALEXNET_FEATURES, &trunk)?;

        Ok(Self {
            net: TrunkAndHead {
                features,
                classifier: Sequential::new().add_named("fc", Linear::new(ALEXNET_FEATURES, num_classes)),
            },
        })
    }
}

super::common::impl_trunk_and_head_module!(AlexNet, "AlexNet");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alexnet_cifar() {
        let net = AlexNet::new(3, 10, (32, 32)).unwrap();
        assert_eq!(net.output_shape(&[2, 3, 32, 32]).unwrap().as_slice(), &[2, 10]);
    }

    #[test]
    fn test_alexnet_grayscale_padding() {
        // 28 + 2*4 - 5 + 1 = 32, so MNIST lands on the CIFAR trunk
        let net = AlexNet::new(1, 10, (28, 28)).unwrap();
        let mut rows = Vec::new();
        net.summarize(&[1, 1, 28, 28], "", &mut rows).unwrap();
        assert_eq!(rows[0].output_shape, vec![1, 128, 32, 32]);
    }

    #[test]
    fn test_alexnet_high_resolution() {
        assert!(AlexNet::new(3, 200, (64, 64)).is_ok());
    }

    #[test]
    fn test_alexnet_parameter_count() {
        let net = AlexNet::new(3, 10, (32, 32)).unwrap();
        let convs = (3 * 128 * 25 + 128)
            + (128 * 192 * 25 + 192)
            + (192 * 256 * 9 + 256)
            + (256 * 192 * 9 + 192)
            + (192 * 192 * 9 + 192);
        assert_eq!(net.num_parameters(), convs + ALEXNET_FEATURES * 10 + 10);
    }
}
