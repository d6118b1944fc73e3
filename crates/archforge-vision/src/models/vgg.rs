//! VGG - Very Deep Convolutional Networks
//!
//! Implementation of VGG architectures for 32x32 (and, with the `_Tiny`
//! variant, 64x64) image classification.
//!
//! # Supported Variants
//!
//! - VGG11, VGG13, VGG16, VGG19
//! - VGGS: a narrow 128-channel variant
//!
//! Every variant can use any [`NormKind`]; instance normalization is the
//! default and batch normalization is selected with the `BN` suffix.
//!
//! # Reference
//!
//! "Very Deep Convolutional Networks for Large-Scale Image Recognition"
//! (Simonyan & Zisserman, 2014)
//! <https://arxiv.org/abs/1409.1556>
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::fmt;

use archforge_core::Result;
use archforge_nn::{AvgPool2d, Conv2d, Linear, MaxPool2d, Module, ReLU, Sequential};
use tracing::debug;

use super::common::{check_classifier_input, NormKind, TrunkAndHead};

// =============================================================================
// VGG Configuration
// =============================================================================

/// VGG layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VggLayer {
    /// Convolutional stage with output channels.
    Conv(usize),
    /// Max pooling layer.
    MaxPool,
}

/// Get VGG11 configuration.
#[must_use]
pub fn vgg11_config() -> Vec<VggLayer> {
    use VggLayer::{Conv, MaxPool};
    vec![
        Conv(64), MaxPool,
        Conv(128), MaxPool,
        Conv(256), Conv(256), MaxPool,
        Conv(512), Conv(512), MaxPool,
        Conv(512), Conv(512), MaxPool,
    ]
}

/// Get VGG13 configuration.
#[must_use]
pub fn vgg13_config() -> Vec<VggLayer> {
    use VggLayer::{Conv, MaxPool};
    vec![
        Conv(64), Conv(64), MaxPool,
        Conv(128), Conv(128), MaxPool,
        Conv(256), Conv(256), MaxPool,
        Conv(512), Conv(512), MaxPool,
        Conv(512), Conv(512), MaxPool,
    ]
}

/// Get VGG16 configuration.
#[must_use]
pub fn vgg16_config() -> Vec<VggLayer> {
    use VggLayer::{Conv, MaxPool};
    vec![
        Conv(64), Conv(64), MaxPool,
        Conv(128), Conv(128), MaxPool,
        Conv(256), Conv(256), Conv(256), MaxPool,
        Conv(512), Conv(512), Conv(512), MaxPool,
        Conv(512), Conv(512), Conv(512), MaxPool,
    ]
}

/// Get VGG19 configuration.
#[must_use]
pub fn vgg19_config() -> Vec<VggLayer> {
    use VggLayer::{Conv, MaxPool};
    vec![
        Conv(64), Conv(64), MaxPool,
        Conv(128), Conv(128), MaxPool,
        Conv(256), Conv(256), Conv(256), Conv(256), MaxPool,
        Conv(512), Conv(512), Conv(512), Conv(512), MaxPool,
        Conv(512), Conv(512), Conv(512), Conv(512), MaxPool,
    ]
}

/// Get the narrow VGGS configuration.
#[must_use]
pub fn vggs_config() -> Vec<VggLayer> {
    use VggLayer::{Conv, MaxPool};
    vec![
        Conv(32), MaxPool,
        Conv(64), MaxPool,
        Conv(128), Conv(128), MaxPool,
        Conv(128), Conv(128), MaxPool,
        Conv(128), Conv(128), MaxPool,
    ]
}

/// Named VGG depth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VggVariant {
    /// 8 convolutions.
    Vgg11,
    /// 10 convolutions.
    Vgg13,
    /// 13 convolutions.
    Vgg16,
    /// 16 convolutions.
    Vgg19,
    /// 8 narrow convolutions.
    Small,
}

impl VggVariant {
    /// Layer table for this variant.
    pub fn layers(self) -> Vec<VggLayer> {
        match self {
            Self::Vgg11 => vgg11_config(),
            Self::Vgg13 => vgg13_config(),
            Self::Vgg16 => vgg16_config(),
            Self::Vgg19 => vgg19_config(),
            Self::Small => vggs_config(),
        }
    }

    /// Classifier input width.
    pub fn classifier_width(self) -> usize {
        match self {
            Self::Small => 128,
            _ => 512,
        }
    }

    /// Identifier suffix after `VGG`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Vgg11 => "11",
            Self::Vgg13 => "13",
            Self::Vgg16 => "16",
            Self::Vgg19 => "19",
            Self::Small => "S",
        }
    }
}

impl fmt::Display for VggVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VGG{}", self.suffix())
    }
}

/// Full VGG recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VggConfig {
    /// Depth table.
    pub variant: VggVariant,
    /// Normalization after each convolution.
    pub norm: NormKind,
    /// Halve the resolution once more at the end (64x64 inputs).
    pub tiny: bool,
}

// =============================================================================
// Feature Builder
// =============================================================================

/// Padding of the first convolution for single-channel input.
pub const GRAYSCALE_FIRST_PADDING: usize = 3;

/// VGG feature trunk produced by [`make_features`].
pub struct VggFeatures {
    /// The assembled layers.
    pub layers: Sequential,
    /// Padding of each convolution, in order.
    pub conv_paddings: Vec<usize>,
    /// Width of the last convolution.
    pub out_channels: usize,
}

/// Expands a layer table into a trunk.
///
/// Each `Conv(w)` emits `conv3x3 -> norm -> ReLU` from the running width to
/// `w`; each `MaxPool` emits a 2x2 max pool. The very first convolution uses
/// wider padding when the input is single-channel. The trunk ends with a 1x1
/// average pool of the given stride.
pub fn make_features(
    cfg: &[VggLayer],
    in_channels: usize,
    norm: NormKind,
    final_pool_stride: usize,
) -> Result<VggFeatures> {
    let mut layers = Sequential::new();
    let mut conv_paddings = Vec::new();
    let mut width = in_channels;

    for layer in cfg {
        match *layer {
            VggLayer::MaxPool => layers.push(MaxPool2d::new(2)),
            VggLayer::Conv(out) => {
                let padding = if in_channels == 1 && conv_paddings.is_empty() {
                    GRAYSCALE_FIRST_PADDING
                } else {
                    1
                };
                layers.push(Conv2d::square(width, out, 3, 1, padding, true));
                layers.push(norm.build(out)?);
                layers.push(ReLU);
                conv_paddings.push(padding);
                width = out;
            }
        }
    }
    layers.push(AvgPool2d::with_options(1, final_pool_stride, 0));

    Ok(VggFeatures {
        layers,
        conv_paddings,
        out_channels: width,
    })
}

// =============================================================================
// VGG
// =============================================================================

/// VGG network: configurable trunk plus a single linear classifier.
pub struct VGG {
    net: TrunkAndHead,
    config: VggConfig,
    conv_paddings: Vec<usize>,
}

impl VGG {
    /// Builds a VGG for `channels x H x W` inputs.
    pub fn new(
        config: VggConfig,
        channels: usize,
        num_classes: usize,
        input_size: (usize, usize),
    ) -> Result<Self> {
        let final_stride = if config.tiny { 2 } else { 1 };
        let features = make_features(&config.variant.layers(), channels, config.norm, final_stride)?;

        let width = config.variant.classifier_width();
        let trunk = features
            .layers
            .output_shape(&[1, channels, input_size.0, input_size.1])?;
        check_classifier_input(width, &trunk)?;
        debug!(
            variant = %config.variant,
            convs = features.conv_paddings.len(),
            norm = %config.norm,
            "VGG trunk assembled"
        );

        Ok(Self {
            net: TrunkAndHead {
                features: features.layers,
                classifier: Sequential::new().add_named("fc", Linear::new(width, num_classes)),
            },
            config,
            conv_paddings: features.conv_paddings,
        })
    }

    /// The recipe this network was built from.
    pub fn config(&self) -> VggConfig {
        self.config
    }

    /// Padding of each convolution, in order.
    pub fn conv_paddings(&self) -> &[usize] {
        &self.conv_paddings
    }
}

super::common::impl_trunk_and_head_module!(VGG, "VGG");

// =============================================================================
// Convenience constructors
// =============================================================================

fn standard(variant: VggVariant, channels: usize, num_classes: usize) -> Result<VGG> {
    let config = VggConfig {
        variant,
        norm: NormKind::Instance,
        tiny: false,
    };
    VGG::new(config, channels, num_classes, (32, 32))
}

/// VGG11 for 32x32 inputs.
pub fn vgg11(channels: usize, num_classes: usize) -> Result<VGG> {
    standard(VggVariant::Vgg11, channels, num_classes)
}

/// VGG13 for 32x32 inputs.
pub fn vgg13(channels: usize, num_classes: usize) -> Result<VGG> {
    standard(VggVariant::Vgg13, channels, num_classes)
}

/// VGG16 for 32x32 inputs.
pub fn vgg16(channels: usize, num_classes: usize) -> Result<VGG> {
    standard(VggVariant::Vgg16, channels, num_classes)
}

/// VGG19 for 32x32 inputs.
pub fn vgg19(channels: usize, num_classes: usize) -> Result<VGG> {
    standard(VggVariant::Vgg19, channels, num_classes)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archforge_core::Error;

    fn count_convs(cfg: &[VggLayer]) -> usize {
        cfg.iter().filter(|l| matches!(l, VggLayer::Conv(_))).count()
    }

    #[test]
    fn test_config_depths() {
        assert_eq!(count_convs(&vgg11_config()), 8);
        assert_eq!(count_convs(&vgg13_config()), 10);
        assert_eq!(count_convs(&vgg16_config()), 13);
        assert_eq!(count_convs(&vgg19_config()), 16);
        assert_eq!(count_convs(&vggs_config()), 8);
    }

    #[test]
    fn test_make_features_running_width() {
        let features = make_features(&vgg11_config(), 3, NormKind::None, 1).unwrap();
        assert_eq!(features.out_channels, 512);
        // 8 x (conv, norm, relu) + 5 pools + final avg pool
        assert_eq!(features.layers.len(), 8 * 3 + 5 + 1);
    }

    #[test]
    fn test_grayscale_widens_first_padding_only() {
        let rgb = make_features(&vgg11_config(), 3, NormKind::Instance, 1).unwrap();
        let gray = make_features(&vgg11_config(), 1, NormKind::Instance, 1).unwrap();
        assert_eq!(rgb.conv_paddings[0], 1);
        assert_eq!(gray.conv_paddings[0], GRAYSCALE_FIRST_PADDING);
        assert_eq!(rgb.conv_paddings[1..], gray.conv_paddings[1..]);
        assert_eq!(rgb.out_channels, gray.out_channels);
    }

    #[test]
    fn test_vgg11_cifar() {
        let net = vgg11(3, 10).unwrap();
        assert_eq!(net.output_shape(&[1, 3, 32, 32]).unwrap().as_slice(), &[1, 10]);
        assert_eq!(net.config().variant, VggVariant::Vgg11);
    }

    #[test]
    fn test_vggs_classifier_width() {
        let config = VggConfig {
            variant: VggVariant::Small,
            norm: NormKind::Batch,
            tiny: false,
        };
        let net = VGG::new(config, 3, 10, (32, 32)).unwrap();
        assert_eq!(net.output_shape(&[1, 3, 32, 32]).unwrap().as_slice(), &[1, 10]);
    }

    #[test]
    fn test_tiny_variant_resolution() {
        let plain = VggConfig {
            variant: VggVariant::Vgg11,
            norm: NormKind::Instance,
            tiny: false,
        };
        let err = VGG::new(plain, 3, 200, (64, 64)).err().unwrap();
        assert!(matches!(err, Error::ShapeMismatch { .. }));

        let tiny = VggConfig { tiny: true, ..plain };
        assert!(VGG::new(tiny, 3, 200, (64, 64)).is_ok());
    }

    #[test]
    fn test_batchnorm_and_instance_norm_share_parameter_count() {
        let inst = vgg11(3, 10).unwrap();
        let bn = VGG::new(
            VggConfig {
                variant: VggVariant::Vgg11,
                norm: NormKind::Batch,
                tiny: false,
            },
            3,
            10,
            (32, 32),
        )
        .unwrap();
        assert_eq!(inst.num_parameters(), bn.num_parameters());
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(VggVariant::Vgg16.to_string(), "VGG16");
        assert_eq!(VggVariant::Small.to_string(), "VGGS");
    }
}
