//! ConvNet - Shallow Convolutional Baseline and Its Ablations
//!
//! A stack of identical `conv3x3 -> norm -> activation -> pool` stages followed
//! by a single linear classifier. The classifier width is not known in closed
//! form, so it is measured with the shape probe once, at construction.
//!
//! The named ablations vary one knob of the standard network at a time:
//! depth, width, normalization, activation or pooling.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;

use archforge_core::{Device, Error, Result};
use archforge_nn::{Conv2d, Flatten, LayerInfo, Linear, Module, Parameter, Sequential};
use archforge_tensor::{Shape, Tensor};
use tracing::debug;

use super::common::{Activation, NormKind, Pooling};
use crate::probe;

// =============================================================================
// Configuration
// =============================================================================

/// Width of the first stage of the standard ConvNet.
pub const STEM_WIDTH: usize = 32;
/// Width of every later stage of the standard ConvNet.
pub const STAGE_WIDTH: usize = 64;

/// Stage recipe for a [`ConvNet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvNetConfig {
    /// Output width of each stage, in order.
    pub widths: Vec<usize>,
    /// Normalization after each convolution.
    pub norm: NormKind,
    /// Activation after each normalization.
    pub activation: Activation,
    /// Pooling at the end of each stage.
    pub pooling: Pooling,
}

impl ConvNetConfig {
    /// The standard two-stage network: 32 then 64 channels.
    pub fn standard() -> Self {
        Self::with_depth(2)
    }

    /// `depth` stages; the first is 32 wide, the rest 64.
    pub fn with_depth(depth: usize) -> Self {
        let widths = (0..depth)
            .map(|i| if i == 0 { STEM_WIDTH } else { STAGE_WIDTH })
            .collect();
        Self {
            widths,
            norm: NormKind::Batch,
            activation: Activation::Relu,
            pooling: Pooling::Max,
        }
    }

    /// Two stages of the same `width`.
    pub fn with_width(width: usize) -> Self {
        Self {
            widths: vec![width; 2],
            ..Self::standard()
        }
    }

    /// Replaces the normalization.
    pub fn norm(mut self, norm: NormKind) -> Self {
        self.norm = norm;
        self
    }

    /// Replaces the activation.
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Replaces the pooling.
    pub fn pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }
}

impl Default for ConvNetConfig {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// ConvNet
// =============================================================================

/// Shallow convolutional network with a probed classifier width.
pub struct ConvNet {
    features: Sequential,
    classifier: Linear,
    flattened_features: usize,
    config: ConvNetConfig,
}

impl ConvNet {
    /// Builds the network for `channels x H x W` inputs.
    pub fn new(
        config: ConvNetConfig,
        channels: usize,
        num_classes: usize,
        input_size: (usize, usize),
    ) -> Result<Self> {
        if config.widths.is_empty() {
            return Err(Error::invalid_config("ConvNet needs at least one stage"));
        }

        let mut features = Sequential::new();
        let mut in_channels = channels;
        for (i, &width) in config.widths.iter().enumerate() {
            let mut stage = Sequential::new()
                .add_named("conv", Conv2d::square(in_channels, width, 3, 1, 1, true))
                .add_named("norm", config.norm.build(width)?);
            stage.push_boxed(config.activation.build());
            if let Some(pool) = config.pooling.build() {
                stage.push_boxed(pool);
            }
            features.push_named(format!("layer{}", i + 1), stage);
            in_channels = width;
        }

        let flattened_features = probe::flattened_width(&features, channels, input_size)?;
        debug!(
            stages = config.widths.len(),
            flattened_features, "ConvNet trunk probed"
        );

        Ok(Self {
            features,
            classifier: Linear::new(flattened_features, num_classes),
            flattened_features,
            config,
        })
    }

    /// Classifier input width measured at construction.
    pub fn flattened_features(&self) -> usize {
        self.flattened_features
    }

    /// The stage recipe this network was built from.
    pub fn config(&self) -> &ConvNetConfig {
        &self.config
    }

    /// The convolutional trunk.
    pub fn features(&self) -> &Sequential {
        &self.features
    }
}

impl Module for ConvNet {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let x = self.features.forward(input)?;
        let x = Flatten.forward(&x)?;
        self.classifier.forward(&x)
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let x = self.features.output_shape(input)?;
        let x = Flatten.output_shape(&x)?;
        self.classifier.output_shape(&x)
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params = self.features.parameters();
        params.extend(self.classifier.parameters());
        params
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        for (name, p) in self.features.named_parameters() {
            params.insert(format!("features.{name}"), p);
        }
        for (name, p) in self.classifier.named_parameters() {
            params.insert(format!("classifier.{name}"), p);
        }
        params
    }

    fn set_training(&mut self, training: bool) {
        self.features.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.features.is_training()
    }

    fn to_device(&self, device: Device) {
        self.features.to_device(device);
        self.classifier.to_device(device);
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let x = self.features.summarize(input, path, out)?;
        let x = Flatten.output_shape(&x)?;
        self.classifier
            .summarize(&x, &archforge_nn::child_path(path, "classifier"), out)
    }

    fn name(&self) -> &'static str {
        "ConvNet"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_probe_width() {
        let net = ConvNet::new(ConvNetConfig::standard(), 3, 10, (32, 32)).unwrap();
        assert_eq!(net.flattened_features(), 64 * 8 * 8);
        assert_eq!(net.output_shape(&[2, 3, 32, 32]).unwrap().as_slice(), &[2, 10]);
    }

    #[test]
    fn test_probe_tracks_resolution() {
        let small = ConvNet::new(ConvNetConfig::standard(), 3, 10, (32, 32)).unwrap();
        let large = ConvNet::new(ConvNetConfig::standard(), 3, 10, (64, 64)).unwrap();
        assert_eq!(large.flattened_features(), 64 * 16 * 16);
        assert_ne!(small.flattened_features(), large.flattened_features());
    }

    #[test]
    fn test_probe_matches_dry_run() {
        let mut net = ConvNet::new(ConvNetConfig::standard(), 1, 10, (28, 28)).unwrap();
        net.eval();
        let measured = probe::dry_run(net.features(), 1, (28, 28)).unwrap();
        assert_eq!(measured, net.flattened_features());
        assert_eq!(measured, 64 * 7 * 7);
    }

    #[test]
    fn test_forward() {
        let net = ConvNet::new(ConvNetConfig::standard(), 3, 4, (8, 8)).unwrap();
        let out = net.forward(&Tensor::zeros(&[2, 3, 8, 8])).unwrap();
        assert_eq!(out.shape(), &[2, 4]);
    }

    #[test]
    fn test_depth_ablation_collapses() {
        assert!(ConvNet::new(ConvNetConfig::with_depth(5), 3, 10, (32, 32)).is_ok());
        let err = ConvNet::new(ConvNetConfig::with_depth(6), 3, 10, (32, 32))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidShape { .. }));
    }

    #[test]
    fn test_no_pooling_keeps_resolution() {
        let config = ConvNetConfig::standard().pooling(Pooling::None);
        let net = ConvNet::new(config, 3, 10, (16, 16)).unwrap();
        assert_eq!(net.flattened_features(), 64 * 16 * 16);
    }

    #[test]
    fn test_norm_ablation_changes_parameters() {
        let none = ConvNet::new(ConvNetConfig::standard().norm(NormKind::None), 3, 10, (32, 32))
            .unwrap();
        let batch = ConvNet::new(ConvNetConfig::standard(), 3, 10, (32, 32)).unwrap();
        assert_eq!(
            batch.num_parameters() - none.num_parameters(),
            2 * (32 + 64)
        );
    }

    #[test]
    fn test_width_ablation() {
        let net = ConvNet::new(ConvNetConfig::with_width(128), 3, 10, (32, 32)).unwrap();
        assert_eq!(net.flattened_features(), 128 * 8 * 8);
        assert_eq!(net.config().widths, vec![128, 128]);
    }

    #[test]
    fn test_empty_config_rejected() {
        let config = ConvNetConfig {
            widths: Vec::new(),
            ..ConvNetConfig::standard()
        };
        assert!(ConvNet::new(config, 3, 10, (32, 32)).is_err());
    }
}
