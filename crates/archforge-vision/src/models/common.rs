//! Shared Building Blocks - Normalization, Activation and Pooling Choices
//!
//! The architecture families differ mostly in which normalization, activation
//! and pooling they slot between convolutions. These small enums name those
//! choices and turn them into concrete modules.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use archforge_core::{Device, Error, Result};
use archforge_nn::{
    child_path, AvgPool2d, BatchNorm2d, Flatten, GroupNorm, LayerInfo, LeakyReLU, MaxPool2d,
    Module, Parameter, ReLU, Sequential, Sigmoid,
};
use archforge_tensor::{Shape, Tensor};
use serde::{Deserialize, Serialize};

// =============================================================================
// NormKind
// =============================================================================

/// Normalization applied after each convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormKind {
    /// No normalization.
    None,
    /// Batch normalization with running statistics.
    Batch,
    /// Per-channel instance normalization, GroupNorm(C, C).
    Instance,
    /// Layer normalization over (C, H, W), GroupNorm(1, C).
    Layer,
    /// Group normalization with four groups where the width allows it.
    Group,
}

impl NormKind {
    /// Preferred group count for [`NormKind::Group`].
    pub const GROUPS: usize = 4;

    /// Builds the normalization layer for `channels` feature maps.
    pub fn build(self, channels: usize) -> Result<Norm2d> {
        Ok(match self {
            Self::None => Norm2d::Identity,
            Self::Batch => Norm2d::Batch(BatchNorm2d::new(channels)),
            Self::Instance => Norm2d::Group(GroupNorm::new(channels, channels)?),
            Self::Layer => Norm2d::Group(GroupNorm::new(1, channels)?),
            Self::Group => Norm2d::Group(GroupNorm::new(gcd(Self::GROUPS, channels), channels)?),
        })
    }

    /// Short lowercase name used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Batch => "batch",
            Self::Instance => "instance",
            Self::Layer => "layer",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for NormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "batch" | "batchnorm" => Ok(Self::Batch),
            "instance" | "instancenorm" => Ok(Self::Instance),
            "layer" | "layernorm" => Ok(Self::Layer),
            "group" | "groupnorm" => Ok(Self::Group),
            other => Err(Error::invalid_config(format!(
                "unknown normalization '{other}'"
            ))),
        }
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

// =============================================================================
// Norm2d
// =============================================================================

/// A built normalization layer, or nothing.
pub enum Norm2d {
    /// Pass-through; contributes no layer to summaries.
    Identity,
    /// Batch normalization.
    Batch(BatchNorm2d),
    /// Group normalization (covers the instance and layer kinds).
    Group(GroupNorm),
}

impl Norm2d {
    fn inner(&self) -> Option<&dyn Module> {
        match self {
            Self::Identity => None,
            Self::Batch(bn) => Some(bn),
            Self::Group(gn) => Some(gn),
        }
    }
}

impl Module for Norm2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match self.inner() {
            Some(norm) => norm.forward(input),
            None => Ok(input.clone()),
        }
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        match self.inner() {
            Some(norm) => norm.output_shape(input),
            None => Ok(Shape::from_slice(input)),
        }
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.inner().map(|norm| norm.parameters()).unwrap_or_default()
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        self.inner().map(|norm| norm.named_parameters()).unwrap_or_default()
    }

    fn set_training(&mut self, training: bool) {
        if let Self::Batch(bn) = self {
            bn.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.inner().map_or(true, |norm| norm.is_training())
    }

    fn to_device(&self, device: Device) {
        if let Some(norm) = self.inner() {
            norm.to_device(device);
        }
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        match self.inner() {
            Some(norm) => norm.summarize(input, path, out),
            None => Ok(Shape::from_slice(input)),
        }
    }

    fn name(&self) -> &'static str {
        self.inner().map_or("Identity", |norm| norm.name())
    }
}

// =============================================================================
// Activation / Pooling
// =============================================================================

/// Non-linearity placed after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Rectified linear unit.
    Relu,
    /// Logistic sigmoid.
    Sigmoid,
    /// Leaky ReLU with slope 0.01.
    LeakyRelu,
}

impl Activation {
    /// Builds the activation module.
    pub fn build(self) -> Box<dyn Module> {
        match self {
            Self::Relu => Box::new(ReLU),
            Self::Sigmoid => Box::new(Sigmoid),
            Self::LeakyRelu => Box::new(LeakyReLU::new()),
        }
    }
}

/// Spatial reduction placed at the end of a ConvNet stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Keep the resolution.
    None,
    /// 2x2 max pooling, stride 2.
    Max,
    /// 2x2 average pooling, stride 2.
    Avg,
}

impl Pooling {
    /// Builds the pooling module, or `None` when the stage keeps its resolution.
    pub fn build(self) -> Option<Box<dyn Module>> {
        match self {
            Self::None => None,
            Self::Max => Some(Box::new(MaxPool2d::new(2))),
            Self::Avg => Some(Box::new(AvgPool2d::new(2))),
        }
    }
}

/// Height at or below which an input counts as low resolution.
pub const LOW_RESOLUTION: usize = 32;

/// Returns true for CIFAR/MNIST-sized inputs.
pub fn is_low_resolution(input_size: (usize, usize)) -> bool {
    input_size.0 <= LOW_RESOLUTION
}

/// Verifies that a closed-form classifier width agrees with the trunk.
pub(crate) fn check_classifier_input(expected: usize, trunk_output: &[usize]) -> Result<()> {
    let actual: usize = trunk_output.iter().skip(1).product();
    if actual != expected {
        return Err(Error::shape_mismatch(
            "classifier input",
            &[trunk_output.first().copied().unwrap_or(1), expected],
            &[trunk_output.first().copied().unwrap_or(1), actual],
        ));
    }
    Ok(())
}

// =============================================================================
// Trunk + Head
// =============================================================================

/// Feature trunk followed by a flatten and a dense head.
pub(crate) struct TrunkAndHead {
    pub(crate) features: Sequential,
    pub(crate) classifier: Sequential,
}

impl TrunkAndHead {
    pub(crate) fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let x = self.features.forward(input)?;
        self.classifier.forward(&Flatten.forward(&x)?)
    }

    pub(crate) fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let x = self.features.output_shape(input)?;
        self.classifier.output_shape(&Flatten.output_shape(&x)?)
    }

    pub(crate) fn parameters(&self) -> Vec<Parameter> {
        let mut params = self.features.parameters();
        params.extend(self.classifier.parameters());
        params
    }

    pub(crate) fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        for (name, p) in self.features.named_parameters() {
            params.insert(format!("features.{name}"), p);
        }
        for (name, p) in self.classifier.named_parameters() {
            params.insert(format!("classifier.{name}"), p);
        }
        params
    }

    pub(crate) fn set_training(&mut self, training: bool) {
        self.features.set_training(training);
        self.classifier.set_training(training);
    }

    pub(crate) fn is_training(&self) -> bool {
        self.features.is_training()
    }

    pub(crate) fn to_device(&self, device: Device) {
        self.features.to_device(device);
        self.classifier.to_device(device);
    }

    pub(crate) fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let x = self
            .features
            .summarize(input, &child_path(path, "features"), out)?;
        let x = Flatten.output_shape(&x)?;
        self.classifier
            .summarize(&x, &child_path(path, "classifier"), out)
    }
}

/// Implements [`Module`] for a wrapper whose `net` field is a [`TrunkAndHead`].
macro_rules! impl_trunk_and_head_module {
    ($ty:ty, $name:literal) => {
        impl ::archforge_nn::Module for $ty {
            fn forward(
                &self,
                input: &::archforge_tensor::Tensor,
            ) -> ::archforge_core::Result<::archforge_tensor::Tensor> {
                self.net.forward(input)
            }

            fn output_shape(
                &self,
                input: &[usize],
            ) -> ::archforge_core::Result<::archforge_tensor::Shape> {
                self.net.output_shape(input)
            }

            fn parameters(&self) -> Vec<::archforge_nn::Parameter> {
                self.net.parameters()
            }

            fn named_parameters(
                &self,
            ) -> ::std::collections::HashMap<String, ::archforge_nn::Parameter> {
                self.net.named_parameters()
            }

            fn set_training(&mut self, training: bool) {
                self.net.set_training(training);
            }

            fn is_training(&self) -> bool {
                self.net.is_training()
            }

            fn to_device(&self, device: ::archforge_core::Device) {
                self.net.to_device(device);
            }

            fn summarize(
                &self,
                input: &[usize],
                path: &str,
                out: &mut Vec<::archforge_nn::LayerInfo>,
            ) -> ::archforge_core::Result<::archforge_tensor::Shape> {
                self.net.summarize(input, path, out)
            }

            fn name(&self) -> &'static str {
                $name
            }
        }
    };
}

pub(crate) use impl_trunk_and_head_module;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_kind_parameter_counts() {
        assert_eq!(NormKind::None.build(64).unwrap().num_parameters(), 0);
        assert_eq!(NormKind::Batch.build(64).unwrap().num_parameters(), 128);
        assert_eq!(NormKind::Instance.build(64).unwrap().num_parameters(), 128);
    }

    #[test]
    fn test_group_norm_falls_back_on_odd_widths() {
        match NormKind::Group.build(6).unwrap() {
            Norm2d::Group(gn) => assert_eq!(gn.num_groups(), 2),
            _ => panic!("expected a GroupNorm"),
        }
        match NormKind::Layer.build(6).unwrap() {
            Norm2d::Group(gn) => assert_eq!(gn.num_groups(), 1),
            _ => panic!("expected a GroupNorm"),
        }
    }

    #[test]
    fn test_identity_norm_is_invisible_in_summaries() {
        let mut rows = Vec::new();
        let shape = Norm2d::Identity.summarize(&[1, 8, 4, 4], "bn1", &mut rows).unwrap();
        assert!(rows.is_empty());
        assert_eq!(shape.as_slice(), &[1, 8, 4, 4]);
    }

    #[test]
    fn test_norm_kind_parse() {
        assert_eq!("batchnorm".parse::<NormKind>().unwrap(), NormKind::Batch);
        assert_eq!("Instance".parse::<NormKind>().unwrap(), NormKind::Instance);
        assert!("dropout".parse::<NormKind>().is_err());
    }

    #[test]
    fn test_low_resolution_threshold() {
        assert!(is_low_resolution((28, 28)));
        assert!(is_low_resolution((32, 32)));
        assert!(!is_low_resolution((64, 64)));
    }

    #[test]
    fn test_check_classifier_input() {
        assert!(check_classifier_input(512, &[1, 512, 1, 1]).is_ok());
        let err = check_classifier_input(512, &[1, 512, 2, 2]).unwrap_err();
        assert_eq!(
            err,
            Error::shape_mismatch("classifier input", &[1, 512], &[1, 2048])
        );
    }
}
