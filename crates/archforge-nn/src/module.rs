//! Module Trait - Neural Network Module Interface
//!
//! Defines the core Module trait that all layers and assembled networks
//! implement. Besides the forward pass, every module answers the pure
//! question "which shape does this input become", which is what the
//! architecture builders use to validate topology at construction time.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;

use archforge_core::{Device, Result};
use archforge_tensor::{Shape, Tensor};

use crate::parameter::Parameter;

// =============================================================================
// LayerInfo
// =============================================================================

/// One row of a network summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Dotted path of the layer inside the network (e.g. `layer2.0.conv1`).
    pub path: String,
    /// Layer type name.
    pub kind: &'static str,
    /// Output shape for the summarized input.
    pub output_shape: Vec<usize>,
    /// Number of parameters owned directly by this layer.
    pub params: usize,
}

/// Joins a parent path and a child name.
#[must_use]
pub fn child_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

// =============================================================================
// Module Trait
// =============================================================================

/// Core trait for all neural network modules.
///
/// Every layer in archforge implements this trait, which provides:
/// - Forward pass computation
/// - Exact output-shape inference
/// - Parameter management and device placement
/// - Training/evaluation mode switching
pub trait Module: Send + Sync {
    /// Performs the forward pass.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Returns the output shape produced for an input of shape `input`.
    ///
    /// Must be a pure function of `input` and the module's configuration.
    fn output_shape(&self, input: &[usize]) -> Result<Shape>;

    /// Returns all parameters of this module, including child modules.
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Returns named parameters of this module.
    fn named_parameters(&self) -> HashMap<String, Parameter> {
        HashMap::new()
    }

    /// Returns the number of trainable parameters.
    fn num_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad())
            .map(Parameter::numel)
            .sum()
    }

    /// Sets the module to training mode.
    fn train(&mut self) {
        self.set_training(true);
    }

    /// Sets the module to evaluation mode.
    fn eval(&mut self) {
        self.set_training(false);
    }

    /// Sets the training mode.
    fn set_training(&mut self, _training: bool) {}

    /// Returns whether the module is in training mode.
    fn is_training(&self) -> bool {
        true
    }

    /// Moves every parameter to `device`.
    fn to_device(&self, device: Device) {
        for param in self.parameters() {
            param.to_device(device);
        }
    }

    /// Appends one [`LayerInfo`] per leaf layer and returns the output shape.
    ///
    /// Containers override this to recurse into their children.
    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let output = self.output_shape(input)?;
        out.push(LayerInfo {
            path: path.to_string(),
            kind: self.name(),
            output_shape: output.to_vec(),
            params: self.num_parameters(),
        });
        Ok(output)
    }

    /// Returns the module name for debugging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<M: Module + ?Sized> Module for Box<M> {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        (**self).forward(input)
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        (**self).output_shape(input)
    }

    fn parameters(&self) -> Vec<Parameter> {
        (**self).parameters()
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        (**self).named_parameters()
    }

    fn num_parameters(&self) -> usize {
        (**self).num_parameters()
    }

    fn set_training(&mut self, training: bool) {
        (**self).set_training(training);
    }

    fn is_training(&self) -> bool {
        (**self).is_training()
    }

    fn to_device(&self, device: Device) {
        (**self).to_device(device);
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        (**self).summarize(input, path, out)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    impl Module for Identity {
        fn forward(&self, input: &Tensor) -> Result<Tensor> {
            Ok(input.clone())
        }

        fn output_shape(&self, input: &[usize]) -> Result<Shape> {
            Ok(Shape::from_slice(input))
        }

        fn name(&self) -> &'static str {
            "Identity"
        }
    }

    #[test]
    fn test_default_summarize() {
        let mut rows = Vec::new();
        let out = Identity.summarize(&[1, 3, 4, 4], "stem", &mut rows).unwrap();
        assert_eq!(out.as_slice(), &[1, 3, 4, 4]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "stem");
        assert_eq!(rows[0].kind, "Identity");
        assert_eq!(rows[0].params, 0);
    }

    #[test]
    fn test_boxed_module() {
        let boxed: Box<dyn Module> = Box::new(Identity);
        let input = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        assert_eq!(boxed.forward(&input).unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(boxed.name(), "Identity");
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "conv1"), "conv1");
        assert_eq!(child_path("layer1.0", "conv1"), "layer1.0.conv1");
    }
}
