//! Linear Layer - Fully Connected Layer
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;

use archforge_core::{Error, Result};
use archforge_tensor::{Shape, Tensor};

use crate::functional;
use crate::init::{bias_uniform, kaiming_uniform};
use crate::module::Module;
use crate::parameter::Parameter;

// =============================================================================
// Linear
// =============================================================================

/// Applies a linear transformation: y = xW^T + b
///
/// # Shape
/// - Input: (N, in_features)
/// - Output: (N, out_features)
pub struct Linear {
    /// Weight matrix of shape (out_features, in_features).
    pub weight: Parameter,
    /// Bias vector of shape (out_features).
    pub bias: Option<Parameter>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with bias.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_bias(in_features, out_features, true)
    }

    /// Creates a new Linear layer with optional bias.
    pub fn with_bias(in_features: usize, out_features: usize, bias: bool) -> Self {
        let weight = Parameter::named("weight", kaiming_uniform(&[out_features, in_features]), true);
        let bias = bias.then(|| Parameter::named("bias", bias_uniform(out_features, in_features), true));

        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Returns the input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let weight = self.weight.data();
        let bias = self.bias.as_ref().map(Parameter::data);
        functional::linear(input, &weight, bias.as_ref()).map(|out| out.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        functional::expect_rank(self.name(), input, 2)?;
        if input[1] != self.in_features {
            return Err(Error::invalid_shape(
                self.name(),
                input,
                format!("expected {} input features", self.in_features),
            ));
        }
        Ok(Shape::from_slice(&[input[0], self.out_features]))
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params = vec![self.weight.clone()];
        if let Some(ref bias) = self.bias {
            params.push(bias.clone());
        }
        params
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        if let Some(ref bias) = self.bias {
            params.insert("bias".to_string(), bias.clone());
        }
        params
    }

    fn name(&self) -> &'static str {
        "Linear"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_creation() {
        let linear = Linear::new(10, 5);
        assert_eq!(linear.weight.shape(), vec![5, 10]);
        assert_eq!(linear.num_parameters(), 55);
    }

    #[test]
    fn test_linear_forward() {
        let linear = Linear::new(3, 2);
        let out = linear.forward(&Tensor::ones(&[4, 3])).unwrap();
        assert_eq!(out.shape(), &[4, 2]);
    }

    #[test]
    fn test_linear_no_bias() {
        let linear = Linear::with_bias(10, 5, false);
        assert_eq!(linear.num_parameters(), 50);
    }

    #[test]
    fn test_linear_rejects_wrong_width() {
        let linear = Linear::new(4096, 10);
        let err = linear.output_shape(&[1, 3136]).unwrap_err();
        assert!(err.is_shape_error());
    }
}
