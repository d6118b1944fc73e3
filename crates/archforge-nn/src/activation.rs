//! Activation Modules - Non-linear Activation Functions
//!
//! Provides activation functions as modules for use in Sequential and other containers.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::Result;
use archforge_tensor::{Shape, Tensor};

use crate::module::Module;

// =============================================================================
// ReLU
// =============================================================================

/// Applies the rectified linear unit function element-wise.
///
/// ReLU(x) = max(0, x)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    /// Creates a new ReLU activation.
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.relu())
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        Ok(Shape::from_slice(input))
    }

    fn name(&self) -> &'static str {
        "ReLU"
    }
}

// =============================================================================
// LeakyReLU
// =============================================================================

/// Applies the leaky ReLU function element-wise.
///
/// LeakyReLU(x) = max(0, x) + negative_slope * min(0, x)
#[derive(Debug, Clone, Copy)]
pub struct LeakyReLU {
    negative_slope: f32,
}

impl LeakyReLU {
    /// Creates a new LeakyReLU with default negative slope (0.01).
    pub fn new() -> Self {
        Self {
            negative_slope: 0.01,
        }
    }

    /// Creates a LeakyReLU with custom negative slope.
    pub fn with_slope(negative_slope: f32) -> Self {
        Self { negative_slope }
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for LeakyReLU {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let slope = self.negative_slope;
        Ok(input.map(|x| if x > 0.0 { x } else { x * slope }))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        Ok(Shape::from_slice(input))
    }

    fn name(&self) -> &'static str {
        "LeakyReLU"
    }
}

// =============================================================================
// Sigmoid
// =============================================================================

/// Applies the sigmoid function element-wise.
///
/// Sigmoid(x) = 1 / (1 + exp(-x))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Sigmoid {
    /// Creates a new Sigmoid activation.
    pub fn new() -> Self {
        Self
    }
}

impl Module for Sigmoid {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.map(|x| 1.0 / (1.0 + (-x).exp())))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        Ok(Shape::from_slice(input))
    }

    fn name(&self) -> &'static str {
        "Sigmoid"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tensor {
        Tensor::from_vec(vec![-2.0, 0.0, 3.0], &[3]).unwrap()
    }

    #[test]
    fn test_relu() {
        assert_eq!(ReLU.forward(&sample()).unwrap().to_vec(), vec![0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_leaky_relu() {
        let out = LeakyReLU::with_slope(0.5).forward(&sample()).unwrap();
        assert_eq!(out.to_vec(), vec![-1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_sigmoid() {
        let out = Sigmoid.forward(&sample()).unwrap().to_vec();
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!(out.iter().all(|&x| x > 0.0 && x < 1.0));
    }

    #[test]
    fn test_activations_preserve_shape() {
        let shape = [2, 16, 8, 8];
        assert_eq!(ReLU.output_shape(&shape).unwrap().as_slice(), &shape);
        assert_eq!(Sigmoid.output_shape(&shape).unwrap().as_slice(), &shape);
    }
}
