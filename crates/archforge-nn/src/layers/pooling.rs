//! Pooling Layers - Max and Average Pooling
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::{Error, Result};
use archforge_tensor::{Shape, Tensor};

use crate::functional;
use crate::module::Module;

// =============================================================================
// MaxPool2d
// =============================================================================

/// Applies max pooling over a 2D signal.
///
/// # Shape
/// - Input: (N, C, H, W)
/// - Output: (N, C, H_out, W_out)
pub struct MaxPool2d {
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl MaxPool2d {
    /// Creates a new MaxPool2d with stride equal to the kernel size.
    pub fn new(kernel_size: usize) -> Self {
        Self::with_options(kernel_size, kernel_size, 0)
    }

    /// Creates a MaxPool2d with all options.
    pub fn with_options(kernel_size: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel_size: (kernel_size, kernel_size),
            stride: (stride, stride),
            padding: (padding, padding),
        }
    }
}

impl Module for MaxPool2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        functional::max_pool2d(input, self.kernel_size, self.stride, self.padding)
            .map(|out| out.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let (h, w) =
            functional::window_shape(self.name(), input, self.kernel_size, self.stride, self.padding)?;
        Ok(Shape::from_slice(&[input[0], input[1], h, w]))
    }

    fn name(&self) -> &'static str {
        "MaxPool2d"
    }
}

// =============================================================================
// AvgPool2d
// =============================================================================

/// Applies average pooling over a 2D signal.
pub struct AvgPool2d {
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl AvgPool2d {
    /// Creates a new AvgPool2d with stride equal to the kernel size.
    pub fn new(kernel_size: usize) -> Self {
        Self::with_options(kernel_size, kernel_size, 0)
    }

    /// Creates an AvgPool2d with all options.
    pub fn with_options(kernel_size: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel_size: (kernel_size, kernel_size),
            stride: (stride, stride),
            padding: (padding, padding),
        }
    }
}

impl Module for AvgPool2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        functional::avg_pool2d(input, self.kernel_size, self.stride, self.padding)
            .map(|out| out.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let (h, w) =
            functional::window_shape(self.name(), input, self.kernel_size, self.stride, self.padding)?;
        Ok(Shape::from_slice(&[input[0], input[1], h, w]))
    }

    fn name(&self) -> &'static str {
        "AvgPool2d"
    }
}

// =============================================================================
// AdaptiveAvgPool2d
// =============================================================================

/// Applies adaptive average pooling to produce a fixed spatial size.
pub struct AdaptiveAvgPool2d {
    output_size: (usize, usize),
}

impl AdaptiveAvgPool2d {
    /// Creates a new AdaptiveAvgPool2d.
    pub fn new(output_size: (usize, usize)) -> Self {
        Self { output_size }
    }

    /// Creates an AdaptiveAvgPool2d with square output.
    pub fn square(size: usize) -> Self {
        Self::new((size, size))
    }
}

impl Module for AdaptiveAvgPool2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.output_shape(input.shape())?;
        functional::adaptive_avg_pool2d(input, self.output_size)
            .map(|out| out.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        functional::expect_rank(self.name(), input, 4)?;
        if input[2] == 0 || input[3] == 0 || self.output_size.0 == 0 || self.output_size.1 == 0 {
            return Err(Error::invalid_shape(
                self.name(),
                input,
                "spatial extent must be non-empty",
            ));
        }
        Ok(Shape::from_slice(&[
            input[0],
            input[1],
            self.output_size.0,
            self.output_size.1,
        ]))
    }

    fn name(&self) -> &'static str {
        "AdaptiveAvgPool2d"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maxpool2d_halves() {
        let pool = MaxPool2d::new(2);
        assert_eq!(pool.output_shape(&[1, 8, 32, 32]).unwrap().as_slice(), &[1, 8, 16, 16]);
        let out = pool.forward(&Tensor::ones(&[1, 2, 4, 4])).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2, 2]);
    }

    #[test]
    fn test_maxpool2d_stem_shape() {
        let pool = MaxPool2d::with_options(3, 2, 1);
        assert_eq!(pool.output_shape(&[1, 64, 112, 112]).unwrap().as_slice(), &[1, 64, 56, 56]);
    }

    #[test]
    fn test_pooling_rejects_collapsed_input() {
        let pool = MaxPool2d::new(2);
        assert!(pool.output_shape(&[1, 8, 1, 1]).is_err());
        assert!(AvgPool2d::new(2).output_shape(&[1, 8, 1, 1]).is_err());
    }

    #[test]
    fn test_avgpool2d_unit_kernel_is_identity() {
        let pool = AvgPool2d::with_options(1, 1, 0);
        let input = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]).unwrap();
        assert_eq!(pool.forward(&input).unwrap(), input);
    }

    #[test]
    fn test_adaptive_avgpool2d() {
        let pool = AdaptiveAvgPool2d::square(1);
        assert_eq!(pool.output_shape(&[2, 512, 7, 7]).unwrap().as_slice(), &[2, 512, 1, 1]);
        let out = pool.forward(&Tensor::full(&[1, 3, 5, 5], 2.0)).unwrap();
        assert_eq!(out.to_vec(), vec![2.0, 2.0, 2.0]);
    }
}
