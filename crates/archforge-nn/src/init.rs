//! Weight Initialization - Parameter Initialization Strategies
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_tensor::Tensor;

// =============================================================================
// Basic Initializers
// =============================================================================

/// Creates a tensor filled with zeros.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    archforge_tensor::zeros(shape)
}

/// Creates a tensor filled with ones.
#[must_use]
pub fn ones(shape: &[usize]) -> Tensor {
    archforge_tensor::ones(shape)
}

/// Creates a tensor with uniform random values in [low, high).
#[must_use]
pub fn uniform_range(shape: &[usize], low: f32, high: f32) -> Tensor {
    archforge_tensor::uniform(shape, low, high)
}

// =============================================================================
// Kaiming/He Initialization
// =============================================================================

/// Kaiming uniform initialization for a weight of arbitrary shape.
///
/// Samples from U(-bound, bound) where bound = sqrt(6 / fan_in). The first
/// dimension of `shape` is the output dimension; `fan_in` is the product of
/// the remaining dimensions.
#[must_use]
pub fn kaiming_uniform(shape: &[usize]) -> Tensor {
    let fan_in: usize = shape.iter().skip(1).product();
    let bound = (6.0 / fan_in.max(1) as f32).sqrt();
    uniform_range(shape, -bound, bound)
}

/// Uniform initialization for a bias vector, bound = 1 / sqrt(fan_in).
#[must_use]
pub fn bias_uniform(len: usize, fan_in: usize) -> Tensor {
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    uniform_range(&[len], -bound, bound)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kaiming_uniform_bounds() {
        let w = kaiming_uniform(&[16, 3, 3, 3]);
        assert_eq!(w.shape(), &[16, 3, 3, 3]);
        let bound = (6.0f32 / 27.0).sqrt();
        assert!(w.to_vec().iter().all(|&x| x.abs() <= bound));
    }

    #[test]
    fn test_bias_uniform_bounds() {
        let b = bias_uniform(10, 100);
        assert_eq!(b.shape(), &[10]);
        assert!(b.to_vec().iter().all(|&x| x.abs() <= 0.1));
    }

    #[test]
    fn test_zeros_ones() {
        assert_eq!(zeros(&[2]).to_vec(), vec![0.0, 0.0]);
        assert_eq!(ones(&[2]).to_vec(), vec![1.0, 1.0]);
    }
}
