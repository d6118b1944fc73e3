//! Tensor Creation Functions
//!
//! Factory functions for constant and random tensors.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::{StandardNormal, Uniform};

use crate::shape::numel;
use crate::tensor::Tensor;

// =============================================================================
// Constant Initialization
// =============================================================================

/// Creates a tensor filled with zeros.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

/// Creates a tensor filled with ones.
#[must_use]
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::ones(shape)
}

/// Creates a tensor filled with a specific value.
#[must_use]
pub fn full(shape: &[usize], value: f32) -> Tensor {
    Tensor::full(shape, value)
}

// =============================================================================
// Random Initialization
// =============================================================================

/// Creates a tensor with uniformly distributed random values in [0, 1).
#[must_use]
pub fn rand(shape: &[usize]) -> Tensor {
    let mut rng = rand::thread_rng();
    let data: Vec<f32> = (0..numel(shape)).map(|_| rng.gen()).collect();
    from_generated(data, shape)
}

/// Creates a tensor with normally distributed random values (mean=0, std=1).
#[must_use]
pub fn randn(shape: &[usize]) -> Tensor {
    let mut rng = rand::thread_rng();
    let data: Vec<f32> = (0..numel(shape))
        .map(|_| {
            let value: f32 = StandardNormal.sample(&mut rng);
            value
        })
        .collect();
    from_generated(data, shape)
}

/// Creates a tensor with uniformly distributed random values in [low, high).
///
/// An empty range (`low >= high`) produces a tensor filled with `low`.
#[must_use]
pub fn uniform(shape: &[usize], low: f32, high: f32) -> Tensor {
    if low >= high {
        return Tensor::full(shape, low);
    }
    let mut rng = rand::thread_rng();
    let dist = Uniform::new(low, high);
    let data: Vec<f32> = (0..numel(shape)).map(|_| dist.sample(&mut rng)).collect();
    from_generated(data, shape)
}

fn from_generated(data: Vec<f32>, shape: &[usize]) -> Tensor {
    // Length equals numel(shape) by construction.
    Tensor::from_vec(data, shape).unwrap_or_else(|_| Tensor::zeros(shape))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_ones_full() {
        assert!(zeros(&[2, 3]).to_vec().iter().all(|&x| x == 0.0));
        assert!(ones(&[4]).to_vec().iter().all(|&x| x == 1.0));
        assert_eq!(full(&[2], 7.5).to_vec(), vec![7.5, 7.5]);
    }

    #[test]
    fn test_rand_range() {
        let t = rand(&[100]);
        assert!(t.to_vec().iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn test_randn_shape() {
        let t = randn(&[3, 4, 5]);
        assert_eq!(t.shape(), &[3, 4, 5]);
    }

    #[test]
    fn test_uniform_bounds() {
        let t = uniform(&[256], -0.5, 0.5);
        assert!(t.to_vec().iter().all(|&x| (-0.5..0.5).contains(&x)));
        assert_eq!(uniform(&[2], 1.0, 1.0).to_vec(), vec![1.0, 1.0]);
    }
}
