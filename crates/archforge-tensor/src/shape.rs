//! Shape - Tensor Dimension Arithmetic
//!
//! Shapes are small, so they live on the stack. The helpers here are the
//! closed-form output-size rules that convolution and pooling layers share.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use smallvec::SmallVec;

// =============================================================================
// Type Aliases
// =============================================================================

/// Shape type - dimensions of a tensor.
/// Uses `SmallVec` for stack allocation of small shapes (up to 6 dimensions).
pub type Shape = SmallVec<[usize; 6]>;

// =============================================================================
// Shape Utilities
// =============================================================================

/// Computes the total number of elements from a shape.
#[must_use]
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Output length of a sliding window along one axis.
///
/// `out = (input + 2 * padding - kernel) / stride + 1`
///
/// Returns `None` when the padded input is shorter than the kernel or the
/// stride is zero.
#[must_use]
pub fn window_output(input: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || kernel == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

/// Collapses every dimension after the batch dimension.
///
/// `[N, C, H, W]` becomes `[N, C*H*W]`; shapes of rank 2 or less are
/// returned unchanged.
#[must_use]
pub fn flattened_shape(shape: &[usize]) -> Shape {
    if shape.len() <= 2 {
        return Shape::from_slice(shape);
    }
    let mut out = Shape::new();
    out.push(shape[0]);
    out.push(numel(&shape[1..]));
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        assert_eq!(numel(&[2, 3, 4]), 24);
        assert_eq!(numel(&[]), 1);
    }

    #[test]
    fn test_window_output() {
        // 3x3 conv, padding 1 preserves size
        assert_eq!(window_output(32, 3, 1, 1), Some(32));
        // 2x2/2 pool halves, flooring odd sizes
        assert_eq!(window_output(7, 2, 2, 0), Some(3));
        // 3x3 stride 2 padding 1 rounds up
        assert_eq!(window_output(7, 3, 2, 1), Some(4));
        // 7x7 stride 2 padding 3 ImageNet stem
        assert_eq!(window_output(224, 7, 2, 3), Some(112));
    }

    #[test]
    fn test_window_output_too_small() {
        assert_eq!(window_output(1, 2, 2, 0), None);
        assert_eq!(window_output(4, 5, 1, 0), None);
        assert_eq!(window_output(4, 2, 0, 0), None);
    }

    #[test]
    fn test_flattened_shape() {
        assert_eq!(flattened_shape(&[1, 64, 8, 8]).as_slice(), &[1, 4096]);
        assert_eq!(flattened_shape(&[4, 10]).as_slice(), &[4, 10]);
    }
}
