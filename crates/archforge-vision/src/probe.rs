//! Shape Probe - Flattened Feature Width of a Trunk
//!
//! Some trunks have no closed-form output width. The probe pushes the shape
//! of a single `[1, C, H, W]` sample through the trunk's shape inference and
//! reports how many features the classifier will see.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::Result;
use archforge_nn::Module;
use archforge_tensor::{numel, Tensor};

/// Flattened per-sample width of `trunk` for a `channels x H x W` input.
///
/// Pure shape arithmetic: no tensor is allocated and no parameter is read.
pub fn flattened_width(trunk: &dyn Module, channels: usize, input_size: (usize, usize)) -> Result<usize> {
    let output = trunk.output_shape(&[1, channels, input_size.0, input_size.1])?;
    Ok(numel(&output[1..]))
}

/// Runs one all-zero sample through `trunk` and measures the flattened width.
///
/// Used to cross-check [`flattened_width`]. Training-mode layers may update
/// running statistics, so callers probe a throwaway trunk or one in eval mode.
pub fn dry_run(trunk: &dyn Module, channels: usize, input_size: (usize, usize)) -> Result<usize> {
    let input = Tensor::zeros(&[1, channels, input_size.0, input_size.1]);
    let output = trunk.forward(&input)?;
    Ok(numel(&output.shape()[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use archforge_nn::{Conv2d, MaxPool2d, ReLU, Sequential};

    fn trunk() -> Sequential {
        Sequential::new()
            .add(Conv2d::square(3, 8, 3, 1, 1, true))
            .add(ReLU)
            .add(MaxPool2d::new(2))
    }

    #[test]
    fn test_flattened_width() {
        assert_eq!(flattened_width(&trunk(), 3, (32, 32)).unwrap(), 8 * 16 * 16);
        assert_eq!(flattened_width(&trunk(), 3, (28, 20)).unwrap(), 8 * 14 * 10);
    }

    #[test]
    fn test_dry_run_agrees() {
        let trunk = trunk();
        assert_eq!(
            dry_run(&trunk, 3, (12, 12)).unwrap(),
            flattened_width(&trunk, 3, (12, 12)).unwrap()
        );
    }

    #[test]
    fn test_probe_propagates_errors() {
        assert!(flattened_width(&trunk(), 1, (32, 32)).is_err());
        assert!(flattened_width(&trunk(), 3, (1, 1)).is_err());
    }
}
