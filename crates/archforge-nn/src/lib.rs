//! Archforge NN - Primitive Layer Set
//!
//! Provides the layers that archforge's architecture builders assemble into
//! complete networks. Every layer implements [`Module`], which answers both
//! "compute this batch" and "which shape would this input become", so a
//! builder can validate a topology before any data flows.
//!
//! # Key Components
//!
//! - **Module trait**: Forward pass, output-shape inference, parameters, placement
//! - **Parameter**: Shared-storage wrapper for learnable tensors
//! - **Sequential**: Container for chaining modules
//! - **Layers**: Conv2d, BatchNorm2d, GroupNorm, pooling, Linear, Flatten
//! - **Activations**: ReLU, LeakyReLU, Sigmoid
//! - **Functional API**: Stateless CPU kernels
//!
//! # Example
//!
//! ```rust
//! use archforge_nn::prelude::*;
//!
//! let model = Sequential::new()
//!     .add(Conv2d::square(1, 16, 3, 1, 1, true))
//!     .add(ReLU)
//!     .add(MaxPool2d::new(2));
//!
//! let shape = model.output_shape(&[1, 1, 28, 28]).unwrap();
//! assert_eq!(shape.as_slice(), &[1, 16, 14, 14]);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// ML/tensor-specific allowances
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::new_without_default)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]

// =============================================================================
// Module Declarations
// =============================================================================

pub mod activation;
pub mod functional;
pub mod init;
pub mod layers;
pub mod module;
pub mod parameter;
pub mod sequential;

// =============================================================================
// Re-exports
// =============================================================================

pub use module::{child_path, LayerInfo, Module};
pub use parameter::Parameter;
pub use sequential::Sequential;

// Layer re-exports
pub use layers::{
    AdaptiveAvgPool2d, AvgPool2d, BatchNorm2d, Conv2d, Flatten, GroupNorm, Linear, MaxPool2d,
};

// Activation re-exports
pub use activation::{LeakyReLU, ReLU, Sigmoid};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for building networks.
pub mod prelude {
    pub use crate::{
        functional, AdaptiveAvgPool2d, AvgPool2d, BatchNorm2d, Conv2d, Flatten, GroupNorm,
        LayerInfo, LeakyReLU, Linear, MaxPool2d, Module, Parameter, ReLU, Sequential, Sigmoid,
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archforge_core::Device;
    use archforge_tensor::Tensor;

    #[test]
    fn test_simple_mlp() {
        let model = Sequential::new()
            .add(Linear::new(10, 5))
            .add(ReLU)
            .add(Linear::new(5, 2));

        let input = Tensor::from_vec(vec![1.0; 20], &[2, 10]).unwrap();
        let output = model.forward(&input).unwrap();
        assert_eq!(output.shape(), &[2, 2]);
    }

    #[test]
    fn test_module_parameters() {
        let model = Sequential::new()
            .add(Linear::new(10, 5))
            .add(Linear::new(5, 2));

        // 2 Linear layers with weight + bias each = 4 parameters
        assert_eq!(model.parameters().len(), 4);
    }

    #[test]
    fn test_conv_model() {
        let model = Sequential::new()
            .add(Conv2d::new(1, 16, 3))
            .add(BatchNorm2d::new(16))
            .add(ReLU)
            .add(MaxPool2d::new(2));

        let input = Tensor::from_vec(vec![1.0; 784], &[1, 1, 28, 28]).unwrap();
        let output = model.forward(&input).unwrap();
        // Conv2d: 28 -> 26, MaxPool2d: 26 -> 13
        assert_eq!(output.shape(), &[1, 16, 13, 13]);
        assert_eq!(
            model.output_shape(input.shape()).unwrap().as_slice(),
            output.shape()
        );
    }

    #[test]
    fn test_to_device_moves_every_parameter() {
        let model = Sequential::new()
            .add(Conv2d::new(1, 4, 3))
            .add(GroupNorm::new(2, 4).unwrap());
        model.to_device(Device::Cuda(1));
        assert!(model
            .parameters()
            .iter()
            .all(|p| p.device() == Device::Cuda(1)));
    }
}
