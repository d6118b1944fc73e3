//! Flatten Layer
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::{Error, Result};
use archforge_tensor::{flattened_shape, Shape, Tensor};

use crate::functional;
use crate::module::Module;

/// Collapses every dimension after the batch dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flatten;

impl Flatten {
    /// Creates a new Flatten layer.
    pub fn new() -> Self {
        Self
    }
}

impl Module for Flatten {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.output_shape(input.shape())?;
        functional::flatten(input)
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        if input.is_empty() {
            return Err(Error::invalid_shape(self.name(), input, "expected a batch dimension"));
        }
        Ok(flattened_shape(input))
    }

    fn name(&self) -> &'static str {
        "Flatten"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten() {
        let out = Flatten.forward(&Tensor::zeros(&[2, 64, 8, 8])).unwrap();
        assert_eq!(out.shape(), &[2, 4096]);
        assert!(Flatten.output_shape(&[]).is_err());
    }
}
