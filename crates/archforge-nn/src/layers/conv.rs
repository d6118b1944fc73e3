//! Convolutional Layers - 2D Convolution
//!
//! Applies a 2D convolution over an image batch.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;

use archforge_core::Result;
use archforge_tensor::{Shape, Tensor};

use crate::functional;
use crate::init::{bias_uniform, kaiming_uniform};
use crate::module::Module;
use crate::parameter::Parameter;

// =============================================================================
// Conv2d
// =============================================================================

/// Applies a 2D convolution over an input image.
///
/// # Shape
/// - Input: (N, C_in, H, W)
/// - Output: (N, C_out, H_out, W_out)
///
/// where H_out = (H + 2*padding - kernel_size) / stride + 1
pub struct Conv2d {
    /// Weight tensor of shape (out_channels, in_channels, kernel_h, kernel_w).
    pub weight: Parameter,
    /// Bias tensor of shape (out_channels).
    pub bias: Option<Parameter>,
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
}

impl Conv2d {
    /// Creates a new Conv2d layer with a square kernel, stride 1 and no padding.
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self::with_options(
            in_channels,
            out_channels,
            (kernel_size, kernel_size),
            (1, 1),
            (0, 0),
            true,
        )
    }

    /// Creates a square-kernel Conv2d with the given stride and padding.
    pub fn square(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
    ) -> Self {
        Self::with_options(
            in_channels,
            out_channels,
            (kernel_size, kernel_size),
            (stride, stride),
            (padding, padding),
            bias,
        )
    }

    /// Creates a Conv2d layer with all options.
    pub fn with_options(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
        bias: bool,
    ) -> Self {
        let (kh, kw) = kernel_size;
        let weight = Parameter::named(
            "weight",
            kaiming_uniform(&[out_channels, in_channels, kh, kw]),
            true,
        );
        let bias = bias.then(|| {
            Parameter::named(
                "bias",
                bias_uniform(out_channels, in_channels * kh * kw),
                true,
            )
        });

        Self {
            weight,
            bias,
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        }
    }

    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Kernel size as (height, width).
    pub fn kernel_size(&self) -> (usize, usize) {
        self.kernel_size
    }

    /// Stride as (height, width).
    pub fn stride(&self) -> (usize, usize) {
        self.stride
    }

    /// Zero padding as (height, width).
    pub fn padding(&self) -> (usize, usize) {
        self.padding
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let weight = self.weight.data();
        let bias = self.bias.as_ref().map(Parameter::data);
        functional::conv2d(input, &weight, bias.as_ref(), self.stride, self.padding)
            .map(|out| out.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        functional::expect_image(self.name(), input, self.in_channels)?;
        let (h, w) =
            functional::window_shape(self.name(), input, self.kernel_size, self.stride, self.padding)?;
        Ok(Shape::from_slice(&[input[0], self.out_channels, h, w]))
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
        "Conv2d"
    }
}

// =============================================================================
// Tests
// =============================================================================
