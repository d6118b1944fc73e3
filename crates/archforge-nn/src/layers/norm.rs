//! Normalization Layers - BatchNorm2d and GroupNorm
//!
//! Instance and layer normalization over images are expressed as the two
//! extremes of [`GroupNorm`]: one group per channel, and a single group.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use archforge_core::{Device, Error, Result};
use archforge_tensor::{Shape, Tensor};
use parking_lot::RwLock;

use crate::functional::expect_image;
use crate::init::{ones, zeros};
use crate::module::Module;
use crate::parameter::Parameter;

fn mean_var(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let (sum, count) = values.clone().fold((0.0f32, 0usize), |(s, c), x| (s + x, c + 1));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f32;
    let var = values.map(|x| (x - mean) * (x - mean)).sum::<f32>() / count as f32;
    (mean, var)
}

// =============================================================================
// BatchNorm2d
// =============================================================================

/// Applies Batch Normalization over a 4D input (images).
///
/// # Shape
/// - Input: (N, C, H, W)
/// - Output: Same as input
pub struct BatchNorm2d {
    /// Learnable scale parameter (gamma).
    pub weight: Parameter,
    /// Learnable shift parameter (beta).
    pub bias: Parameter,
    running_mean: RwLock<Tensor>,
    running_var: RwLock<Tensor>,
    num_features: usize,
    eps: f32,
    momentum: f32,
    training: AtomicBool,
}

impl BatchNorm2d {
    /// Creates a new BatchNorm2d layer.
    pub fn new(num_features: usize) -> Self {
        Self::with_options(num_features, 1e-5, 0.1)
    }

    /// Creates a BatchNorm2d with custom options.
    pub fn with_options(num_features: usize, eps: f32, momentum: f32) -> Self {
        Self {
            weight: Parameter::named("weight", ones(&[num_features]), true),
            bias: Parameter::named("bias", zeros(&[num_features]), true),
            running_mean: RwLock::new(zeros(&[num_features])),
            running_var: RwLock::new(ones(&[num_features])),
            num_features,
            eps,
            momentum,
            training: AtomicBool::new(true),
        }
    }

    /// Returns the number of features (channels).
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Returns a copy of the running mean.
    pub fn running_mean(&self) -> Tensor {
        self.running_mean.read().clone()
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        expect_image(self.name(), input.shape(), self.num_features)?;
        let shape = input.shape();
        let (batch, channels, spatial) = (shape[0], shape[1], shape[2] * shape[3]);
        let x = input.as_slice();
        let plane = |b: usize, c: usize| {
            let start = (b * channels + c) * spatial;
            x[start..start + spatial].iter().copied()
        };

        let (means, vars): (Vec<f32>, Vec<f32>) = if self.is_training() {
            let stats: (Vec<f32>, Vec<f32>) = (0..channels)
                .map(|c| mean_var((0..batch).flat_map(|b| plane(b, c))))
                .unzip();

            let mut running_mean = self.running_mean.write();
            let mut running_var = self.running_var.write();
            let blend = |running: &Tensor, batch_stat: &[f32]| -> Vec<f32> {
                running
                    .as_slice()
                    .iter()
                    .zip(batch_stat)
                    .map(|(&r, &s)| (1.0 - self.momentum) * r + self.momentum * s)
                    .collect()
            };
            let device = running_mean.device();
            *running_mean =
                Tensor::from_vec(blend(&running_mean, &stats.0), &[channels])?.to_device(device);
            *running_var =
                Tensor::from_vec(blend(&running_var, &stats.1), &[channels])?.to_device(device);
            stats
        } else {
            (self.running_mean.read().to_vec(), self.running_var.read().to_vec())
        };

        let gamma = self.weight.data();
        let beta = self.bias.data();
        let mut output = Vec::with_capacity(x.len());
        for b in 0..batch {
            for c in 0..channels {
                let scale = gamma.as_slice()[c] / (vars[c] + self.eps).sqrt();
                let shift = beta.as_slice()[c] - means[c] * scale;
                output.extend(plane(b, c).map(|v| v * scale + shift));
            }
        }

        Ok(Tensor::from_vec(output, shape)?.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        expect_image(self.name(), input, self.num_features)?;
        Ok(Shape::from_slice(input))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        params.insert("bias".to_string(), self.bias.clone());
        params
    }

    fn set_training(&mut self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    fn is_training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }

    fn to_device(&self, device: Device) {
        self.weight.to_device(device);
        self.bias.to_device(device);
        for stat in [&self.running_mean, &self.running_var] {
            let mut guard = stat.write();
            *guard = guard.to_device(device);
        }
    }

    fn name(&self) -> &'static str {
        "BatchNorm2d"
    }
}

// =============================================================================
// GroupNorm
// =============================================================================

/// Applies Group Normalization over a 4D input.
///
/// Channels are split into `num_groups` groups; statistics are computed per
/// sample and group, so the result does not depend on the batch.
pub struct GroupNorm {
    /// Learnable per-channel scale.
    pub weight: Parameter,
    /// Learnable per-channel shift.
    pub bias: Parameter,
    num_groups: usize,
    num_channels: usize,
    eps: f32,
}

impl GroupNorm {
    /// Creates a GroupNorm layer. `num_channels` must be divisible by `num_groups`.
    pub fn new(num_groups: usize, num_channels: usize) -> Result<Self> {
        if num_groups == 0 || num_channels % num_groups != 0 {
            return Err(Error::invalid_config(format!(
                "GroupNorm: {num_channels} channels cannot be split into {num_groups} groups"
            )));
        }
        Ok(Self {
            weight: Parameter::named("weight", ones(&[num_channels]), true),
            bias: Parameter::named("bias", zeros(&[num_channels]), true),
            num_groups,
            num_channels,
            eps: 1e-5,
        })
    }

    /// Number of groups.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }
}

impl Module for GroupNorm {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        expect_image(self.name(), input.shape(), self.num_channels)?;
        let shape = input.shape();
        let (batch, spatial) = (shape[0], shape[2] * shape[3]);
        let group_len = self.num_channels / self.num_groups * spatial;
        let x = input.as_slice();
        let gamma = self.weight.data();
        let beta = self.bias.data();
        let mut output = Vec::with_capacity(x.len());

        for b in 0..batch {
            for g in 0..self.num_groups {
                let start = (b * self.num_groups + g) * group_len;
                let group = &x[start..start + group_len];
                let (mean, var) = mean_var(group.iter().copied());
                let inv_std = 1.0 / (var + self.eps).sqrt();
                for (i, &v) in group.iter().enumerate() {
                    let c = g * (self.num_channels / self.num_groups) + i / spatial;
                    output.push((v - mean) * inv_std * gamma.as_slice()[c] + beta.as_slice()[c]);
                }
            }
        }

        Ok(Tensor::from_vec(output, shape)?.to_device(input.device()))
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        expect_image(self.name(), input, self.num_channels)?;
        Ok(Shape::from_slice(input))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        params.insert("bias".to_string(), self.bias.clone());
        params
    }

    fn name(&self) -> &'static str {
        "GroupNorm"
    }
}

// =============================================================================
// Tests
// =============================================================================
