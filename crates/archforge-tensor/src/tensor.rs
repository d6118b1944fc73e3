//! Tensor - Contiguous N-Dimensional f32 Array
//!
//! The `Tensor` struct holds parameter and activation data for archforge
//! networks. Data is always row-major and contiguous in host memory; the
//! device field records where the owning network has been placed.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;

use archforge_core::error::{Error, Result};
use archforge_core::Device;

use crate::shape::{numel, Shape};

// =============================================================================
// Tensor Struct
// =============================================================================

/// An N-dimensional array of f32 values.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    /// Row-major element data.
    data: Vec<f32>,
    /// Shape of the tensor (dimensions).
    shape: Shape,
    /// Placement of the tensor.
    device: Device,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a new tensor from a vector with the given shape.
    ///
    /// # Returns
    /// New tensor, or error if shape doesn't match data length.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected = numel(shape);
        if expected != data.len() {
            return Err(Error::shape_mismatch(
                "tensor construction",
                &[expected],
                &[data.len()],
            ));
        }

        Ok(Self {
            data,
            shape: Shape::from_slice(shape),
            device: Device::Cpu,
        })
    }

    /// Creates a tensor filled with a single value.
    #[must_use]
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            data: vec![value; numel(shape)],
            shape: Shape::from_slice(shape),
            device: Device::Cpu,
        }
    }

    /// Creates a tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Creates a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the tensor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the device the tensor is placed on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Borrows the underlying element data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copies the element data into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.clone()
    }

    // =========================================================================
    // Shape Operations
    // =========================================================================

    /// Returns a tensor with the same data and a new shape.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self> {
        if numel(new_shape) != self.numel() {
            return Err(Error::shape_mismatch(
                "reshape",
                &self.shape,
                new_shape,
            ));
        }
        Ok(Self {
            data: self.data.clone(),
            shape: Shape::from_slice(new_shape),
            device: self.device,
        })
    }

    /// Returns a copy of this tensor placed on `device`.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            data: self.data.clone(),
            shape: self.shape.clone(),
            device,
        }
    }

    // =========================================================================
    // Elementwise Operations
    // =========================================================================

    /// Elementwise addition. Shapes must be identical; nothing is broadcast.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch("elementwise add", &self.shape, &other.shape));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            data,
            shape: self.shape.clone(),
            device: self.device,
        })
    }

    /// Applies `f` to every element.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
            device: self.device,
        }
    }

    /// Rectified linear unit.
    #[must_use]
    pub fn relu(&self) -> Self {
        self.map(|x| x.max(0.0))
    }

    /// Multiplies every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Self {
        self.map(|x| x * scalar)
    }

    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape.as_slice())
            .field("device", &self.device)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
