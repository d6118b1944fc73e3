//! Parameter - Learnable Parameter Wrapper
//!
//! Wraps the tensors that make up a module's learnable state. The tensor sits
//! behind a shared lock so that placement and replica synchronization can
//! update it through `&self`.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::sync::Arc;

use archforge_core::{Device, Error, Result};
use archforge_tensor::Tensor;
use parking_lot::RwLock;

// =============================================================================
// Parameter
// =============================================================================

/// A learnable parameter of a neural network module.
///
/// Cloning a `Parameter` yields another handle to the same tensor. Use
/// [`Parameter::copy_from`] to give an independent parameter the same values.
#[derive(Clone)]
pub struct Parameter {
    /// The underlying tensor.
    data: Arc<RwLock<Tensor>>,
    /// Parameter name (for debugging and summaries).
    name: String,
    /// Whether this parameter is trainable.
    requires_grad: bool,
}

impl Parameter {
    /// Creates a new parameter from a tensor.
    #[must_use]
    pub fn new(data: Tensor, requires_grad: bool) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            name: String::new(),
            requires_grad,
        }
    }

    /// Creates a new parameter with a name.
    #[must_use]
    pub fn named(name: impl Into<String>, data: Tensor, requires_grad: bool) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            name: name.into(),
            requires_grad,
        }
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a clone of the tensor data.
    #[must_use]
    pub fn data(&self) -> Tensor {
        self.data.read().clone()
    }

    /// Runs `f` with a borrow of the tensor data.
    pub fn with_data<R>(&self, f: impl FnOnce(&Tensor) -> R) -> R {
        f(&self.data.read())
    }

    /// Returns the shape of the parameter.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.data.read().shape().to_vec()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.read().numel()
    }

    /// Returns whether this parameter is trainable.
    #[must_use]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Returns the device the parameter is placed on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.data.read().device()
    }

    /// Returns true if both handles refer to the same tensor.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Moves the parameter to `device`.
    pub fn to_device(&self, device: Device) {
        let mut guard = self.data.write();
        if guard.device() != device {
            *guard = guard.to_device(device);
        }
    }

    /// Overwrites this parameter's values with `source`'s, keeping this
    /// parameter's device.
    pub fn copy_from(&self, source: &Self) -> Result<()> {
        let values = source.data();
        let mut guard = self.data.write();
        if values.shape() != guard.shape() {
            return Err(Error::shape_mismatch(
                format!("parameter copy '{}'", self.name),
                guard.shape(),
                values.shape(),
            ));
        }
        let device = guard.device();
        *guard = values.to_device(device);
        Ok(())
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
