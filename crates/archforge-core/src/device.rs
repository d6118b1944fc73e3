//! Device Abstraction - Placement Targets for Constructed Networks
//!
//! Provides the device tag a network's parameters are placed on. Storage is
//! always host memory; a `Cuda` device records where a replica is meant to
//! execute so that the caller's execution layer can dispatch accordingly.
//!
//! # Example
//! ```rust
//! use archforge_core::Device;
//!
//! let cpu = Device::Cpu;
//! assert!(cpu.is_available());
//! assert!(cpu.is_cpu());
//!
//! let device = Device::default();
//! assert_eq!(device, Device::Cpu);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable listing the accelerators this process may use.
pub const CUDA_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";

// =============================================================================
// Device Enum
// =============================================================================

/// Represents a compute device that network parameters can be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// CPU device (always available).
    Cpu,

    /// NVIDIA CUDA GPU device with device index.
    Cuda(usize),
}

impl Device {
    /// Returns true if this device is visible to the current process.
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Cuda(idx) => idx < visible_cuda_devices(),
        }
    }

    /// Returns true if this is a CPU device.
    #[must_use]
    pub const fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }

    /// Returns true if this is a GPU device.
    #[must_use]
    pub const fn is_gpu(self) -> bool {
        !self.is_cpu()
    }

    /// Returns the device index for GPU devices, or 0 for CPU.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Cuda(idx) => idx,
        }
    }

    /// Returns the name of this device type.
    #[must_use]
    pub const fn device_type(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda(_) => "cuda",
        }
    }

    /// Returns the default CPU device.
    #[must_use]
    pub const fn cpu() -> Self {
        Self::Cpu
    }

    /// Returns a CUDA device with the given index.
    #[must_use]
    pub const fn cuda(index: usize) -> Self {
        Self::Cuda(index)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

// =============================================================================
// Device Count Functions
// =============================================================================

/// Returns the number of CUDA devices listed in `CUDA_VISIBLE_DEVICES`.
///
/// An unset or empty variable, or the conventional `-1` sentinel, yields 0.
#[must_use]
pub fn visible_cuda_devices() -> usize {
    std::env::var(CUDA_VISIBLE_DEVICES)
        .map(|value| parse_visible_devices(&value))
        .unwrap_or(0)
}

/// Counts the device entries in a `CUDA_VISIBLE_DEVICES`-style list.
#[must_use]
pub fn parse_visible_devices(value: &str) -> usize {
    let mut count = 0;
    for entry in value.split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        // Enumeration stops at the first invalid id.
        if entry.starts_with('-') {
            break;
        }
        count += 1;
    }
    count
}

// =============================================================================
// Tests
// =============================================================================
