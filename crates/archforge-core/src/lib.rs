//! Archforge Core - Foundation Layer for the Archforge Network Factory
//!
//! This crate provides the abstractions every other archforge crate builds on:
//! the compute-device tag that constructed networks are placed on, and the
//! unified error type that all construction steps report through.
//!
//! # Key Features
//! - Device abstraction (CPU, CUDA placement tags)
//! - Visible-accelerator discovery for placement decisions
//! - One error enum covering configuration, shape and placement failures
//!
//! # Example
//! ```rust
//! use archforge_core::{Device, Error};
//!
//! let device = Device::default();
//! assert!(device.is_cpu());
//!
//! let err = Error::unknown_architecture("NotARealNet");
//! assert!(err.is_config_error());
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

// =============================================================================
// Modules
// =============================================================================

pub mod device;
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

pub use device::{visible_cuda_devices, Device};
pub use error::{Error, Result};

// =============================================================================
// Prelude
// =============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::device::Device;
    pub use crate::error::{Error, Result};
}
