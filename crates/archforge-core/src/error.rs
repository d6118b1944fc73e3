//! Error Types - Archforge Error Handling
//!
//! Every failure during network construction is fatal to that construction
//! request and is reported through [`Error`]. The variants fall into the
//! three categories construction can produce: configuration errors, shape
//! mismatches at residual adds or classifier inputs, and shape-propagation
//! failures raised while probing a trunk.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use thiserror::Error;

use crate::device::Device;

// =============================================================================
// Error Types
// =============================================================================

/// The main error type for archforge operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Architecture name not in the known set.
    #[error("Unknown architecture: {name}")]
    UnknownArchitecture {
        /// The name that failed to parse.
        name: String,
    },

    /// Invalid construction parameter (channel/class count, resolution).
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid value.
        message: String,
    },

    /// Two shapes that must agree do not.
    #[error("Shape mismatch at {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Where the shapes were compared (e.g. "residual add").
        context: String,
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// A layer cannot accept the given input shape.
    #[error("Invalid shape for {layer}: {message} (input {input:?})")]
    InvalidShape {
        /// Name of the layer that rejected the input.
        layer: String,
        /// The offending input shape.
        input: Vec<usize>,
        /// Why the input was rejected.
        message: String,
    },

    /// Device not available for placement.
    #[error("Device not available: {device}")]
    DeviceNotAvailable {
        /// The unavailable device.
        device: Device,
    },

    /// Configuration file could not be read or parsed.
    #[error("Configuration file error: {message}")]
    Config {
        /// Description of the file error.
        message: String,
    },
}

// =============================================================================
// Result Type
// =============================================================================

/// A specialized Result type for archforge operations.
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// Helper Functions
// =============================================================================

impl Error {
    /// Creates an unknown-architecture error.
    #[must_use]
    pub fn unknown_architecture(name: impl Into<String>) -> Self {
        Self::UnknownArchitecture { name: name.into() }
    }

    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an invalid-shape error for the named layer.
    #[must_use]
    pub fn invalid_shape(layer: impl Into<String>, input: &[usize], message: impl Into<String>) -> Self {
        Self::InvalidShape {
            layer: layer.into(),
            input: input.to_vec(),
            message: message.into(),
        }
    }

    /// Creates a configuration-file error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by the caller's configuration.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownArchitecture { .. } | Self::InvalidConfig { .. } | Self::Config { .. }
        )
    }

    /// Returns true for shape disagreements and shape-propagation failures.
    #[must_use]
    pub const fn is_shape_error(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. } | Self::InvalidShape { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape_mismatch("residual add", &[1, 64, 8, 8], &[1, 64, 16, 16]);
        let msg = err.to_string();
        assert!(msg.contains("Shape mismatch at residual add"));
        assert!(msg.contains("[1, 64, 16, 16]"));
    }

    #[test]
    fn test_error_categories() {
        assert!(Error::unknown_architecture("Foo").is_config_error());
        assert!(Error::invalid_config("channels must be positive").is_config_error());
        assert!(!Error::invalid_config("x").is_shape_error());
        assert!(Error::invalid_shape("MaxPool2d", &[1, 8, 1, 1], "window too large").is_shape_error());
        assert!(!Error::DeviceNotAvailable { device: Device::Cuda(3) }.is_config_error());
    }

    #[test]
    fn test_error_equality() {
        let err1 = Error::unknown_architecture("NotARealNet");
        let err2 = Error::unknown_architecture("NotARealNet");
        assert_eq!(err1, err2);
    }
}
