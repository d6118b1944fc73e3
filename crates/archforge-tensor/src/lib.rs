//! Archforge Tensor - Dense Host Arrays for Network Construction
//!
//! This crate provides the `Tensor` type that backs every parameter and
//! activation in archforge, plus the shape arithmetic that layers use to
//! answer "what shape comes out if this shape goes in" without touching data.
//!
//! # Key Features
//! - Contiguous row-major f32 tensors tagged with a placement device
//! - Strict elementwise addition (no implicit broadcasting)
//! - Output-size arithmetic shared by convolution and pooling layers
//! - Random initialization helpers backed by `rand`/`rand_distr`
//!
//! # Example
//! ```rust
//! use archforge_tensor::{zeros, Tensor};
//!
//! let a = zeros(&[2, 3]);
//! let b = Tensor::from_vec(vec![1.0; 6], &[2, 3]).unwrap();
//! let c = a.add(&b).unwrap();
//! assert_eq!(c.to_vec(), vec![1.0; 6]);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]

// =============================================================================
// Modules
// =============================================================================

pub mod creation;
pub mod shape;
pub mod tensor;

// =============================================================================
// Re-exports
// =============================================================================

pub use archforge_core::{Device, Error, Result};
pub use creation::*;
pub use shape::{flattened_shape, numel, window_output, Shape};
pub use tensor::Tensor;

// =============================================================================
// Prelude
// =============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::shape::Shape;
    pub use crate::tensor::Tensor;
    pub use crate::{full, ones, rand, randn, uniform, zeros};
    pub use archforge_core::{Device, Error, Result};
}
