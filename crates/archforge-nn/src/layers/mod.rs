//! Neural Network Layers
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

pub mod conv;
pub mod flatten;
pub mod linear;
pub mod norm;
pub mod pooling;

pub use conv::Conv2d;
pub use flatten::Flatten;
pub use linear::Linear;
pub use norm::{BatchNorm2d, GroupNorm};
pub use pooling::{AdaptiveAvgPool2d, AvgPool2d, MaxPool2d};
