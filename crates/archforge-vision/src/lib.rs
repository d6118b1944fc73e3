//! Archforge Vision - Image Classifier Architecture Factory
//!
//! This crate turns a symbolic architecture name plus a few shape parameters
//! into a constructed, shape-checked network:
//!
//! - **Models**: MLP, ConvNet (and its ablations), LeNet, AlexNet, VGG, ResNet
//! - **Residual blocks**: basic/bottleneck blocks with verified shortcuts and
//!   two downsampling policies
//! - **Registry**: closed enumeration of architecture identifiers and the
//!   `build` factory
//! - **Placement**: CPU/GPU assignment and replication
//! - **Config**: TOML factory configuration
//!
//! # Example
//!
//! ```rust
//! use archforge_vision::prelude::*;
//!
//! let net = build("ResNet18BN", 10, 3, (32, 32), false).unwrap();
//! assert_eq!(net.output_shape(&[1, 3, 32, 32]).unwrap().as_slice(), &[1, 10]);
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
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]

pub mod config;
pub mod models;
pub mod placement;
pub mod probe;
pub mod registry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{FactoryConfig, NetworkConfig, PlacementConfig};

pub use models::{
    AlexNet, BlockConfig, BlockVariant, ConvNet, ConvNetConfig, Downsample, LeNet, NormKind,
    ResNet, ResNetConfig, ResNetDepth, ResNetStyle, ResidualBlock, Shortcut, StageConfig,
    VggConfig, VggVariant, MLP, VGG,
};

pub use placement::{place, PlacementPolicy};

pub use registry::{
    build, build_network, Architecture, ConvNetVariant, Network, NetworkDescriptor,
};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for building networks.
pub mod prelude {
    pub use crate::{
        build,
        build_network,
        Architecture,
        FactoryConfig,
        Network,
        NetworkDescriptor,
        NormKind,
        PlacementPolicy,
    };

    pub use archforge_core::{Device, Error, Result};
    pub use archforge_nn::Module;
    pub use archforge_tensor::Tensor;
}
