//! # Archforge - Network Architecture Factory
//!
//! Archforge builds image classifiers from a name and a handful of shape
//! parameters. Every network is shape-checked while it is assembled, so a
//! topology that cannot work is rejected before any data flows.
//!
//! ## Features
//!
//! - **Architectures**: MLP, ConvNet and its ablation family, LeNet, AlexNet,
//!   VGG11/13/16/19/S, ResNet6/18/34/50/101/152 with CIFAR, average-pool,
//!   Tiny and ImageNet stems
//! - **Residual blocks**: basic and bottleneck blocks whose shortcuts are
//!   verified against the main path
//! - **Shape inference**: every layer answers "which shape does this input
//!   become" without running a forward pass
//! - **Placement**: CPU/GPU assignment with replicated copies across GPUs
//! - **Configuration**: TOML files describing network and placement
//!
//! # Quick Start
//!
//! ```rust
//! use archforge::prelude::*;
//!
//! archforge::init_logging();
//!
//! let net = build("ConvNet", 10, 3, (32, 32), false).unwrap();
//! let logits = net.forward(&Tensor::zeros(&[2, 3, 32, 32])).unwrap();
//! assert_eq!(logits.shape(), &[2, 10]);
//!
//! for layer in net.summary().unwrap() {
//!     println!("{:<24} {:<12} {:?}", layer.path, layer.kind, layer.output_shape);
//! }
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

// =============================================================================
// Re-exports
// =============================================================================

pub use archforge_core as core;
pub use archforge_nn as nn;
pub use archforge_tensor as tensor;
pub use archforge_vision as vision;

pub use archforge_vision::{
    build, build_network, place, Architecture, FactoryConfig, Network, NetworkDescriptor,
    PlacementPolicy,
};

// =============================================================================
// Logging
// =============================================================================

/// Installs a `tracing` subscriber that honours `RUST_LOG`.
///
/// Defaults to `archforge=info` when `RUST_LOG` is unset. Safe to call more
/// than once; only the first call installs anything.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archforge=info,archforge_vision=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

// =============================================================================
// Prelude
// =============================================================================

/// Common imports.
pub mod prelude {
    pub use archforge_core::{Device, Error, Result};
    pub use archforge_nn::{LayerInfo, Module, Sequential};
    pub use archforge_tensor::Tensor;
    pub use archforge_vision::models::{BlockVariant, Downsample, NormKind};
    pub use archforge_vision::{
        build, build_network, place, Architecture, FactoryConfig, Network, NetworkDescriptor,
        PlacementPolicy,
    };
}

// =============================================================================
// Tests
// =============================================================================
