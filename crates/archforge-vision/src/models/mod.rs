//! Vision Models
//!
//! Architecture assemblers. Each one composes convolution stages, residual
//! blocks and a terminal classifier into a named, fully configured network.
//!
//! # Available Models
//!
//! - **`MLP`**: Three dense layers over the flattened image
//! - **`ConvNet`**: Shallow CNN whose classifier width is probed from its trunk
//! - **`LeNet`**: Classic two-stage 5x5 CNN
//! - **`AlexNet`**: Five-convolution CNN for small images
//! - **VGG**: Table-driven deep CNNs (VGG11, VGG13, VGG16, VGG19, VGGS)
//! - **`ResNet`**: Residual networks (`ResNet6` to `ResNet152`)
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

pub mod alexnet;
pub mod common;
pub mod convnet;
pub mod lenet;
pub mod resnet;
pub mod vgg;

pub use alexnet::AlexNet;
pub use common::{is_low_resolution, Activation, Norm2d, NormKind, Pooling};
pub use convnet::{ConvNet, ConvNetConfig};
pub use lenet::{LeNet, MLP};
pub use resnet::{
    make_stage, resnet18, resnet34, resnet50, BlockConfig, BlockVariant, Downsample, Projection,
    ResNet, ResNetConfig, ResNetDepth, ResNetStyle, ResidualBlock, Shortcut, StageConfig,
};
pub use vgg::{
    make_features, vgg11, vgg13, vgg16, vgg19, VggConfig, VggFeatures, VggLayer, VggVariant, VGG,
};
