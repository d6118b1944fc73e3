//! Registry - Architecture Identifiers and the Network Factory
//!
//! Architecture names form a closed enumeration. [`Architecture`] parses the
//! textual identifiers (`ResNet18BN_AP`, `ConvNetD4`, `VGG11_Tiny`, ...) and
//! prints them back canonically; [`build_network`] maps each variant to its
//! assembler with an exhaustive match.
//!
//! # Example
//!
//! ```rust
//! use archforge_vision::registry::build;
//!
//! let net = build("ConvNet", 10, 3, (32, 32), false).unwrap();
//! assert_eq!(net.output_shape(&[1, 3, 32, 32]).unwrap().as_slice(), &[1, 10]);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::fmt;
use std::str::FromStr;

use archforge_core::{Device, Error, Result};
use archforge_nn::{LayerInfo, Module, Parameter};
use archforge_tensor::{Shape, Tensor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{
    Activation, AlexNet, ConvNet, ConvNetConfig, LeNet, NormKind, Pooling, ResNet, ResNetConfig,
    ResNetDepth, ResNetStyle, VggConfig, VggVariant, MLP, VGG,
};
use crate::placement::{self, PlacementPolicy};

// =============================================================================
// ConvNet Ablations
// =============================================================================

/// Stage counts accepted by `ConvNetD{n}`.
pub const CONVNET_DEPTHS: std::ops::RangeInclusive<usize> = 1..=8;

/// Widths accepted by `ConvNetW{n}`.
pub const CONVNET_WIDTHS: [usize; 6] = [32, 64, 128, 256, 512, 1024];

/// Width of the `ConvNetKIP` variant.
pub const KIP_WIDTH: usize = 1024;

/// One member of the ConvNet ablation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvNetVariant {
    /// `ConvNet`: two stages, batch norm, ReLU, max pool.
    Standard,
    /// `ConvNetD{n}`: `n` stages.
    Depth(usize),
    /// `ConvNetW{n}`: two stages of width `n`.
    Width(usize),
    /// `ConvNetNN/BN/LN/IN/GN`: alternative normalization.
    Norm(NormKind),
    /// `ConvNetAS/AR/AL`: alternative activation.
    Activation(Activation),
    /// `ConvNetNP/MP/AP`: alternative pooling.
    Pooling(Pooling),
    /// `ConvNetKIP`: wide and unnormalized.
    Kip,
}

impl ConvNetVariant {
    /// Stage recipe for this variant.
    pub fn config(self) -> ConvNetConfig {
        match self {
            Self::Standard => ConvNetConfig::standard(),
            Self::Depth(depth) => ConvNetConfig::with_depth(depth),
            Self::Width(width) => ConvNetConfig::with_width(width),
            Self::Norm(norm) => ConvNetConfig::standard().norm(norm),
            Self::Activation(act) => ConvNetConfig::standard().activation(act),
            Self::Pooling(pool) => ConvNetConfig::standard().pooling(pool),
            Self::Kip => ConvNetConfig::with_width(KIP_WIDTH).norm(NormKind::None),
        }
    }

    fn parse(suffix: &str) -> Option<Self> {
        let variant = match suffix {
            "" => Self::Standard,
            "NN" => Self::Norm(NormKind::None),
            "BN" => Self::Norm(NormKind::Batch),
            "LN" => Self::Norm(NormKind::Layer),
            "IN" => Self::Norm(NormKind::Instance),
            "GN" => Self::Norm(NormKind::Group),
            "AS" => Self::Activation(Activation::Sigmoid),
            "AR" => Self::Activation(Activation::Relu),
            "AL" => Self::Activation(Activation::LeakyRelu),
            "NP" => Self::Pooling(Pooling::None),
            "MP" => Self::Pooling(Pooling::Max),
            "AP" => Self::Pooling(Pooling::Avg),
            "KIP" => Self::Kip,
            _ => {
                if let Some(n) = suffix.strip_prefix('D').and_then(parse_number) {
                    return CONVNET_DEPTHS.contains(&n).then_some(Self::Depth(n));
                }
                if let Some(n) = suffix.strip_prefix('W').and_then(parse_number) {
                    return CONVNET_WIDTHS.contains(&n).then_some(Self::Width(n));
                }
                return None;
            }
        };
        Some(variant)
    }
}

impl fmt::Display for ConvNetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => Ok(()),
            Self::Depth(n) => write!(f, "D{n}"),
            Self::Width(n) => write!(f, "W{n}"),
            Self::Norm(norm) => f.write_str(match norm {
                NormKind::None => "NN",
                NormKind::Batch => "BN",
                NormKind::Layer => "LN",
                NormKind::Instance => "IN",
                NormKind::Group => "GN",
            }),
            Self::Activation(act) => f.write_str(match act {
                Activation::Sigmoid => "AS",
                Activation::Relu => "AR",
                Activation::LeakyRelu => "AL",
            }),
            Self::Pooling(pool) => f.write_str(match pool {
                Pooling::None => "NP",
                Pooling::Max => "MP",
                Pooling::Avg => "AP",
            }),
            Self::Kip => f.write_str("KIP"),
        }
    }
}

/// Parses a run of ASCII digits without sign, `+` or leading zeros.
fn parse_number(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

// =============================================================================
// Architecture
// =============================================================================

/// Every architecture the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Architecture {
    /// Three-layer perceptron.
    Mlp,
    /// Shallow probed CNN and its ablations.
    ConvNet(ConvNetVariant),
    /// LeNet-5.
    LeNet,
    /// Small-image AlexNet.
    AlexNet,
    /// VGG family.
    Vgg {
        /// Depth table.
        variant: VggVariant,
        /// `BN` suffix: batch norm instead of instance norm.
        batch_norm: bool,
        /// `_Tiny` suffix: extra final downsampling for 64x64 inputs.
        tiny: bool,
    },
    /// ResNet family.
    ResNet {
        /// Depth variant.
        depth: ResNetDepth,
        /// `BN` suffix: batch norm instead of instance norm.
        batch_norm: bool,
        /// Stem and downsampling flavour.
        style: ResNetStyle,
    },
}

impl Architecture {
    /// Normalization the architecture uses when the descriptor does not
    /// override it. `None` for architectures without normalization layers.
    pub fn default_norm(&self) -> Option<NormKind> {
        match self {
            Self::Mlp | Self::LeNet | Self::AlexNet => None,
            Self::ConvNet(variant) => Some(variant.config().norm),
            Self::Vgg { batch_norm, .. } | Self::ResNet { batch_norm, .. } => Some(if *batch_norm {
                NormKind::Batch
            } else {
                NormKind::Instance
            }),
        }
    }

    /// Returns true for the residual family.
    pub fn is_residual(&self) -> bool {
        matches!(self, Self::ResNet { .. })
    }

    fn parse_vgg(rest: &str) -> Option<Self> {
        let (variant, rest) = [
            ("11", VggVariant::Vgg11),
            ("13", VggVariant::Vgg13),
            ("16", VggVariant::Vgg16),
            ("19", VggVariant::Vgg19),
            ("S", VggVariant::Small),
        ]
        .into_iter()
        .find_map(|(tag, v)| rest.strip_prefix(tag).map(|r| (v, r)))?;

        let (batch_norm, rest) = strip_flag(rest, "BN");
        let (tiny, rest) = strip_flag(rest, "_Tiny");
        rest.is_empty().then_some(Self::Vgg {
            variant,
            batch_norm,
            tiny,
        })
    }

    fn parse_resnet(rest: &str) -> Option<Self> {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let depth = ResNetDepth::from_layers(parse_number(&rest[..digits])?)?;
        let (batch_norm, rest) = strip_flag(&rest[digits..], "BN");
        let style = match rest {
            "" => ResNetStyle::Cifar,
            "_AP" => ResNetStyle::AvgPool,
            "_Tiny" => ResNetStyle::Tiny,
            "ImageNet" => ResNetStyle::ImageNet,
            _ => return None,
        };
        Some(Self::ResNet {
            depth,
            batch_norm,
            style,
        })
    }
}

fn strip_flag<'a>(s: &'a str, flag: &str) -> (bool, &'a str) {
    match s.strip_prefix(flag) {
        Some(rest) => (true, rest),
        None => (false, s),
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let parsed = match name {
            "MLP" => Some(Self::Mlp),
            "LeNet" => Some(Self::LeNet),
            "AlexNet" | "alexnet" => Some(Self::AlexNet),
            _ => {
                if let Some(rest) = name.strip_prefix("ConvNet") {
                    ConvNetVariant::parse(rest).map(Self::ConvNet)
                } else if let Some(rest) = name.strip_prefix("VGG") {
                    Self::parse_vgg(rest)
                } else if let Some(rest) = name.strip_prefix("ResNet") {
                    Self::parse_resnet(rest)
                } else {
                    None
                }
            }
        };
        parsed.ok_or_else(|| Error::unknown_architecture(name))
    }
}

impl TryFrom<String> for Architecture {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<Architecture> for String {
    fn from(arch: Architecture) -> Self {
        arch.to_string()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mlp => f.write_str("MLP"),
            Self::ConvNet(variant) => write!(f, "ConvNet{variant}"),
            Self::LeNet => f.write_str("LeNet"),
            Self::AlexNet => f.write_str("AlexNet"),
            Self::Vgg {
                variant,
                batch_norm,
                tiny,
            } => write!(
                f,
                "{variant}{}{}",
                if *batch_norm { "BN" } else { "" },
                if *tiny { "_Tiny" } else { "" }
            ),
            Self::ResNet {
                depth,
                batch_norm,
                style,
            } => write!(
                f,
                "ResNet{}{}{}",
                depth.layers(),
                if *batch_norm { "BN" } else { "" },
                style.suffix()
            ),
        }
    }
}

// =============================================================================
// Network Descriptor
// =============================================================================

/// Everything needed to construct one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Which architecture to build.
    pub architecture: Architecture,
    /// Channels of the input image.
    pub input_channels: usize,
    /// Width of the classifier output.
    pub num_classes: usize,
    /// Input height and width.
    pub input_size: (usize, usize),
    /// Normalization override; `None` keeps the architecture's default.
    #[serde(default)]
    pub norm: Option<NormKind>,
}

impl NetworkDescriptor {
    /// Creates a descriptor with the architecture's default normalization.
    pub fn new(
        architecture: Architecture,
        input_channels: usize,
        num_classes: usize,
        input_size: (usize, usize),
    ) -> Self {
        Self {
            architecture,
            input_channels,
            num_classes,
            input_size,
            norm: None,
        }
    }

    /// Overrides the normalization.
    pub fn with_norm(mut self, norm: NormKind) -> Self {
        self.norm = Some(norm);
        self
    }

    /// Checks that channel, class and resolution values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.input_channels == 0 {
            return Err(Error::invalid_config("input channel count must be at least 1"));
        }
        if self.num_classes == 0 {
            return Err(Error::invalid_config("class count must be at least 1"));
        }
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            return Err(Error::invalid_config(format!(
                "input resolution must be non-zero, got {:?}",
                self.input_size
            )));
        }
        Ok(())
    }

    /// Normalization the built network uses.
    pub fn resolved_norm(&self) -> Option<NormKind> {
        self.architecture.default_norm().map(|default| self.norm.unwrap_or(default))
    }

    /// Input shape of a single-sample batch.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.input_channels, self.input_size.0, self.input_size.1]
    }
}

// =============================================================================
// Network
// =============================================================================

/// A constructed network together with its descriptor and placement.
pub struct Network {
    model: Box<dyn Module>,
    descriptor: NetworkDescriptor,
    device: Device,
    replicas: Vec<Network>,
}

impl Network {
    pub(crate) fn new(model: Box<dyn Module>, descriptor: NetworkDescriptor) -> Self {
        Self {
            model,
            descriptor,
            device: Device::Cpu,
            replicas: Vec::new(),
        }
    }

    /// Runs the forward pass.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.model.forward(input)
    }

    /// Output shape for `input`.
    pub fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        self.model.output_shape(input)
    }

    /// Number of trainable parameters.
    pub fn num_parameters(&self) -> usize {
        self.model.num_parameters()
    }

    /// All parameters, in a stable order.
    pub fn parameters(&self) -> Vec<Parameter> {
        self.model.parameters()
    }

    /// Width of the classifier output.
    pub fn num_classes(&self) -> usize {
        self.descriptor.num_classes
    }

    /// One row per leaf layer for the descriptor's input resolution.
    pub fn summary(&self) -> Result<Vec<LayerInfo>> {
        let mut rows = Vec::new();
        self.model
            .summarize(&self.descriptor.input_shape(), "", &mut rows)?;
        Ok(rows)
    }

    /// Device holding the primary copy.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Additional copies on other devices.
    pub fn replicas(&self) -> &[Network] {
        &self.replicas
    }

    /// The descriptor this network was built from.
    pub fn descriptor(&self) -> &NetworkDescriptor {
        &self.descriptor
    }

    /// The architecture this network was built from.
    pub fn architecture(&self) -> Architecture {
        self.descriptor.architecture
    }

    /// The underlying module.
    pub fn model(&self) -> &dyn Module {
        self.model.as_ref()
    }

    /// Switches between training and evaluation mode.
    pub fn set_training(&mut self, training: bool) {
        self.model.set_training(training);
        for replica in &mut self.replicas {
            replica.set_training(training);
        }
    }

    /// Moves the primary copy to `device`.
    pub fn to_device(&mut self, device: Device) -> Result<()> {
        if !device.is_available() {
            return Err(Error::DeviceNotAvailable { device });
        }
        self.move_to(device);
        Ok(())
    }

    pub(crate) fn move_to(&mut self, device: Device) {
        self.model.to_device(device);
        self.device = device;
    }

    pub(crate) fn set_replicas(&mut self, replicas: Vec<Network>) {
        self.replicas = replicas;
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("architecture", &self.descriptor.architecture.to_string())
            .field("device", &self.device)
            .field("replicas", &self.replicas.len())
            .field("parameters", &self.num_parameters())
            .finish()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Builds the network a descriptor describes, on the CPU.
pub fn build_network(descriptor: &NetworkDescriptor) -> Result<Network> {
    descriptor.validate()?;

    let NetworkDescriptor {
        architecture,
        input_channels: channels,
        num_classes: classes,
        input_size: size,
        ..
    } = *descriptor;
    let norm = descriptor.resolved_norm();
    if norm.is_none() && descriptor.norm.is_some() {
        debug!(%architecture, "architecture has no normalization layers; override ignored");
    }
    let norm = norm.unwrap_or(NormKind::None);

    let model: Box<dyn Module> = match architecture {
        Architecture::Mlp => Box::new(MLP::new(channels, classes, size)),
        Architecture::ConvNet(variant) => Box::new(ConvNet::new(
            variant.config().norm(norm),
            channels,
            classes,
            size,
        )?),
        Architecture::LeNet => Box::new(LeNet::new(channels, classes, size)?),
        Architecture::AlexNet => Box::new(AlexNet::new(channels, classes, size)?),
        Architecture::Vgg { variant, tiny, .. } => Box::new(VGG::new(
            VggConfig {
                variant,
                norm,
                tiny,
            },
            channels,
            classes,
            size,
        )?),
        Architecture::ResNet { depth, style, .. } => Box::new(ResNet::new(
            ResNetConfig { depth, style, norm },
            channels,
            classes,
            size,
        )?),
    };

    let network = Network::new(model, descriptor.clone());
    info!(
        %architecture,
        channels,
        classes,
        height = size.0,
        width = size.1,
        parameters = network.num_parameters(),
        "network built"
    );
    Ok(network)
}

/// Builds the named network and places it.
///
/// With `distribute` set, the network goes to the first visible GPU and is
/// replicated across the rest; otherwise it stays on the CPU.
pub fn build(
    name: &str,
    num_classes: usize,
    channel: usize,
    input_size: (usize, usize),
    distribute: bool,
) -> Result<Network> {
    let architecture: Architecture = name.parse()?;
    let descriptor = NetworkDescriptor::new(architecture, channel, num_classes, input_size);
    let network = build_network(&descriptor)?;
    placement::place(network, &PlacementPolicy::detect(distribute))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &[
        "MLP",
        "ConvNet",
        "ConvNetD1",
        "ConvNetD8",
        "ConvNetW1024",
        "ConvNetNN",
        "ConvNetGN",
        "ConvNetAL",
        "ConvNetNP",
        "ConvNetKIP",
        "LeNet",
        "AlexNet",
        "VGG11",
        "VGG11BN",
        "VGG11_Tiny",
        "VGG16BN_Tiny",
        "VGGS",
        "ResNet6",
        "ResNet18BN_AP",
        "ResNet18_Tiny",
        "ResNet50",
        "ResNet152BN",
        "ResNet18ImageNet",
        "ResNet6BNImageNet",
    ];

    #[test]
    fn test_names_round_trip() {
        for name in NAMES {
            let arch: Architecture = name.parse().unwrap();
            assert_eq!(arch.to_string(), *name);
        }
    }

    #[test]
    fn test_alexnet_alias() {
        assert_eq!("alexnet".parse::<Architecture>().unwrap(), Architecture::AlexNet);
    }

    #[test]
    fn test_unknown_names() {
        for name in [
            "NotARealNet",
            "",
            "ResNet",
            "ResNet20",
            "ResNet18_XL",
            "ResNet+18",
            "VGG12",
            "VGG11_TinyBN",
            "ConvNetD9",
            "ConvNetW48",
            "ConvNetD",
            "convnet",
            "ResNet018",
            "ResNet018BN",
            "ConvNetW0128",
            "ConvNetD03",
        ] {
            let err = name.parse::<Architecture>().unwrap_err();
            assert!(matches!(err, Error::UnknownArchitecture { .. }), "{name}");
        }
    }

    #[test]
    fn test_parsed_fields() {
        assert_eq!(
            "ResNet34BN_AP".parse::<Architecture>().unwrap(),
            Architecture::ResNet {
                depth: ResNetDepth::R34,
                batch_norm: true,
                style: ResNetStyle::AvgPool,
            }
        );
        assert_eq!(
            "ConvNetW128".parse::<Architecture>().unwrap(),
            Architecture::ConvNet(ConvNetVariant::Width(128))
        );
    }

    #[test]
    fn test_default_norms() {
        let norm = |name: &str| name.parse::<Architecture>().unwrap().default_norm();
        assert_eq!(norm("VGG11"), Some(NormKind::Instance));
        assert_eq!(norm("VGG11BN"), Some(NormKind::Batch));
        assert_eq!(norm("ResNet18"), Some(NormKind::Instance));
        assert_eq!(norm("ConvNet"), Some(NormKind::Batch));
        assert_eq!(norm("ConvNetKIP"), Some(NormKind::None));
        assert_eq!(norm("LeNet"), None);
    }

    #[test]
    fn test_descriptor_validation() {
        let arch = Architecture::Mlp;
        assert!(NetworkDescriptor::new(arch, 0, 10, (28, 28)).validate().is_err());
        assert!(NetworkDescriptor::new(arch, 1, 0, (28, 28)).validate().is_err());
        assert!(NetworkDescriptor::new(arch, 1, 10, (0, 28)).validate().is_err());
        assert!(NetworkDescriptor::new(arch, 1, 10, (28, 28)).validate().is_ok());
    }

    #[test]
    fn test_norm_override() {
        let descriptor = NetworkDescriptor::new(Architecture::ConvNet(ConvNetVariant::Standard), 3, 10, (32, 32))
            .with_norm(NormKind::Group);
        assert_eq!(descriptor.resolved_norm(), Some(NormKind::Group));
        let net = build_network(&descriptor).unwrap();
        let rows = net.summary().unwrap();
        assert!(rows.iter().any(|r| r.kind == "GroupNorm"));
        assert!(!rows.iter().any(|r| r.kind == "BatchNorm2d"));
    }

    #[test]
    fn test_build_network_stays_on_cpu() {
        let descriptor = NetworkDescriptor::new(Architecture::LeNet, 1, 10, (28, 28));
        let net = build_network(&descriptor).unwrap();
        assert_eq!(net.device(), Device::Cpu);
        assert!(net.replicas().is_empty());
        assert_eq!(net.num_classes(), 10);
    }

    #[test]
    fn test_descriptor_serde() {
        let descriptor = NetworkDescriptor::new("ResNet18BN".parse().unwrap(), 3, 100, (32, 32));
        let text = toml::to_string(&descriptor).unwrap();
        assert!(text.contains("architecture = \"ResNet18BN\""));
        let back: NetworkDescriptor = toml::from_str(&text).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_unavailable_device() {
        let mut net = build_network(&NetworkDescriptor::new(Architecture::Mlp, 1, 10, (8, 8))).unwrap();
        let err = net.to_device(Device::Cuda(usize::MAX)).unwrap_err();
        assert!(matches!(err, Error::DeviceNotAvailable { .. }));
        assert_eq!(net.device(), Device::Cpu);
    }
}
