//! `ResNet` - Deep Residual Networks
//!
//! Residual blocks, the stage assembler that chains them, and the `ResNet`
//! assembler with its three stems.
//!
//! # Supported Variants
//!
//! - `ResNet6`: [1, 1, 1, 1] basic blocks
//! - `ResNet18`: [2, 2, 2, 2] basic blocks
//! - `ResNet34`: [3, 4, 6, 3] basic blocks
//! - `ResNet50`: [3, 4, 6, 3] bottleneck blocks
//! - `ResNet101`: [3, 4, 23, 3] bottleneck blocks
//! - `ResNet152`: [3, 8, 36, 3] bottleneck blocks
//!
//! Each depth can use the CIFAR stem, the stride-2 `Tiny` stem, the ImageNet
//! stem, or the CIFAR stem with average-pool downsampling (`_AP`).
//!
//! # Reference
//!
//! "Deep Residual Learning for Image Recognition" (He et al., 2015)
//! <https://arxiv.org/abs/1512.03385>
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::HashMap;
use std::fmt;

use archforge_core::{Device, Error, Result};
use archforge_nn::{
    child_path, AdaptiveAvgPool2d, AvgPool2d, Conv2d, Flatten, LayerInfo, Linear, MaxPool2d,
    Module, Parameter, ReLU, Sequential,
};
use archforge_tensor::{Shape, Tensor};
use tracing::debug;

use super::common::{Norm2d, NormKind};

// =============================================================================
// Block Configuration
// =============================================================================

/// Residual block flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockVariant {
    /// Two 3x3 convolutions.
    Basic,
    /// 1x1 reduce, 3x3, 1x1 expand.
    Bottleneck,
}

impl BlockVariant {
    /// Output width multiplier relative to the block's base width.
    pub const fn expansion(self) -> usize {
        match self {
            Self::Basic => 1,
            Self::Bottleneck => 4,
        }
    }
}

/// How a block reduces resolution when its stride is not 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Downsample {
    /// The stride sits in a 3x3 convolution and in the 1x1 projection.
    #[default]
    StridedConv,
    /// Convolutions keep stride 1; a 2x2 average pool does the reduction on
    /// both the main path and the projection.
    AvgPool,
}

/// Construction parameters of one residual block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    /// Width of the incoming feature map.
    pub in_channels: usize,
    /// Base width; the block outputs `width * expansion` channels.
    pub width: usize,
    /// Spatial reduction factor of the block.
    pub stride: usize,
    /// Normalization after each convolution.
    pub norm: NormKind,
    /// Reduction policy.
    pub downsample: Downsample,
}

impl BlockConfig {
    /// Instance-normalized, strided-convolution block.
    pub fn new(in_channels: usize, width: usize, stride: usize) -> Self {
        Self {
            in_channels,
            width,
            stride,
            norm: NormKind::Instance,
            downsample: Downsample::StridedConv,
        }
    }

    /// Replaces the normalization.
    pub fn norm(mut self, norm: NormKind) -> Self {
        self.norm = norm;
        self
    }

    /// Replaces the downsampling policy.
    pub fn downsample(mut self, downsample: Downsample) -> Self {
        self.downsample = downsample;
        self
    }

    /// Output width for `variant`.
    pub fn out_channels(&self, variant: BlockVariant) -> usize {
        self.width * variant.expansion()
    }

    /// Whether the shortcut must project to match the main path.
    pub fn needs_projection(&self, variant: BlockVariant) -> bool {
        self.stride != 1 || self.in_channels != self.out_channels(variant)
    }

    fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.width == 0 || self.stride == 0 {
            return Err(Error::invalid_config(format!(
                "residual block needs non-zero widths and stride, got {self:?}"
            )));
        }
        if self.downsample == Downsample::AvgPool && self.stride > 2 {
            return Err(Error::invalid_config(format!(
                "average-pool downsampling reduces by 2, cannot realize stride {}",
                self.stride
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Shortcut
// =============================================================================

/// 1x1 projection used when the shortcut must change width or resolution.
pub struct Projection {
    conv: Conv2d,
    pool: Option<AvgPool2d>,
    norm: Norm2d,
    reduction: usize,
    training: bool,
}

impl Projection {
    /// Builds the projection for `config`'s policy.
    pub fn new(config: &BlockConfig, out_channels: usize) -> Result<Self> {
        let (conv_stride, pool) = match config.downsample {
            Downsample::StridedConv => (config.stride, None),
            Downsample::AvgPool if config.stride != 1 => (1, Some(AvgPool2d::new(2))),
            Downsample::AvgPool => (1, None),
        };
        Ok(Self {
            conv: Conv2d::square(config.in_channels, out_channels, 1, conv_stride, 0, false),
            pool,
            norm: config.norm.build(out_channels)?,
            reduction: config.stride,
            training: true,
        })
    }

    /// Input width.
    pub fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    /// Output width.
    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }

    /// Spatial reduction factor.
    pub fn reduction(&self) -> usize {
        self.reduction
    }

    fn children(&self) -> Vec<(&'static str, &dyn Module)> {
        let mut children: Vec<(&'static str, &dyn Module)> = vec![("conv", &self.conv as &dyn Module)];
        if let Some(pool) = &self.pool {
            children.push(("pool", pool));
        }
        children.push(("norm", &self.norm));
        children
    }
}

impl Module for Projection {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (_, child) in self.children() {
            x = child.forward(&x)?;
        }
        Ok(x)
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let mut shape = Shape::from_slice(input);
        for (_, child) in self.children() {
            shape = child.output_shape(&shape)?;
        }
        Ok(shape)
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.children()
            .into_iter()
            .flat_map(|(_, c)| c.parameters())
            .collect()
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        for (name, child) in self.children() {
            for (param, p) in child.named_parameters() {
                params.insert(format!("{name}.{param}"), p);
            }
        }
        params
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.norm.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn to_device(&self, device: Device) {
        for (_, child) in self.children() {
            child.to_device(device);
        }
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let mut shape = Shape::from_slice(input);
        for (name, child) in self.children() {
            shape = child.summarize(&shape, &child_path(path, name), out)?;
        }
        Ok(shape)
    }

    fn name(&self) -> &'static str {
        "Projection"
    }
}

/// Shortcut branch of a residual block.
pub enum Shortcut {
    /// Pass the input through unchanged.
    Identity,
    /// Project the input to the main path's shape.
    Projection(Projection),
}

impl Shortcut {
    /// Chooses identity or projection for `config`.
    pub fn for_block(config: &BlockConfig, variant: BlockVariant) -> Result<Self> {
        if config.needs_projection(variant) {
            Ok(Self::Projection(Projection::new(config, config.out_channels(variant))?))
        } else {
            Ok(Self::Identity)
        }
    }

    /// Returns true for the identity shortcut.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// (input channels, output channels, spatial reduction) this shortcut
    /// accepts and produces when fed `in_channels`.
    fn signature(&self, in_channels: usize) -> [usize; 3] {
        match self {
            Self::Identity => [in_channels, in_channels, 1],
            Self::Projection(p) => [p.in_channels(), p.out_channels(), p.reduction()],
        }
    }

    fn as_module(&self) -> Option<&dyn Module> {
        match self {
            Self::Identity => None,
            Self::Projection(p) => Some(p),
        }
    }
}

impl Module for Shortcut {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match self.as_module() {
            Some(p) => p.forward(input),
            None => Ok(input.clone()),
        }
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        match self.as_module() {
            Some(p) => p.output_shape(input),
            None => Ok(Shape::from_slice(input)),
        }
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.as_module().map(|p| p.parameters()).unwrap_or_default()
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        self.as_module()
            .map(|p| p.named_parameters())
            .unwrap_or_default()
    }

    fn set_training(&mut self, training: bool) {
        if let Self::Projection(p) = self {
            p.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.as_module().map_or(true, |p| p.is_training())
    }

    fn to_device(&self, device: Device) {
        if let Some(p) = self.as_module() {
            p.to_device(device);
        }
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        match self.as_module() {
            Some(p) => p.summarize(input, path, out),
            None => Ok(Shape::from_slice(input)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Projection(_) => "Projection",
        }
    }
}

// =============================================================================
// Residual Block
// =============================================================================

const RESIDUAL_ADD: &str = "residual add";

/// One residual unit: `relu(main(x) + shortcut(x))`.
///
/// Basic structure: conv3x3 -> norm -> ReLU -> conv3x3 -> norm
/// Bottleneck structure: conv1x1 -> norm -> ReLU -> conv3x3 -> norm -> ReLU -> conv1x1 -> norm
///
/// Under [`Downsample::AvgPool`] a 2x2 average pool follows the first
/// activation (basic) or the second (bottleneck) when the stride is not 1.
pub struct ResidualBlock {
    variant: BlockVariant,
    config: BlockConfig,
    main: Sequential,
    shortcut: Shortcut,
}

impl ResidualBlock {
    /// Builds a block with the shortcut the configuration calls for.
    pub fn new(variant: BlockVariant, config: BlockConfig) -> Result<Self> {
        config.validate()?;
        let shortcut = Shortcut::for_block(&config, variant)?;
        Self::with_shortcut(variant, config, shortcut)
    }

    /// Builds a block around a caller-supplied shortcut.
    ///
    /// Fails with a `residual add` shape mismatch when the shortcut cannot
    /// produce the main path's width and resolution.
    pub fn with_shortcut(variant: BlockVariant, config: BlockConfig, shortcut: Shortcut) -> Result<Self> {
        config.validate()?;
        let out_channels = config.out_channels(variant);
        let expected = [config.in_channels, out_channels, config.stride];
        let actual = shortcut.signature(config.in_channels);
        if expected != actual {
            return Err(Error::shape_mismatch(RESIDUAL_ADD, &expected, &actual));
        }

        let main = match variant {
            BlockVariant::Basic => basic_main_path(&config)?,
            BlockVariant::Bottleneck => bottleneck_main_path(&config)?,
        };

        Ok(Self {
            variant,
            config,
            main,
            shortcut,
        })
    }

    /// Block flavour.
    pub fn variant(&self) -> BlockVariant {
        self.variant
    }

    /// Construction parameters.
    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    /// Output width.
    pub fn out_channels(&self) -> usize {
        self.config.out_channels(self.variant)
    }

    /// The shortcut branch.
    pub fn shortcut(&self) -> &Shortcut {
        &self.shortcut
    }

    /// Output shapes of the main path and the shortcut for `input`.
    pub fn branch_shapes(&self, input: &[usize]) -> Result<(Shape, Shape)> {
        Ok((
            self.main.output_shape(input)?,
            self.shortcut.output_shape(input)?,
        ))
    }
}

fn stride_and_pool(config: &BlockConfig) -> (usize, bool) {
    match config.downsample {
        Downsample::StridedConv => (config.stride, false),
        Downsample::AvgPool => (1, config.stride != 1),
    }
}

fn basic_main_path(config: &BlockConfig) -> Result<Sequential> {
    let width = config.width;
    let (stride, pool) = stride_and_pool(config);

    let mut main = Sequential::new()
        .add_named("conv1", Conv2d::square(config.in_channels, width, 3, stride, 1, false))
        .add_named("bn1", config.norm.build(width)?)
        .add_named("relu1", ReLU);
    if pool {
        main.push_named("pool", AvgPool2d::new(2));
    }
    main.push_named("conv2", Conv2d::square(width, width, 3, 1, 1, false));
    main.push_named("bn2", config.norm.build(width)?);
    Ok(main)
}

fn bottleneck_main_path(config: &BlockConfig) -> Result<Sequential> {
    let width = config.width;
    let out = config.out_channels(BlockVariant::Bottleneck);
    let (stride, pool) = stride_and_pool(config);

    let mut main = Sequential::new()
        .add_named("conv1", Conv2d::square(config.in_channels, width, 1, 1, 0, false))
        .add_named("bn1", config.norm.build(width)?)
        .add_named("relu1", ReLU)
        .add_named("conv2", Conv2d::square(width, width, 3, stride, 1, false))
        .add_named("bn2", config.norm.build(width)?)
        .add_named("relu2", ReLU);
    if pool {
        main.push_named("pool", AvgPool2d::new(2));
    }
    main.push_named("conv3", Conv2d::square(width, out, 1, 1, 0, false));
    main.push_named("bn3", config.norm.build(out)?);
    Ok(main)
}

fn check_residual(main: &[usize], shortcut: &[usize]) -> Result<()> {
    if main != shortcut {
        return Err(Error::shape_mismatch(RESIDUAL_ADD, main, shortcut));
    }
    Ok(())
}

impl Module for ResidualBlock {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let out = self.main.forward(input)?;
        let identity = self.shortcut.forward(input)?;
        check_residual(out.shape(), identity.shape())?;
        Ok(out.add(&identity)?.relu())
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let (main, shortcut) = self.branch_shapes(input)?;
        check_residual(&main, &shortcut)?;
        Ok(main)
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params = self.main.parameters();
        params.extend(self.shortcut.parameters());
        params
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = self.main.named_parameters();
        for (name, p) in self.shortcut.named_parameters() {
            params.insert(format!("shortcut.{name}"), p);
        }
        params
    }

    fn set_training(&mut self, training: bool) {
        self.main.set_training(training);
        self.shortcut.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.main.is_training()
    }

    fn to_device(&self, device: Device) {
        self.main.to_device(device);
        self.shortcut.to_device(device);
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let main = self.main.summarize(input, path, out)?;
        let shortcut = self
            .shortcut
            .summarize(input, &child_path(path, "shortcut"), out)?;
        check_residual(&main, &shortcut)?;
        Ok(main)
    }

    fn name(&self) -> &'static str {
        match self.variant {
            BlockVariant::Basic => "BasicBlock",
            BlockVariant::Bottleneck => "Bottleneck",
        }
    }
}

// =============================================================================
// Stage Assembler
// =============================================================================

/// One run of same-width residual blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// Block flavour.
    pub variant: BlockVariant,
    /// Number of blocks.
    pub blocks: usize,
    /// Base width of every block.
    pub width: usize,
    /// Stride of the first block; the rest use 1.
    pub first_stride: usize,
}

/// Builds a stage starting from a trunk of width `in_channels`.
///
/// Returns the stage and the trunk width after it, which the caller threads
/// into the next stage.
pub fn make_stage(
    stage: &StageConfig,
    in_channels: usize,
    norm: NormKind,
    downsample: Downsample,
) -> Result<(Sequential, usize)> {
    if stage.blocks == 0 {
        return Err(Error::invalid_config("a residual stage needs at least one block"));
    }

    let mut layers = Sequential::new();
    let mut width = in_channels;
    for i in 0..stage.blocks {
        let stride = if i == 0 { stage.first_stride } else { 1 };
        let config = BlockConfig {
            in_channels: width,
            width: stage.width,
            stride,
            norm,
            downsample,
        };
        let block = ResidualBlock::new(stage.variant, config)?;
        width = block.out_channels();
        layers.push(block);
    }

    Ok((layers, width))
}

// =============================================================================
// ResNet
// =============================================================================

/// Base widths of the four stages.
pub const STAGE_WIDTHS: [usize; 4] = [64, 128, 256, 512];

/// Width produced by every stem.
pub const STEM_WIDTH: usize = 64;

/// Depth variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResNetDepth {
    /// [1, 1, 1, 1] basic.
    R6,
    /// [2, 2, 2, 2] basic.
    R18,
    /// [3, 4, 6, 3] basic.
    R34,
    /// [3, 4, 6, 3] bottleneck.
    R50,
    /// [3, 4, 23, 3] bottleneck.
    R101,
    /// [3, 8, 36, 3] bottleneck.
    R152,
}

impl ResNetDepth {
    /// Every supported depth.
    pub const ALL: [Self; 6] = [Self::R6, Self::R18, Self::R34, Self::R50, Self::R101, Self::R152];

    /// Blocks per stage.
    pub fn blocks(self) -> [usize; 4] {
        match self {
            Self::R6 => [1, 1, 1, 1],
            Self::R18 => [2, 2, 2, 2],
            Self::R34 | Self::R50 => [3, 4, 6, 3],
            Self::R101 => [3, 4, 23, 3],
            Self::R152 => [3, 8, 36, 3],
        }
    }

    /// Block flavour.
    pub fn variant(self) -> BlockVariant {
        match self {
            Self::R6 | Self::R18 | Self::R34 => BlockVariant::Basic,
            Self::R50 | Self::R101 | Self::R152 => BlockVariant::Bottleneck,
        }
    }

    /// Nominal layer count.
    pub fn layers(self) -> usize {
        match self {
            Self::R6 => 6,
            Self::R18 => 18,
            Self::R34 => 34,
            Self::R50 => 50,
            Self::R101 => 101,
            Self::R152 => 152,
        }
    }

    /// Looks a depth up by layer count.
    pub fn from_layers(layers: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.layers() == layers)
    }
}

/// Stem and downsampling flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResNetStyle {
    /// 3x3 stride-1 stem, strided-conv downsampling (32x32 inputs).
    #[default]
    Cifar,
    /// CIFAR stem with average-pool downsampling.
    AvgPool,
    /// 3x3 stride-2 stem (64x64 inputs).
    Tiny,
    /// 7x7 stride-2 stem plus 3x3 max pool (224x224 inputs).
    ImageNet,
}

impl ResNetStyle {
    /// Downsampling policy used by every block and shortcut.
    pub fn downsample(self) -> Downsample {
        match self {
            Self::AvgPool => Downsample::AvgPool,
            Self::Cifar | Self::Tiny | Self::ImageNet => Downsample::StridedConv,
        }
    }

    /// Identifier suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Cifar => "",
            Self::AvgPool => "_AP",
            Self::Tiny => "_Tiny",
            Self::ImageNet => "ImageNet",
        }
    }

    fn stem(self, channels: usize, norm: NormKind) -> Result<Sequential> {
        let conv = match self {
            Self::Cifar | Self::AvgPool => Conv2d::square(channels, STEM_WIDTH, 3, 1, 1, false),
            Self::Tiny => Conv2d::square(channels, STEM_WIDTH, 3, 2, 1, false),
            Self::ImageNet => Conv2d::square(channels, STEM_WIDTH, 7, 2, 3, false),
        };
        let mut stem = Sequential::new()
            .add_named("conv1", conv)
            .add_named("bn1", norm.build(STEM_WIDTH)?)
            .add_named("relu", ReLU);
        if self == Self::ImageNet {
            stem.push_named("maxpool", MaxPool2d::with_options(3, 2, 1));
        }
        Ok(stem)
    }
}

/// Full ResNet recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResNetConfig {
    /// Depth variant.
    pub depth: ResNetDepth,
    /// Stem and downsampling flavour.
    pub style: ResNetStyle,
    /// Normalization after each convolution.
    pub norm: NormKind,
}

impl ResNetConfig {
    /// Instance-normalized CIFAR-style network of the given depth.
    pub fn new(depth: ResNetDepth) -> Self {
        Self {
            depth,
            style: ResNetStyle::Cifar,
            norm: NormKind::Instance,
        }
    }
}

impl fmt::Display for ResNetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResNet{}{}", self.depth.layers(), self.style.suffix())
    }
}

/// ResNet model.
pub struct ResNet {
    stem: Sequential,
    layers: Vec<Sequential>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear,
    config: ResNetConfig,
}

impl ResNet {
    /// Builds a ResNet and checks it against a `channels x H x W` input.
    pub fn new(
        config: ResNetConfig,
        channels: usize,
        num_classes: usize,
        input_size: (usize, usize),
    ) -> Result<Self> {
        let stem = config.style.stem(channels, config.norm)?;
        let variant = config.depth.variant();

        let mut layers = Vec::with_capacity(4);
        let mut width = STEM_WIDTH;
        for (i, (&blocks, &base)) in config.depth.blocks().iter().zip(&STAGE_WIDTHS).enumerate() {
            let stage = StageConfig {
                variant,
                blocks,
                width: base,
                first_stride: if i == 0 { 1 } else { 2 },
            };
            let (layer, next) = make_stage(&stage, width, config.norm, config.style.downsample())?;
            debug!(stage = i + 1, blocks, in_channels = width, out_channels = next, "residual stage built");
            width = next;
            layers.push(layer);
        }

        let net = Self {
            stem,
            layers,
            avgpool: AdaptiveAvgPool2d::square(1),
            fc: Linear::new(width, num_classes),
            config,
        };
        net.output_shape(&[1, channels, input_size.0, input_size.1])?;
        Ok(net)
    }

    /// The recipe this network was built from.
    pub fn config(&self) -> ResNetConfig {
        self.config
    }

    /// The four residual stages.
    pub fn stages(&self) -> &[Sequential] {
        &self.layers
    }

    /// Classifier input width (512 x expansion).
    pub fn feature_width(&self) -> usize {
        self.fc.in_features()
    }

    fn trunk_children(&self) -> Vec<(String, &dyn Module)> {
        let mut children: Vec<(String, &dyn Module)> = vec![("stem".to_string(), &self.stem as &dyn Module)];
        for (i, layer) in self.layers.iter().enumerate() {
            children.push((format!("layer{}", i + 1), layer));
        }
        children.push(("avgpool".to_string(), &self.avgpool));
        children
    }
}

impl Module for ResNet {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (_, child) in self.trunk_children() {
            x = child.forward(&x)?;
        }
        let x = Flatten.forward(&x)?;
        self.fc.forward(&x)
    }

    fn output_shape(&self, input: &[usize]) -> Result<Shape> {
        let mut shape = Shape::from_slice(input);
        for (_, child) in self.trunk_children() {
            shape = child.output_shape(&shape)?;
        }
        let shape = Flatten.output_shape(&shape)?;
        self.fc.output_shape(&shape)
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params: Vec<Parameter> = self
            .trunk_children()
            .into_iter()
            .flat_map(|(_, c)| c.parameters())
            .collect();
        params.extend(self.fc.parameters());
        params
    }

    fn named_parameters(&self) -> HashMap<String, Parameter> {
        let mut params = HashMap::new();
        for (name, child) in self.trunk_children() {
            for (param, p) in child.named_parameters() {
                params.insert(format!("{name}.{param}"), p);
            }
        }
        for (param, p) in self.fc.named_parameters() {
            params.insert(format!("fc.{param}"), p);
        }
        params
    }

    fn set_training(&mut self, training: bool) {
        self.stem.set_training(training);
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.stem.is_training()
    }

    fn to_device(&self, device: Device) {
        for (_, child) in self.trunk_children() {
            child.to_device(device);
        }
        self.fc.to_device(device);
    }

    fn summarize(&self, input: &[usize], path: &str, out: &mut Vec<LayerInfo>) -> Result<Shape> {
        let mut shape = Shape::from_slice(input);
        for (name, child) in self.trunk_children() {
            shape = child.summarize(&shape, &child_path(path, &name), out)?;
        }
        let shape = Flatten.output_shape(&shape)?;
        self.fc.summarize(&shape, &child_path(path, "fc"), out)
    }

    fn name(&self) -> &'static str {
        "ResNet"
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

/// ResNet18 for 32x32 inputs.
pub fn resnet18(channels: usize, num_classes: usize) -> Result<ResNet> {
    ResNet::new(ResNetConfig::new(ResNetDepth::R18), channels, num_classes, (32, 32))
}

/// ResNet34 for 32x32 inputs.
pub fn resnet34(channels: usize, num_classes: usize) -> Result<ResNet> {
    ResNet::new(ResNetConfig::new(ResNetDepth::R34), channels, num_classes, (32, 32))
}

/// ResNet50 for 32x32 inputs.
pub fn resnet50(channels: usize, num_classes: usize) -> Result<ResNet> {
    ResNet::new(ResNetConfig::new(ResNetDepth::R50), channels, num_classes, (32, 32))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_branches_agree(block: &ResidualBlock, input: &[usize]) {
        let (main, shortcut) = block.branch_shapes(input).unwrap();
        assert_eq!(main, shortcut);
    }

    #[test]
    fn test_identity_shortcut_when_shapes_match() {
        let block = ResidualBlock::new(BlockVariant::Basic, BlockConfig::new(64, 64, 1)).unwrap();
        assert!(block.shortcut().is_identity());
        assert_branches_agree(&block, &[1, 64, 8, 8]);
    }

    #[test]
    fn test_projection_on_stride_or_width_change() {
        let strided = ResidualBlock::new(BlockVariant::Basic, BlockConfig::new(64, 128, 2)).unwrap();
        assert!(!strided.shortcut().is_identity());

        let widened = ResidualBlock::new(BlockVariant::Bottleneck, BlockConfig::new(64, 64, 1)).unwrap();
        assert!(!widened.shortcut().is_identity());
        assert_eq!(widened.out_channels(), 256);
    }

    #[test]
    fn test_branch_shapes_agree_for_every_variant_and_policy() {
        for variant in [BlockVariant::Basic, BlockVariant::Bottleneck] {
            for downsample in [Downsample::StridedConv, Downsample::AvgPool] {
                for (in_ch, stride) in [(64, 1), (64, 2), (256, 2), (256, 1)] {
                    for size in [7, 8, 15, 32] {
                        let config = BlockConfig::new(in_ch, 64, stride).downsample(downsample);
                        let block = ResidualBlock::new(variant, config).unwrap();
                        assert_branches_agree(&block, &[1, in_ch, size, size]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_identity_shortcut_with_stride_is_rejected() {
        let err = ResidualBlock::with_shortcut(
            BlockVariant::Basic,
            BlockConfig::new(64, 64, 2),
            Shortcut::Identity,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::ShapeMismatch { ref context, .. } if context == "residual add"));
    }

    #[test]
    fn test_projection_with_wrong_width_is_rejected() {
        let config = BlockConfig::new(64, 64, 1);
        let wrong = Projection::new(&config, 128).unwrap();
        let result = ResidualBlock::with_shortcut(BlockVariant::Basic, config, Shortcut::Projection(wrong));
        assert!(result.is_err());
    }

    #[test]
    fn test_projection_with_wrong_input_width_is_rejected() {
        let built_for = BlockConfig::new(32, 64, 1);
        let projection = Projection::new(&built_for, 64).unwrap();
        assert_eq!(projection.in_channels(), 32);

        let config = BlockConfig::new(16, 64, 1);
        let err = ResidualBlock::with_shortcut(BlockVariant::Basic, config, Shortcut::Projection(projection))
            .err()
            .unwrap();
        match err {
            Error::ShapeMismatch { context, .. } => assert_eq!(context, "residual add"),
            other => panic!("unexpected error: {other}"),
        }

        let matching = Projection::new(&config, 64).unwrap();
        let block = ResidualBlock::with_shortcut(BlockVariant::Basic, config, Shortcut::Projection(matching)).unwrap();
        let (main, shortcut) = block.branch_shapes(&[1, 16, 8, 8]).unwrap();
        assert_eq!(main, shortcut);
    }

    #[test]
    fn test_projection_tracks_training_mode() {
        let config = BlockConfig::new(16, 32, 2).norm(NormKind::None);
        let mut block = ResidualBlock::new(BlockVariant::Basic, config).unwrap();
        assert!(block.shortcut().is_training());

        block.eval();
        assert!(!block.is_training());
        assert!(!block.shortcut().is_training());
        match block.shortcut() {
            Shortcut::Projection(p) => assert!(!p.is_training()),
            Shortcut::Identity => panic!("expected a projection"),
        }

        block.train();
        assert!(block.shortcut().is_training());
    }

    #[test]
    fn test_avgpool_policy_rejects_large_strides() {
        let config = BlockConfig::new(64, 64, 3).downsample(Downsample::AvgPool);
        assert!(ResidualBlock::new(BlockVariant::Basic, config).is_err());
    }

    #[test]
    fn test_block_forward() {
        for downsample in [Downsample::StridedConv, Downsample::AvgPool] {
            let config = BlockConfig::new(4, 8, 2).downsample(downsample);
            let block = ResidualBlock::new(BlockVariant::Basic, config).unwrap();
            let out = block.forward(&Tensor::ones(&[1, 4, 6, 6])).unwrap();
            assert_eq!(out.shape(), &[1, 8, 3, 3]);
            assert!(out.to_vec().iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_bottleneck_forward_matches_output_shape() {
        let config = BlockConfig::new(8, 2, 2).norm(NormKind::Batch);
        let block = ResidualBlock::new(BlockVariant::Bottleneck, config).unwrap();
        let input = Tensor::ones(&[2, 8, 5, 5]);
        let out = block.forward(&input).unwrap();
        assert_eq!(out.shape(), block.output_shape(input.shape()).unwrap().as_slice());
    }

    #[test]
    fn test_make_stage_threads_width() {
        let stage = StageConfig {
            variant: BlockVariant::Bottleneck,
            blocks: 3,
            width: 64,
            first_stride: 1,
        };
        let (layers, width) = make_stage(&stage, 64, NormKind::Instance, Downsample::StridedConv).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(width, 256);

        let next = StageConfig { width: 128, first_stride: 2, ..stage };
        let (_, width) = make_stage(&next, width, NormKind::Instance, Downsample::StridedConv).unwrap();
        assert_eq!(width, 512);
    }

    #[test]
    fn test_make_stage_only_first_block_strides() {
        let stage = StageConfig {
            variant: BlockVariant::Basic,
            blocks: 2,
            width: 16,
            first_stride: 2,
        };
        let (layers, _) = make_stage(&stage, 8, NormKind::None, Downsample::StridedConv).unwrap();
        let shape = layers.output_shape(&[1, 8, 16, 16]).unwrap();
        assert_eq!(shape.as_slice(), &[1, 16, 8, 8]);
    }

    #[test]
    fn test_make_stage_requires_blocks() {
        let stage = StageConfig {
            variant: BlockVariant::Basic,
            blocks: 0,
            width: 64,
            first_stride: 1,
        };
        assert!(make_stage(&stage, 64, NormKind::Batch, Downsample::StridedConv).is_err());
    }

    #[test]
    fn test_resnet18_cifar() {
        let net = resnet18(3, 10).unwrap();
        assert_eq!(net.output_shape(&[2, 3, 32, 32]).unwrap().as_slice(), &[2, 10]);
        assert_eq!(net.feature_width(), 512);
        assert_eq!(net.stages().len(), 4);
    }

    #[test]
    fn test_resnet_styles() {
        for style in [ResNetStyle::Cifar, ResNetStyle::AvgPool, ResNetStyle::Tiny, ResNetStyle::ImageNet] {
            let config = ResNetConfig {
                depth: ResNetDepth::R6,
                style,
                norm: NormKind::Batch,
            };
            let size = match style {
                ResNetStyle::Tiny => 64,
                ResNetStyle::ImageNet => 224,
                _ => 32,
            };
            let net = ResNet::new(config, 3, 7, (size, size)).unwrap();
            assert_eq!(net.output_shape(&[1, 3, size, size]).unwrap().as_slice(), &[1, 7]);
        }
    }

    #[test]
    fn test_resnet_summary_reaches_every_stage() {
        let net = ResNet::new(ResNetConfig::new(ResNetDepth::R6), 3, 10, (32, 32)).unwrap();
        let mut rows = Vec::new();
        net.summarize(&[1, 3, 32, 32], "", &mut rows).unwrap();
        assert_eq!(rows[0].path, "stem.conv1");
        assert!(rows.iter().any(|r| r.path == "layer2.0.shortcut.conv"));
        assert_eq!(rows.iter().find(|r| r.path == "layer4.0.bn2").unwrap().output_shape, vec![1, 512, 4, 4]);
        assert_eq!(rows.last().unwrap().path, "fc");
        let total: usize = rows.iter().map(|r| r.params).sum();
        assert_eq!(total, net.num_parameters());
    }

    #[test]
    fn test_depth_lookup() {
        assert_eq!(ResNetDepth::from_layers(50), Some(ResNetDepth::R50));
        assert_eq!(ResNetDepth::from_layers(20), None);
        assert_eq!(ResNetDepth::R34.variant(), BlockVariant::Basic);
        assert_eq!(ResNetDepth::R101.blocks(), [3, 4, 23, 3]);
    }

    #[test]
    fn test_config_display() {
        let mut config = ResNetConfig::new(ResNetDepth::R18);
        config.style = ResNetStyle::AvgPool;
        assert_eq!(config.to_string(), "ResNet18_AP");
    }
}
