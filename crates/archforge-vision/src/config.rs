//! Config - Factory Configuration Files
//!
//! A TOML file that names a network and says where to put it:
//!
//! ```toml
//! [network]
//! name = "ResNet18BN"
//! num_classes = 100
//! channel = 3
//! input_size = [32, 32]
//!
//! [placement]
//! distribute = true
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::path::Path;

use archforge_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::models::NormKind;
use crate::placement::{place, PlacementPolicy};
use crate::registry::{build_network, Architecture, Network, NetworkDescriptor};

// =============================================================================
// Factory Configuration
// =============================================================================

/// Factory configuration (archforge.toml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Which network to build
    pub network: NetworkConfig,

    /// Where to place it
    #[serde(default)]
    pub placement: PlacementConfig,
}

/// `[network]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Architecture identifier, e.g. `ResNet18BN_AP`
    pub name: String,

    /// Classifier output width
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,

    /// Input channels
    #[serde(default = "default_channel")]
    pub channel: usize,

    /// Input height and width
    #[serde(default = "default_input_size")]
    pub input_size: (usize, usize),

    /// Normalization override
    #[serde(default)]
    pub norm: Option<NormKind>,
}

fn default_num_classes() -> usize {
    10
}

fn default_channel() -> usize {
    3
}

fn default_input_size() -> (usize, usize) {
    (32, 32)
}

/// `[placement]` section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Place on the GPUs and replicate across them; CPU otherwise
    #[serde(default)]
    pub distribute: bool,

    /// GPU count; detected from the environment when absent
    #[serde(default)]
    pub gpu_count: Option<usize>,
}

impl PlacementConfig {
    /// Resolves the placement policy.
    pub fn policy(&self) -> PlacementPolicy {
        match self.gpu_count {
            Some(n) => PlacementPolicy::new(n, self.distribute),
            None => PlacementPolicy::detect(self.distribute),
        }
    }
}

// =============================================================================
// Loading / Building
// =============================================================================

impl FactoryConfig {
    /// Configuration for `name` with default shape and placement.
    pub fn new(name: &str) -> Self {
        Self {
            network: NetworkConfig {
                name: name.to_string(),
                num_classes: default_num_classes(),
                channel: default_channel(),
                input_size: default_input_size(),
                norm: None,
            },
            placement: PlacementConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::config(format!("cannot write {}: {e}", path.display())))
    }

    /// The descriptor the `[network]` section describes.
    pub fn descriptor(&self) -> Result<NetworkDescriptor> {
        let architecture: Architecture = self.network.name.parse()?;
        let mut descriptor = NetworkDescriptor::new(
            architecture,
            self.network.channel,
            self.network.num_classes,
            self.network.input_size,
        );
        descriptor.norm = self.network.norm;
        Ok(descriptor)
    }

    /// Builds and places the configured network.
    pub fn build(&self) -> Result<Network> {
        let network = build_network(&self.descriptor()?)?;
        place(network, &self.placement.policy())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use archforge_core::Device;

    #[test]
    fn test_defaults() {
        let config = FactoryConfig::from_toml_str("[network]\nname = \"LeNet\"\n").unwrap();
        assert_eq!(config, FactoryConfig::new("LeNet"));
        assert!(!config.placement.distribute);
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            [network]
            name = "ConvNet"
            num_classes = 100
            channel = 1
            input_size = [28, 28]
            norm = "instance"

            [placement]
            distribute = true
            gpu_count = 0
        "#;
        let config = FactoryConfig::from_toml_str(text).unwrap();
        assert_eq!(config.network.norm, Some(NormKind::Instance));
        assert_eq!(config.network.input_size, (28, 28));

        let net = config.build().unwrap();
        assert_eq!(net.device(), Device::Cpu);
        assert_eq!(net.descriptor().resolved_norm(), Some(NormKind::Instance));
        assert_eq!(net.output_shape(&[1, 1, 28, 28]).unwrap().as_slice(), &[1, 100]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archforge.toml");

        let mut config = FactoryConfig::new("ResNet18BN_AP");
        config.network.num_classes = 100;
        config.placement.gpu_count = Some(2);
        config.save(&path).unwrap();

        assert_eq!(FactoryConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_errors() {
        assert!(FactoryConfig::from_toml_str("[network]\n").unwrap_err().is_config_error());
        assert!(FactoryConfig::load("/nonexistent/archforge.toml").is_err());

        let config = FactoryConfig::new("NotARealNet");
        assert!(matches!(
            config.build().unwrap_err(),
            Error::UnknownArchitecture { .. }
        ));
    }
}
