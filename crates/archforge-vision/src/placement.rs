//! Placement - Device Assignment and Replication
//!
//! Moves a freshly built [`Network`] onto its execution device. Without
//! distribution the network stays on the CPU. When distribution is requested
//! the primary goes to the first GPU, and if more than one is visible independent
//! replicas are built from the same descriptor and their parameters are
//! overwritten with the primary's (a rank-0 broadcast) before each replica is
//! moved to its own device.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::{visible_cuda_devices, Device, Result};
use tracing::{info, warn};

use crate::registry::{build_network, Network};

// =============================================================================
// PlacementPolicy
// =============================================================================

/// How many GPUs to use and whether to replicate across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPolicy {
    /// Number of GPUs visible to the process.
    pub gpu_count: usize,
    /// Place onto the GPUs; without it the network stays on the CPU.
    pub distribute: bool,
}

impl PlacementPolicy {
    /// Policy for an explicit GPU count.
    pub fn new(gpu_count: usize, distribute: bool) -> Self {
        Self {
            gpu_count,
            distribute,
        }
    }

    /// Counts the GPUs listed in `CUDA_VISIBLE_DEVICES`.
    pub fn detect(distribute: bool) -> Self {
        Self::new(visible_cuda_devices(), distribute)
    }

    /// Keeps everything on the CPU.
    pub fn cpu_only() -> Self {
        Self::new(0, false)
    }

    /// Device of the primary copy.
    pub fn primary_device(&self) -> Device {
        if self.distribute && self.gpu_count > 0 {
            Device::Cuda(0)
        } else {
            Device::Cpu
        }
    }

    /// Devices that receive replicas.
    pub fn replica_devices(&self) -> Vec<Device> {
        if self.distribute && self.gpu_count > 1 {
            (1..self.gpu_count).map(Device::Cuda).collect()
        } else {
            Vec::new()
        }
    }
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::cpu_only()
    }
}

// =============================================================================
// Placement
// =============================================================================

/// Places `network` according to `policy`.
pub fn place(mut network: Network, policy: &PlacementPolicy) -> Result<Network> {
    if policy.gpu_count == 0 && policy.distribute {
        warn!(
            architecture = %network.architecture(),
            "no GPU visible, keeping network on cpu"
        );
    }

    network.move_to(policy.primary_device());

    let devices = policy.replica_devices();
    let mut replicas = Vec::with_capacity(devices.len());
    for device in devices {
        let mut replica = build_network(network.descriptor())?;
        broadcast_parameters(&network, &replica)?;
        replica.move_to(device);
        replicas.push(replica);
    }
    network.set_replicas(replicas);

    info!(
        architecture = %network.architecture(),
        device = %network.device(),
        replicas = network.replicas().len(),
        "network placed"
    );
    Ok(network)
}

/// Overwrites every parameter of `replica` with the primary's values.
fn broadcast_parameters(primary: &Network, replica: &Network) -> Result<()> {
    for (src, dst) in primary.parameters().iter().zip(replica.parameters()) {
        dst.copy_from(src)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Architecture, NetworkDescriptor};

    fn lenet() -> Network {
        build_network(&NetworkDescriptor::new(Architecture::LeNet, 3, 10, (32, 32))).unwrap()
    }

    #[test]
    fn test_cpu_placement() {
        let net = place(lenet(), &PlacementPolicy::cpu_only()).unwrap();
        assert_eq!(net.device(), Device::Cpu);
        assert!(net.replicas().is_empty());
    }

    #[test]
    fn test_distribute_without_gpus_falls_back_to_cpu() {
        let net = place(lenet(), &PlacementPolicy::new(0, true)).unwrap();
        assert_eq!(net.device(), Device::Cpu);
        assert!(net.replicas().is_empty());
    }

    #[test]
    fn test_single_gpu() {
        let net = place(lenet(), &PlacementPolicy::new(1, true)).unwrap();
        assert_eq!(net.device(), Device::Cuda(0));
        assert!(net.replicas().is_empty());
        assert!(net.parameters().iter().all(|p| p.device() == Device::Cuda(0)));
    }

    #[test]
    fn test_stays_on_cpu_without_distribute() {
        for gpu_count in [1, 4] {
            let net = place(lenet(), &PlacementPolicy::new(gpu_count, false)).unwrap();
            assert_eq!(net.device(), Device::Cpu);
            assert!(net.replicas().is_empty());
            assert!(net.parameters().iter().all(|p| p.device() == Device::Cpu));
        }
    }

    #[test]
    fn test_replicas_are_synchronized_copies() {
        let net = place(lenet(), &PlacementPolicy::new(3, true)).unwrap();
        assert_eq!(net.replicas().len(), 2);

        let primary = net.parameters();
        for (i, replica) in net.replicas().iter().enumerate() {
            assert_eq!(replica.device(), Device::Cuda(i + 1));
            assert!(replica.replicas().is_empty());
            let params = replica.parameters();
            assert_eq!(params.len(), primary.len());
            for (a, b) in primary.iter().zip(&params) {
                assert!(!a.shares_storage(b));
                assert_eq!(a.data().to_vec(), b.data().to_vec());
                assert_eq!(b.device(), Device::Cuda(i + 1));
            }
        }
    }

    #[test]
    fn test_policy_devices() {
        let policy = PlacementPolicy::new(3, true);
        assert_eq!(policy.primary_device(), Device::Cuda(0));
        assert_eq!(policy.replica_devices(), vec![Device::Cuda(1), Device::Cuda(2)]);
        assert_eq!(PlacementPolicy::default().primary_device(), Device::Cpu);
        assert_eq!(PlacementPolicy::new(3, false).primary_device(), Device::Cpu);
        assert!(PlacementPolicy::new(3, false).replica_devices().is_empty());
    }
}
