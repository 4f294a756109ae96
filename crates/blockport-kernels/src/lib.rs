//! CPU reference kernels.

pub mod depth2space;
pub mod index;

pub use depth2space::{
    crd_entry, dcr_entry, descriptor, execute, execute_params, setup, DepthToSpaceParams,
    BLOCK_SIZE, LAYOUT,
};
pub use index::*;

use blockport_graph::KernelRegistry;
use tracing::info;

/// Register every CPU reference kernel under its kernel name.
pub fn register_cpu_kernels(registry: &mut KernelRegistry) {
    registry.register(DepthToSpaceMode::Crd.kernel_name(), crd_entry);
    registry.register(DepthToSpaceMode::Dcr.kernel_name(), dcr_entry);
    info!(kernels = registry.names().len(), "cpu kernels registered");
}
