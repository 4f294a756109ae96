use std::collections::HashMap;

use blockport_core::{KernelError, KernelResult};
use tracing::{debug, warn};

use crate::{Graph, KernelDescriptor, KernelParams, NodeId, TensorId};

pub type SetupFn = fn(
    &mut Graph,
    &[TensorId],
    &[TensorId],
    &KernelParams,
    &KernelDescriptor,
) -> KernelResult<NodeId>;

/// A kernel descriptor together with the setup routine that binds it.
#[derive(Clone, Debug)]
pub struct KernelEntry {
    pub descriptor: KernelDescriptor,
    pub setup: SetupFn,
}

pub type KernelFactory = fn() -> KernelEntry;

#[derive(Default)]
pub struct KernelRegistry {
    kernels: HashMap<&'static str, KernelFactory>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            kernels: HashMap::new(),
        }
    }

    /// Returns the factory previously registered under `name`, if any.
    pub fn register(&mut self, name: &'static str, factory: KernelFactory) -> Option<KernelFactory> {
        let previous = self.kernels.insert(name, factory);
        if previous.is_some() {
            warn!(kernel = name, "kernel registration replaced");
        } else {
            debug!(kernel = name, "kernel registered");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<KernelEntry> {
        self.kernels.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kernels.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Look up `name` and run its setup against `graph`.
    pub fn setup(
        &self,
        name: &str,
        graph: &mut Graph,
        inputs: &[TensorId],
        outputs: &[TensorId],
        params: &KernelParams,
    ) -> KernelResult<NodeId> {
        let entry = self
            .get(name)
            .ok_or_else(|| KernelError::NodeCreation(format!("no kernel registered as `{name}`")))?;
        (entry.setup)(graph, inputs, outputs, params, &entry.descriptor)
    }
}
