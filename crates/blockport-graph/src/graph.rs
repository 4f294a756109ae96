use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use blockport_core::{KernelError, KernelResult, ResourceLedger, Tensor, TensorHandle};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{ExecContext, KernelDescriptor, Param, Scalar, ScalarRef, ScalarValue};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, Default)]
pub struct GraphConfig {
    /// Node creation fails once this many nodes exist.
    pub max_nodes: Option<usize>,
    /// Cap on scratch bytes alive at once across this graph's kernels.
    pub scratch_limit: Option<usize>,
}

/// Positional parameter slots being filled in before a bind.
#[derive(Clone, Debug, Default)]
pub struct ParamSlots(SmallVec<[Option<Param>; 4]>);

impl ParamSlots {
    pub fn new(len: usize) -> Self {
        Self((0..len).map(|_| None).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set(&mut self, index: usize, param: Param) -> KernelResult<()> {
        let len = self.0.len();
        let slot = self.0.get_mut(index).ok_or_else(|| {
            KernelError::Schema(format!("slot {index} is out of range for {len} slots"))
        })?;
        *slot = Some(param);
        Ok(())
    }

    pub fn as_slice(&self) -> &[Option<Param>] {
        &self.0
    }
}

#[derive(Debug)]
pub struct Node {
    descriptor: KernelDescriptor,
    params: Option<Vec<Param>>,
}

impl Node {
    pub fn descriptor(&self) -> &KernelDescriptor {
        &self.descriptor
    }

    /// Bound parameters, `None` until `Graph::bind_params` succeeds.
    pub fn params(&self) -> Option<&[Param]> {
        self.params.as_deref()
    }
}

/// Minimal in-memory compute graph: owns tensors and kernel nodes and can run
/// a node on request. Ordering and dispatch policy belong to the caller.
#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    config: GraphConfig,
    tensors: Vec<TensorHandle>,
    nodes: BTreeMap<NodeId, Node>,
    next_node: usize,
    sealed: bool,
    ledger: ResourceLedger,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        let ledger = match config.scratch_limit {
            Some(limit) => ResourceLedger::with_byte_limit(limit),
            None => ResourceLedger::new(),
        };
        Self {
            id: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
            config,
            tensors: Vec::new(),
            nodes: BTreeMap::new(),
            next_node: 0,
            sealed: false,
            ledger,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn add_tensor(&mut self, tensor: Tensor) -> TensorId {
        self.tensors.push(TensorHandle::new(tensor));
        TensorId(self.tensors.len() - 1)
    }

    pub fn tensor(&self, id: TensorId) -> KernelResult<&TensorHandle> {
        self.tensors
            .get(id.0)
            .ok_or_else(|| KernelError::Attribute(format!("unknown tensor {id:?}")))
    }

    /// Stop accepting new nodes; existing nodes can still run.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn create_node(&mut self, descriptor: &KernelDescriptor) -> KernelResult<NodeId> {
        if self.sealed {
            return Err(KernelError::NodeCreation(format!(
                "graph {:?} is sealed",
                self.id
            )));
        }
        if let Some(max) = self.config.max_nodes {
            if self.nodes.len() >= max {
                return Err(KernelError::NodeCreation(format!(
                    "graph {:?} already holds {max} nodes",
                    self.id
                )));
            }
        }

        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                descriptor: descriptor.clone(),
                params: None,
            },
        );
        debug!(graph = self.id.0, node = id.0, kernel = descriptor.name, "node created");
        Ok(id)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    /// Put input tensors, then output tensors, into the leading slots.
    pub fn pack_io(
        &self,
        slots: &mut ParamSlots,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> KernelResult<()> {
        if inputs.len() + outputs.len() > slots.len() {
            return Err(KernelError::Schema(format!(
                "{} tensors do not fit into {} slots",
                inputs.len() + outputs.len(),
                slots.len()
            )));
        }
        for (index, id) in inputs.iter().chain(outputs).enumerate() {
            slots.set(index, Param::Tensor(self.tensor(*id)?.clone()))?;
        }
        Ok(())
    }

    pub fn create_scalar(&self, value: ScalarValue) -> ScalarRef {
        Scalar::new(value)
    }

    /// Validate `slots` against the node's schema and hand the node its own
    /// references to every parameter.
    pub fn bind_params(&mut self, node: NodeId, slots: &ParamSlots) -> KernelResult<()> {
        let graph = self.id;
        let node = self.nodes.get_mut(&node).ok_or_else(|| {
            KernelError::NodeCreation(format!("graph {graph:?} has no node {node:?}"))
        })?;
        node.descriptor
            .validate(slots.as_slice())
            .map_err(|err| KernelError::NodeCreation(format!("binding rejected: {err}")))?;
        node.params = Some(slots.as_slice().iter().flatten().cloned().collect());
        Ok(())
    }

    pub fn execute_node(&self, id: NodeId) -> KernelResult<()> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| KernelError::Schema(format!("unknown node {id:?}")))?;
        let params = node.params().ok_or_else(|| {
            KernelError::Schema(format!(
                "node {id:?} ({}) has no bound parameters",
                node.descriptor.name
            ))
        })?;

        let ctx = ExecContext {
            node: id,
            descriptor: &node.descriptor,
            ledger: &self.ledger,
        };
        (node.descriptor.exec)(&ctx, params).inspect_err(|err| {
            warn!(node = id.0, kernel = node.descriptor.name, error = %err, "node execution failed");
        })
    }

    /// Run every node once, in creation order.
    pub fn run(&self) -> KernelResult<()> {
        for id in self.nodes.keys() {
            self.execute_node(*id)?;
        }
        Ok(())
    }
}
