//! Graph-construction facing operations.

pub mod depth_to_space;

pub use depth_to_space::DepthToSpace;

use blockport_core::KernelResult;
use blockport_graph::{Graph, GraphId, KernelRegistry, NodeId};

/// A configured operator living in one graph.
pub trait Operation: Send {
    fn name(&self) -> &'static str;

    /// Graph this operation was created for.
    fn graph(&self) -> GraphId;

    /// Select a kernel and bind it as a node of `graph`.
    fn lower(&mut self, graph: &mut Graph, registry: &KernelRegistry) -> KernelResult<NodeId>;

    /// Same configuration, new instance in `graph`. Bound tensors and nodes
    /// are not carried over.
    fn clone_op(&self, graph: &Graph) -> Box<dyn Operation>;
}
