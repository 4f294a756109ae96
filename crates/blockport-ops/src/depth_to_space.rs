use blockport_core::{DataLayout, KernelError, KernelResult, Shape};
use blockport_graph::{Graph, GraphId, KernelParams, KernelRegistry, NodeId, TensorId};
use blockport_kernels::{output_extents, DepthToSpaceMode, BLOCK_SIZE, LAYOUT};
use tracing::debug;

use crate::Operation;

#[derive(Clone, Debug)]
pub struct DepthToSpace {
    graph: GraphId,
    block_size: i32,
    layout: DataLayout,
    mode: DepthToSpaceMode,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
    node: Option<NodeId>,
}

impl DepthToSpace {
    pub fn new(graph: &Graph, block_size: i32, layout: DataLayout) -> Self {
        Self {
            graph: graph.id(),
            block_size,
            layout,
            mode: DepthToSpaceMode::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            node: None,
        }
    }

    pub fn with_mode(mut self, mode: DepthToSpaceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn block_size(&self) -> i32 {
        self.block_size
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    pub fn mode(&self) -> DepthToSpaceMode {
        self.mode
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn bind_input(&mut self, tensor: TensorId) -> &mut Self {
        self.inputs.push(tensor);
        self
    }

    pub fn bind_output(&mut self, tensor: TensorId) -> &mut Self {
        self.outputs.push(tensor);
        self
    }

    /// Setup parameters forwarded to the kernel.
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams::new()
            .with_i32(BLOCK_SIZE, self.block_size)
            .with_str(LAYOUT, self.layout.as_str())
    }

    /// Shape of the output this operation produces for `input`, in this
    /// operation's layout. Always rank 4.
    pub fn output_shape(&self, input: &Shape) -> KernelResult<Shape> {
        let extents = self.layout.extents(input.dims()).ok_or_else(|| {
            KernelError::Attribute(format!("expected rank 1..=4, got {:?}", input.dims()))
        })?;
        let out = output_extents(extents, self.block_size)?;
        Ok(Shape::from_slice(&self.layout.dims(out)))
    }

    /// Configuration copy for `graph`.
    pub fn clone_into(&self, graph: &Graph) -> Self {
        Self::new(graph, self.block_size, self.layout).with_mode(self.mode)
    }
}

impl Operation for DepthToSpace {
    fn name(&self) -> &'static str {
        "DepthToSpace"
    }

    fn graph(&self) -> GraphId {
        self.graph
    }

    fn lower(&mut self, graph: &mut Graph, registry: &KernelRegistry) -> KernelResult<NodeId> {
        if graph.id() != self.graph {
            return Err(KernelError::NodeCreation(format!(
                "operation belongs to graph {:?}, not {:?}",
                self.graph,
                graph.id()
            )));
        }
        if let Some(node) = self.node {
            return Err(KernelError::NodeCreation(format!(
                "operation is already lowered to node {node:?}"
            )));
        }

        let node = registry.setup(
            self.mode.kernel_name(),
            graph,
            &self.inputs,
            &self.outputs,
            &self.kernel_params(),
        )?;
        debug!(graph = self.graph.0, node = node.0, mode = %self.mode, "DepthToSpace lowered");
        self.node = Some(node);
        Ok(node)
    }

    fn clone_op(&self, graph: &Graph) -> Box<dyn Operation> {
        Box::new(self.clone_into(graph))
    }
}
