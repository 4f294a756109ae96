use blockport_core::{
    from_buffer, to_buffer, DataLayout, FloatBuffer, KernelError, KernelResult, ResourceLedger,
    TensorAttr, TensorHandle,
};
use blockport_graph::{
    Direction, ExecContext, Graph, KernelDescriptor, KernelEntry, KernelFn, KernelParams, NodeId,
    Param, ParamSlots, ParamSpec, ScalarRef, ScalarType, ScalarValue, TensorId,
};
use tracing::{debug, trace};

use crate::index::{check_shapes, Coord, DepthToSpaceMode};

pub const BLOCK_SIZE: &str = "block_size";
pub const LAYOUT: &str = "layout";

const BLOCK_SIZE_SLOT: usize = 2;

static PARAM_SCHEMA: [ParamSpec; 3] = [
    ParamSpec::tensor("input", Direction::Input),
    ParamSpec::tensor("output", Direction::Output),
    ParamSpec::scalar(BLOCK_SIZE, ScalarType::I32),
];

/// Parameters of a bound depth-to-space node, in schema order.
#[derive(Clone, Debug)]
pub struct DepthToSpaceParams {
    pub input: TensorHandle,
    pub output: TensorHandle,
    pub block_size: ScalarRef,
}

impl TryFrom<&[Param]> for DepthToSpaceParams {
    type Error = KernelError;

    fn try_from(params: &[Param]) -> KernelResult<Self> {
        match params {
            [Param::Tensor(input), Param::Tensor(output), Param::Scalar(block_size)] => Ok(Self {
                input: input.clone(),
                output: output.clone(),
                block_size: block_size.clone(),
            }),
            _ => Err(KernelError::Schema(format!(
                "depth2space expects (tensor, tensor, scalar), got {} params",
                params.len()
            ))),
        }
    }
}

/// Run depth-to-space from `input` into `output` with an explicit block size.
pub fn execute(
    input: &TensorHandle,
    output: &TensorHandle,
    block_size: i32,
    mode: DepthToSpaceMode,
    layout: DataLayout,
    ledger: &ResourceLedger,
) -> KernelResult<()> {
    run(input, output, || Ok(block_size), mode, layout, ledger)
}

/// Run a bound node's parameter set.
pub fn execute_params(
    params: &DepthToSpaceParams,
    mode: DepthToSpaceMode,
    layout: DataLayout,
    ledger: &ResourceLedger,
) -> KernelResult<()> {
    run(
        &params.input,
        &params.output,
        || params.block_size.read_i32(BLOCK_SIZE),
        mode,
        layout,
        ledger,
    )
}

fn run(
    input: &TensorHandle,
    output: &TensorHandle,
    block_size: impl FnOnce() -> KernelResult<i32>,
    mode: DepthToSpaceMode,
    layout: DataLayout,
    ledger: &ResourceLedger,
) -> KernelResult<()> {
    if input.same_tensor(output) {
        return Err(KernelError::Attribute(
            "input and output must be distinct tensors".to_string(),
        ));
    }

    // Attributes and buffers below release themselves on every return path.
    let in_attr = TensorAttr::read(input, layout, ledger)?;
    let out_attr = TensorAttr::read(output, layout, ledger)?;
    let out_elements = out_attr.size();
    let block_size = block_size()?;

    let in_ext = in_attr.extents();
    let out_ext = out_attr.extents();
    let bs = check_shapes(in_ext, out_ext, block_size)?;

    let src = to_buffer(input, &in_attr, ledger)?;
    let mut dst = FloatBuffer::zeroed(out_elements, ledger)?;

    for batch in 0..out_ext.batch {
        for out_d in 0..out_ext.depth {
            for out_h in 0..out_ext.height {
                for out_w in 0..out_ext.width {
                    let from = mode.map(Coord::new(out_w, out_h, out_d), bs, out_ext.depth);
                    let in_index = layout.linear_index(&in_ext, from.w, from.h, from.d, batch);
                    let out_index = layout.linear_index(&out_ext, out_w, out_h, out_d, batch);
                    dst[out_index] = src[in_index];
                }
            }
        }
    }
    trace!(
        mode = %mode,
        layout = %layout,
        block_size,
        input = ?in_ext.to_array(),
        output = ?out_ext.to_array(),
        "depth2space computed"
    );

    from_buffer(output, &out_attr, &dst, out_elements)
}

fn exec_crd(ctx: &ExecContext<'_>, params: &[Param]) -> KernelResult<()> {
    exec_node(ctx, params, DepthToSpaceMode::Crd)
}

fn exec_dcr(ctx: &ExecContext<'_>, params: &[Param]) -> KernelResult<()> {
    exec_node(ctx, params, DepthToSpaceMode::Dcr)
}

fn exec_node(ctx: &ExecContext<'_>, params: &[Param], mode: DepthToSpaceMode) -> KernelResult<()> {
    let params = DepthToSpaceParams::try_from(params)?;
    debug!(node = ctx.node.0, kernel = ctx.descriptor.name, "executing node");
    execute_params(&params, mode, ctx.descriptor.layout, ctx.ledger)
}

pub fn descriptor(mode: DepthToSpaceMode) -> KernelDescriptor {
    KernelDescriptor {
        name: mode.kernel_name(),
        params: &PARAM_SCHEMA,
        layout: DataLayout::default(),
        exec: match mode {
            DepthToSpaceMode::Crd => exec_crd as KernelFn,
            DepthToSpaceMode::Dcr => exec_dcr as KernelFn,
        },
    }
}

pub fn crd_entry() -> KernelEntry {
    KernelEntry {
        descriptor: descriptor(DepthToSpaceMode::Crd),
        setup,
    }
}

pub fn dcr_entry() -> KernelEntry {
    KernelEntry {
        descriptor: descriptor(DepthToSpaceMode::Dcr),
        setup,
    }
}

/// Validate the configuration, create a node for `descriptor` and bind
/// `(input, output, block_size)` to it.
pub fn setup(
    graph: &mut Graph,
    inputs: &[TensorId],
    outputs: &[TensorId],
    params: &KernelParams,
    descriptor: &KernelDescriptor,
) -> KernelResult<NodeId> {
    if inputs.len() != descriptor.input_count() || outputs.len() != descriptor.output_count() {
        return Err(KernelError::Schema(format!(
            "{} takes {} input and {} output tensors, got {} and {}",
            descriptor.name,
            descriptor.input_count(),
            descriptor.output_count(),
            inputs.len(),
            outputs.len()
        )));
    }
    if inputs[0] == outputs[0] {
        return Err(KernelError::Schema(format!(
            "{} cannot run in place on {:?}",
            descriptor.name, inputs[0]
        )));
    }

    let block_size = params.get_i32(BLOCK_SIZE)?;
    let layout = match params.get_str(LAYOUT) {
        Some(raw) => raw.parse::<DataLayout>().map_err(KernelError::Schema)?,
        None => DataLayout::default(),
    };

    {
        let in_attr = TensorAttr::read(graph.tensor(inputs[0])?, layout, graph.ledger())?;
        let out_attr = TensorAttr::read(graph.tensor(outputs[0])?, layout, graph.ledger())?;
        check_shapes(in_attr.extents(), out_attr.extents(), block_size)?;
    }

    let descriptor = descriptor.clone().with_layout(layout);
    let node = graph.create_node(&descriptor)?;
    if let Err(err) = bind(graph, node, inputs, outputs, block_size) {
        graph.remove_node(node);
        return Err(err);
    }

    debug!(
        graph = graph.id().0,
        node = node.0,
        kernel = descriptor.name,
        block_size,
        layout = %layout,
        "depth2space node bound"
    );
    Ok(node)
}

fn bind(
    graph: &mut Graph,
    node: NodeId,
    inputs: &[TensorId],
    outputs: &[TensorId],
    block_size: i32,
) -> KernelResult<()> {
    let mut slots = ParamSlots::new(PARAM_SCHEMA.len());
    graph.pack_io(&mut slots, inputs, outputs)?;
    let scalar = graph.create_scalar(ScalarValue::I32(block_size));
    slots.set(BLOCK_SIZE_SLOT, Param::Scalar(scalar))?;
    graph.bind_params(node, &slots)
    // `slots` holds the only reference besides the node's and drops here.
}
