mod cli;

use anyhow::{bail, Context, Result};
use blockport_core::{encode_f32, tensor_to_f32, DType, DataLayout, Shape, Tensor};
use blockport_graph::{Graph, GraphConfig, KernelRegistry};
use blockport_kernels::{register_cpu_kernels, DepthToSpaceMode};
use blockport_ops::{DepthToSpace, Operation};
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

struct RunArgs {
    shape: Vec<usize>,
    block_size: i32,
    mode: DepthToSpaceMode,
    layout: DataLayout,
    dtype: DType,
    scratch_limit: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            shape,
            block_size,
            mode,
            layout,
            dtype,
            scratch_limit,
            log,
        } => {
            init_tracing(&log);
            let args = RunArgs {
                shape: parse_shape(&shape)?,
                block_size,
                mode: mode.parse().map_err(anyhow::Error::msg)?,
                layout: layout.parse().map_err(anyhow::Error::msg)?,
                dtype: parse_dtype(&dtype)?,
                scratch_limit,
            };
            run(args)
        }
        Command::Kernels { log } => {
            init_tracing(&log);
            let mut registry = KernelRegistry::new();
            register_cpu_kernels(&mut registry);
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn init_tracing(log: &str) {
    std::env::set_var("RUST_LOG", log);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let mut registry = KernelRegistry::new();
    register_cpu_kernels(&mut registry);

    let mut graph = Graph::with_config(GraphConfig {
        max_nodes: None,
        scratch_limit: args.scratch_limit,
    });

    let in_shape = Shape::from_slice(&args.shape);
    let values: Vec<f32> = (0..in_shape.numel()).map(|i| i as f32).collect();
    let bytes = encode_f32(args.dtype, None, &values).context("failed to encode input")?;
    let input = graph.add_tensor(Tensor::from_cpu_bytes(args.dtype, in_shape.clone(), bytes));

    let mut op = DepthToSpace::new(&graph, args.block_size, args.layout).with_mode(args.mode);
    let out_shape = op
        .output_shape(&in_shape)
        .context("invalid depth-to-space configuration")?;
    let output = graph.add_tensor(Tensor::zeros(args.dtype, out_shape.clone()));
    op.bind_input(input).bind_output(output);

    let node = op.lower(&mut graph, &registry).context("failed to set up node")?;
    graph.execute_node(node).context("depth2space failed")?;

    let result = tensor_to_f32(&graph.tensor(output)?.snapshot()?)?;
    tracing::info!(
        input = ?in_shape.dims(),
        output = ?out_shape.dims(),
        mode = %args.mode,
        layout = %args.layout,
        "depth2space done"
    );
    print_tensor(out_shape.dims(), args.layout, &result)
}

fn print_tensor(dims: &[usize], layout: DataLayout, values: &[f32]) -> Result<()> {
    let Some(ext) = layout.extents(dims) else {
        bail!("cannot print a tensor of rank {}", dims.len());
    };
    for b in 0..ext.batch {
        for d in 0..ext.depth {
            println!("batch {b}, depth {d}:");
            for h in 0..ext.height {
                let row = (0..ext.width)
                    .map(|w| format!("{:>6}", values[layout.linear_index(&ext, w, h, d, b)]))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("  {row}");
            }
        }
    }
    Ok(())
}

fn parse_shape(raw: &str) -> Result<Vec<usize>> {
    let dims = raw
        .split(',')
        .map(|d| d.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid shape: {raw}"))?;
    if dims.is_empty() || dims.len() > 4 {
        bail!("shape must have 1 to 4 dims, got {}", dims.len());
    }
    Ok(dims)
}

fn parse_dtype(raw: &str) -> Result<DType> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "f32" => DType::F32,
        "f16" => DType::F16,
        "i64" => DType::I64,
        "i32" => DType::I32,
        "i8" => DType::I8,
        "u8" => DType::U8,
        other => bail!("unsupported dtype: {other} (expected f32, f16, i64, i32, i8 or u8)"),
    })
}
