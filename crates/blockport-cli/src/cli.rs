use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blockport", version, about = "Depth-to-space reference kernel runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run depth-to-space over a tensor filled with 0, 1, 2, ...
    Run {
        /// Input shape, comma separated, in the chosen layout
        #[arg(long, default_value = "2,2,4,1")]
        shape: String,

        /// Side length of each spatial block
        #[arg(long, default_value_t = 2)]
        block_size: i32,

        /// Sub-block ordering (crd or dcr)
        #[arg(long, default_value = "crd")]
        mode: String,

        /// Shape layout (whcn or cwhn)
        #[arg(long, default_value = "whcn")]
        layout: String,

        /// Element type of both tensors (f32, f16, i64, i32, i8, u8)
        #[arg(long, default_value = "f32")]
        dtype: String,

        /// Cap on scratch bytes per graph
        #[arg(long)]
        scratch_limit: Option<usize>,

        /// Log level (RUST_LOG)
        #[arg(long, default_value = "info")]
        log: String,
    },
    /// List the registered kernels
    Kernels {
        /// Log level (RUST_LOG)
        #[arg(long, default_value = "warn")]
        log: String,
    },
}
