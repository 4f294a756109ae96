pub mod graph;
pub mod kernel;
pub mod params;
pub mod registry;

pub use graph::*;
pub use kernel::*;
pub use params::*;
pub use registry::*;
