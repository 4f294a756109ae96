use thiserror::Error;

use crate::DType;

pub type KernelResult<T> = Result<T, KernelError>;

/// Failures surfaced by tensor access, kernel execution and node setup.
///
/// None of these are retried; callers get the status and decide.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("failed to read tensor attributes: {0}")]
    Attribute(String),

    #[error("failed to allocate {requested} bytes for {what}")]
    Allocation { what: &'static str, requested: usize },

    #[error("cannot convert {dtype:?} tensor: {reason}")]
    Conversion { dtype: DType, reason: String },

    #[error("failed to read scalar parameter `{name}`: {reason}")]
    ScalarRead { name: &'static str, reason: String },

    #[error("failed to write output tensor: {0}")]
    Write(String),

    #[error("graph rejected node creation: {0}")]
    NodeCreation(String),

    #[error("invalid block size {block_size}: {reason}")]
    InvalidBlockSize { block_size: i32, reason: String },

    /// Extents are reported as `[width, height, depth, batch]`.
    #[error("shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: [usize; 4],
        got: [usize; 4],
    },

    #[error("parameter schema violation: {0}")]
    Schema(String),
}
