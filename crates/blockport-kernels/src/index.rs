use std::fmt;
use std::str::FromStr;

use blockport_core::{Extents, KernelError, KernelResult};

/// How the `block_size²` sub-block position is packed into the input depth.
///
/// `Crd` (column, row, depth): column remainder fastest, then row remainder,
/// then the output depth index scaled by `block_size²`.
/// `Dcr` (depth, column, row): the block position is the coarse component and
/// the output depth index varies fastest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthToSpaceMode {
    #[default]
    Crd,
    Dcr,
}

/// Spatial/depth position within one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coord {
    pub w: usize,
    pub h: usize,
    pub d: usize,
}

impl Coord {
    pub fn new(w: usize, h: usize, d: usize) -> Self {
        Self { w, h, d }
    }
}

pub fn crd_source(out: Coord, block_size: usize) -> Coord {
    Coord {
        w: out.w / block_size,
        h: out.h / block_size,
        d: (out.w % block_size) + (out.h % block_size) * block_size + out.d * block_size * block_size,
    }
}

pub fn dcr_source(out: Coord, block_size: usize, output_depth: usize) -> Coord {
    Coord {
        w: out.w / block_size,
        h: out.h / block_size,
        d: ((out.h % block_size) * block_size + (out.w % block_size)) * output_depth + out.d,
    }
}

impl DepthToSpaceMode {
    /// Input coordinate feeding output coordinate `out`.
    pub fn map(self, out: Coord, block_size: usize, output_depth: usize) -> Coord {
        match self {
            DepthToSpaceMode::Crd => crd_source(out, block_size),
            DepthToSpaceMode::Dcr => dcr_source(out, block_size, output_depth),
        }
    }

    pub fn kernel_name(self) -> &'static str {
        match self {
            DepthToSpaceMode::Crd => "cpu.depth2space_crd",
            DepthToSpaceMode::Dcr => "cpu.depth2space_dcr",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepthToSpaceMode::Crd => "crd",
            DepthToSpaceMode::Dcr => "dcr",
        }
    }
}

impl fmt::Display for DepthToSpaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepthToSpaceMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("crd") {
            Ok(DepthToSpaceMode::Crd)
        } else if raw.eq_ignore_ascii_case("dcr") {
            Ok(DepthToSpaceMode::Dcr)
        } else {
            Err(format!("unsupported depth-to-space mode: {raw} (expected crd or dcr)"))
        }
    }
}

/// Extents produced from an input of `input` extents.
pub fn output_extents(input: Extents, block_size: i32) -> KernelResult<Extents> {
    let bs = positive_block_size(block_size)?;
    let area = bs * bs;
    if input.depth % area != 0 {
        return Err(KernelError::InvalidBlockSize {
            block_size,
            reason: format!("block area {area} does not divide input depth {}", input.depth),
        });
    }
    let scaled = |v: usize| {
        v.checked_mul(bs).ok_or_else(|| KernelError::InvalidBlockSize {
            block_size,
            reason: format!("output extent {v} * {bs} overflows"),
        })
    };
    Ok(Extents::new(
        scaled(input.width)?,
        scaled(input.height)?,
        input.depth / area,
        input.batch,
    ))
}

/// Reject shape/block-size combinations that would not make the index
/// mapping a bijection. Returns the block size as an index stride.
pub fn check_shapes(input: Extents, output: Extents, block_size: i32) -> KernelResult<usize> {
    let bs = positive_block_size(block_size)?;
    if output.width % bs != 0 || output.height % bs != 0 {
        return Err(KernelError::InvalidBlockSize {
            block_size,
            reason: format!(
                "does not divide output spatial extents {}x{}",
                output.width, output.height
            ),
        });
    }
    let expected = output_extents(input, block_size)?;
    if expected != output {
        return Err(KernelError::ShapeMismatch {
            op: "depth2space",
            expected: expected.to_array(),
            got: output.to_array(),
        });
    }
    Ok(bs)
}

fn positive_block_size(block_size: i32) -> KernelResult<usize> {
    if block_size < 1 {
        return Err(KernelError::InvalidBlockSize {
            block_size,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(block_size as usize)
}
