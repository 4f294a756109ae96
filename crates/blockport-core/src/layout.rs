use std::fmt;
use std::str::FromStr;

/// Positional interpretation of a tensor shape.
///
/// `Whcn` lists width first (fastest varying) and batch last. `Cwhn` puts the
/// channel axis first, i.e. channel-interleaved storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataLayout {
    #[default]
    Whcn,
    Cwhn,
}

/// Logical extents of a rank <= 4 tensor. Missing axes are 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extents {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub batch: usize,
}

impl Extents {
    pub fn new(width: usize, height: usize, depth: usize, batch: usize) -> Self {
        Self {
            width,
            height,
            depth,
            batch,
        }
    }

    pub fn numel(&self) -> usize {
        self.width * self.height * self.depth * self.batch
    }

    pub fn to_array(self) -> [usize; 4] {
        [self.width, self.height, self.depth, self.batch]
    }
}

impl DataLayout {
    /// Resolve extents from raw dims; `None` when the rank is 0 or above 4.
    pub fn extents(self, dims: &[usize]) -> Option<Extents> {
        if dims.is_empty() || dims.len() > 4 {
            return None;
        }
        let at = |i: usize| dims.get(i).copied().unwrap_or(1);
        Some(match self {
            DataLayout::Whcn => Extents::new(at(0), at(1), at(2), at(3)),
            DataLayout::Cwhn => Extents::new(at(1), at(2), at(0), at(3)),
        })
    }

    /// Raw dims for the given extents, always rank 4.
    pub fn dims(self, ext: Extents) -> [usize; 4] {
        match self {
            DataLayout::Whcn => [ext.width, ext.height, ext.depth, ext.batch],
            DataLayout::Cwhn => [ext.depth, ext.width, ext.height, ext.batch],
        }
    }

    pub fn linear_index(self, ext: &Extents, w: usize, h: usize, d: usize, b: usize) -> usize {
        match self {
            DataLayout::Whcn => w + ext.width * (h + ext.height * (d + ext.depth * b)),
            DataLayout::Cwhn => d + ext.depth * (w + ext.width * (h + ext.height * b)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataLayout::Whcn => "whcn",
            DataLayout::Cwhn => "cwhn",
        }
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataLayout {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("whcn") {
            Ok(DataLayout::Whcn)
        } else if raw.eq_ignore_ascii_case("cwhn") {
            Ok(DataLayout::Cwhn)
        } else {
            Err(format!("unsupported data layout: {raw} (expected whcn or cwhn)"))
        }
    }
}
