use std::sync::Arc;

use blockport_core::{DataLayout, KernelError, KernelResult, ResourceLedger, TensorHandle};

use crate::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    I32,
    F32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Tensor,
    Scalar(ScalarType),
}

/// One slot of a kernel's parameter schema. Every slot is required.
#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub direction: Direction,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn tensor(name: &'static str, direction: Direction) -> Self {
        Self {
            name,
            direction,
            kind: ParamKind::Tensor,
        }
    }

    pub const fn scalar(name: &'static str, ty: ScalarType) -> Self {
        Self {
            name,
            direction: Direction::Input,
            kind: ParamKind::Scalar(ty),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
    I32(i32),
    F32(f32),
}

impl ScalarValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarValue::I32(_) => ScalarType::I32,
            ScalarValue::F32(_) => ScalarType::F32,
        }
    }
}

/// Graph-owned scalar. Each holder of a `ScalarRef` keeps it alive; dropping
/// the reference releases that holder's share.
#[derive(Debug)]
pub struct Scalar {
    value: ScalarValue,
}

pub type ScalarRef = Arc<Scalar>;

impl Scalar {
    pub(crate) fn new(value: ScalarValue) -> ScalarRef {
        Arc::new(Self { value })
    }

    pub fn value(&self) -> ScalarValue {
        self.value
    }

    pub fn read_i32(&self, name: &'static str) -> KernelResult<i32> {
        match self.value {
            ScalarValue::I32(v) => Ok(v),
            other => Err(KernelError::ScalarRead {
                name,
                reason: format!("expected an i32 scalar, found {other:?}"),
            }),
        }
    }
}

/// A bound parameter value.
#[derive(Clone, Debug)]
pub enum Param {
    Tensor(TensorHandle),
    Scalar(ScalarRef),
}

impl Param {
    pub fn kind(&self) -> ParamKind {
        match self {
            Param::Tensor(_) => ParamKind::Tensor,
            Param::Scalar(s) => ParamKind::Scalar(s.value().scalar_type()),
        }
    }
}

/// What a node executor gets to see besides its parameters.
pub struct ExecContext<'a> {
    pub node: NodeId,
    pub descriptor: &'a KernelDescriptor,
    pub ledger: &'a ResourceLedger,
}

pub type KernelFn = fn(&ExecContext<'_>, &[Param]) -> KernelResult<()>;

#[derive(Clone, Debug)]
pub struct KernelDescriptor {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub layout: DataLayout,
    pub exec: KernelFn,
}

impl KernelDescriptor {
    pub fn with_layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn input_count(&self) -> usize {
        self.tensor_count(Direction::Input)
    }

    pub fn output_count(&self) -> usize {
        self.tensor_count(Direction::Output)
    }

    fn tensor_count(&self, direction: Direction) -> usize {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Tensor && p.direction == direction)
            .count()
    }

    /// Check a full parameter set against the declared schema.
    pub fn validate(&self, params: &[Option<Param>]) -> KernelResult<()> {
        if params.len() != self.params.len() {
            return Err(KernelError::Schema(format!(
                "{} declares {} parameters, got {}",
                self.name,
                self.params.len(),
                params.len()
            )));
        }
        for (index, (spec, param)) in self.params.iter().zip(params).enumerate() {
            match param {
                None => {
                    return Err(KernelError::Schema(format!(
                        "{}: required parameter #{index} `{}` is unset",
                        self.name, spec.name
                    )))
                }
                Some(param) if param.kind() != spec.kind => {
                    return Err(KernelError::Schema(format!(
                        "{}: parameter #{index} `{}` expects {:?}, got {:?}",
                        self.name,
                        spec.name,
                        spec.kind,
                        param.kind()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
