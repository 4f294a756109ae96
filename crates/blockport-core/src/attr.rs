use tracing::trace;

use crate::{
    DType, DataLayout, Extents, KernelError, KernelResult, Quantization, ResourceLedger, Shape,
    Tensor, TensorHandle,
};

/// Read-only snapshot of a tensor's metadata, taken for one kernel
/// invocation. Released back to its ledger on drop.
#[derive(Debug)]
pub struct TensorAttr {
    dtype: DType,
    shape: Shape,
    layout: DataLayout,
    extents: Extents,
    quant: Option<Quantization>,
    ledger: ResourceLedger,
}

impl TensorAttr {
    pub fn read(
        handle: &TensorHandle,
        layout: DataLayout,
        ledger: &ResourceLedger,
    ) -> KernelResult<Self> {
        let tensor = handle.read()?;
        Self::from_tensor(&tensor, layout, ledger)
    }

    pub fn from_tensor(
        tensor: &Tensor,
        layout: DataLayout,
        ledger: &ResourceLedger,
    ) -> KernelResult<Self> {
        let shape = tensor.desc.shape.clone();
        let extents = layout.extents(shape.dims()).ok_or_else(|| {
            KernelError::Attribute(format!(
                "expected a tensor of rank 1..=4, got rank {}",
                shape.rank()
            ))
        })?;

        let expected = shape.numel() * tensor.desc.dtype.byte_size();
        if tensor.byte_len != expected {
            return Err(KernelError::Attribute(format!(
                "storage holds {} bytes but shape {:?} of {:?} needs {expected}",
                tensor.byte_len,
                shape.dims(),
                tensor.desc.dtype
            )));
        }

        ledger.acquire_attr();
        trace!(dims = ?shape.dims(), dtype = ?tensor.desc.dtype, "tensor attr acquired");
        Ok(Self {
            dtype: tensor.desc.dtype,
            shape,
            layout,
            extents,
            quant: tensor.desc.quant,
            ledger: ledger.clone(),
        })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    pub fn extents(&self) -> Extents {
        self.extents
    }

    pub fn quant(&self) -> Option<Quantization> {
        self.quant
    }

    /// Total element count.
    pub fn size(&self) -> usize {
        self.shape.numel()
    }
}

impl Drop for TensorAttr {
    fn drop(&mut self) {
        self.ledger.release_attr();
    }
}
