use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use smallvec::SmallVec;

use crate::{KernelError, KernelResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
    I64,
    I32,
    I8,
    U8,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::I32 => 4,
            DType::I8 => 1,
            DType::U8 => 1,
        }
    }

    /// Representable range for integer types, as `(min, max)`.
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            DType::I64 => Some((i64::MIN, i64::MAX)),
            DType::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            DType::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            DType::U8 => Some((u8::MIN as i64, u8::MAX as i64)),
            DType::F32 | DType::F16 => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 4]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
}

/// Affine-asymmetric quantization: `real = (q - zero_point) * scale`.
///
/// Only meaningful on integer tensors; float tensors ignore it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

#[derive(Clone, Debug)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
    pub device: Device,
    pub quant: Option<Quantization>,
}

#[derive(Clone, Debug)]
pub struct PinnedBuf {
    pub bytes: Bytes,
}

#[derive(Clone, Debug)]
pub struct CudaBuf {
    pub device_id: u32,
    pub bytes: Bytes, // opaque to the host; never marshalled
}

#[derive(Clone, Debug)]
pub enum TensorStorage {
    CpuBytes(Bytes),
    CpuPinned(PinnedBuf),
    CudaDevice(CudaBuf),
}

#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub storage: TensorStorage,
    pub byte_len: usize,
}

impl Tensor {
    pub fn from_cpu_bytes(dtype: DType, shape: Shape, bytes: Bytes) -> Self {
        let byte_len = bytes.len();
        Self {
            desc: TensorDesc {
                dtype,
                shape,
                device: Device::Cpu,
                quant: None,
            },
            storage: TensorStorage::CpuBytes(bytes),
            byte_len,
        }
    }

    pub fn from_f32(shape: Shape, data: &[f32]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_cpu_bytes(DType::F32, shape, Bytes::from(bytes))
    }

    /// Zero-filled host tensor, typically used as a kernel output.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        let byte_len = shape.numel() * dtype.byte_size();
        Self::from_cpu_bytes(dtype, shape, Bytes::from(vec![0u8; byte_len]))
    }

    pub fn with_quantization(mut self, quant: Quantization) -> Self {
        self.desc.quant = Some(quant);
        self
    }

    /// Host-visible bytes, or `None` for device-resident storage.
    pub fn host_bytes(&self) -> Option<&Bytes> {
        match &self.storage {
            TensorStorage::CpuBytes(bytes) => Some(bytes),
            TensorStorage::CpuPinned(p) => Some(&p.bytes),
            TensorStorage::CudaDevice(_) => None,
        }
    }
}

/// Shared, lock-protected reference to a tensor owned by a graph.
#[derive(Clone, Debug)]
pub struct TensorHandle(Arc<RwLock<Tensor>>);

impl TensorHandle {
    pub fn new(tensor: Tensor) -> Self {
        Self(Arc::new(RwLock::new(tensor)))
    }

    pub fn read(&self) -> KernelResult<RwLockReadGuard<'_, Tensor>> {
        self.0
            .read()
            .map_err(|_| KernelError::Attribute("tensor handle is poisoned".to_string()))
    }

    pub fn write(&self) -> KernelResult<RwLockWriteGuard<'_, Tensor>> {
        self.0
            .write()
            .map_err(|_| KernelError::Write("tensor handle is poisoned".to_string()))
    }

    /// Copy of the tensor as it currently stands.
    pub fn snapshot(&self) -> KernelResult<Tensor> {
        Ok(self.read()?.clone())
    }

    pub fn same_tensor(&self, other: &TensorHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
