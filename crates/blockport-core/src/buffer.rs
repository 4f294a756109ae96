use std::ops::{Deref, DerefMut};

use bytes::{BufMut, Bytes, BytesMut};
use half::f16;
use tracing::trace;

use crate::{
    DType, KernelError, KernelResult, PinnedBuf, Quantization, ResourceLedger, Tensor,
    TensorAttr, TensorHandle, TensorStorage,
};

/// Flat `f32` scratch buffer scoped to a single kernel invocation.
#[derive(Debug)]
pub struct FloatBuffer {
    data: Vec<f32>,
    reserved: usize,
    ledger: ResourceLedger,
}

impl FloatBuffer {
    pub fn zeroed(len: usize, ledger: &ResourceLedger) -> KernelResult<Self> {
        let mut buffer = Self::with_capacity(len, ledger, "output buffer")?;
        buffer.data.resize(len, 0.0);
        Ok(buffer)
    }

    fn with_capacity(len: usize, ledger: &ResourceLedger, what: &'static str) -> KernelResult<Self> {
        let requested = len
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or(KernelError::Allocation {
                what,
                requested: usize::MAX,
            })?;
        ledger.reserve_buffer(what, requested)?;
        // From here on the reservation is owned by `buffer` and returned on drop.
        let mut buffer = Self {
            data: Vec::new(),
            reserved: requested,
            ledger: ledger.clone(),
        };
        buffer
            .data
            .try_reserve_exact(len)
            .map_err(|_| KernelError::Allocation { what, requested })?;
        trace!(what, bytes = requested, "float buffer acquired");
        Ok(buffer)
    }
}

impl Deref for FloatBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for FloatBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl Drop for FloatBuffer {
    fn drop(&mut self) {
        self.ledger.release_buffer(self.reserved);
    }
}

/// Materialize the tensor behind `handle` as normalized floats.
pub fn to_buffer(
    handle: &TensorHandle,
    attr: &TensorAttr,
    ledger: &ResourceLedger,
) -> KernelResult<FloatBuffer> {
    let tensor = handle.read().map_err(|e| KernelError::Conversion {
        dtype: attr.dtype(),
        reason: e.to_string(),
    })?;
    ensure_matches(&tensor, attr).map_err(|reason| KernelError::Conversion {
        dtype: attr.dtype(),
        reason,
    })?;
    let bytes = tensor.host_bytes().ok_or_else(|| KernelError::Conversion {
        dtype: attr.dtype(),
        reason: "device-resident storage is not host readable".to_string(),
    })?;
    let expected = attr.size() * attr.dtype().byte_size();
    if bytes.len() != expected {
        return Err(KernelError::Conversion {
            dtype: attr.dtype(),
            reason: format!("storage holds {} bytes, expected {expected}", bytes.len()),
        });
    }

    let mut buffer = FloatBuffer::with_capacity(attr.size(), ledger, "input buffer")?;
    decode_into(attr.dtype(), attr.quant(), bytes, &mut buffer.data)?;
    Ok(buffer)
}

/// Convert `buffer[..element_count]` to the tensor's native representation
/// and store it. The tensor is only replaced once encoding has succeeded.
pub fn from_buffer(
    handle: &TensorHandle,
    attr: &TensorAttr,
    buffer: &[f32],
    element_count: usize,
) -> KernelResult<()> {
    if element_count != attr.size() || buffer.len() < element_count {
        return Err(KernelError::Write(format!(
            "tensor holds {} elements, got {element_count} from a buffer of {}",
            attr.size(),
            buffer.len()
        )));
    }
    let encoded = encode_f32(attr.dtype(), attr.quant(), &buffer[..element_count])?;

    let mut tensor = handle.write()?;
    ensure_matches(&tensor, attr).map_err(KernelError::Write)?;
    let storage = match &tensor.storage {
        TensorStorage::CpuBytes(_) => TensorStorage::CpuBytes(encoded),
        TensorStorage::CpuPinned(_) => TensorStorage::CpuPinned(PinnedBuf { bytes: encoded }),
        TensorStorage::CudaDevice(buf) => {
            return Err(KernelError::Write(format!(
                "cuda:{} storage cannot accept host data",
                buf.device_id
            )))
        }
    };
    tensor.storage = storage;
    Ok(())
}

/// Decode a whole host tensor into floats, outside of any kernel invocation.
pub fn tensor_to_f32(tensor: &Tensor) -> KernelResult<Vec<f32>> {
    let dtype = tensor.desc.dtype;
    let bytes = tensor.host_bytes().ok_or_else(|| KernelError::Conversion {
        dtype,
        reason: "device-resident storage is not host readable".to_string(),
    })?;
    let mut out = Vec::with_capacity(tensor.desc.shape.numel());
    decode_into(dtype, tensor.desc.quant, bytes, &mut out)?;
    Ok(out)
}

pub fn encode_f32(
    dtype: DType,
    quant: Option<Quantization>,
    values: &[f32],
) -> KernelResult<Bytes> {
    let mut out = BytesMut::with_capacity(values.len() * dtype.byte_size());
    match dtype {
        DType::F32 => values.iter().for_each(|v| out.put_f32_le(*v)),
        DType::F16 => values
            .iter()
            .for_each(|v| out.put_slice(&f16::from_f32(*v).to_le_bytes())),
        DType::I64 | DType::I32 | DType::I8 | DType::U8 => {
            let quant = checked_quant(dtype, quant)?;
            for v in values {
                let q = quantize(dtype, quant, *v);
                match dtype {
                    DType::I64 => out.put_i64_le(q),
                    DType::I32 => out.put_i32_le(q as i32),
                    DType::I8 => out.put_i8(q as i8),
                    _ => out.put_u8(q as u8),
                }
            }
        }
    }
    Ok(out.freeze())
}

fn decode_into(
    dtype: DType,
    quant: Option<Quantization>,
    bytes: &[u8],
    out: &mut Vec<f32>,
) -> KernelResult<()> {
    let width = dtype.byte_size();
    if bytes.len() % width != 0 {
        return Err(KernelError::Conversion {
            dtype,
            reason: format!("{} bytes is not a whole number of elements", bytes.len()),
        });
    }

    let chunks = bytes.chunks_exact(width);
    match dtype {
        DType::F32 => out.extend(chunks.map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
        DType::F16 => out.extend(chunks.map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())),
        DType::I64 | DType::I32 | DType::I8 | DType::U8 => {
            let quant = checked_quant(dtype, quant)?;
            out.extend(chunks.map(|b| {
                let raw = match dtype {
                    DType::I64 => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                    DType::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
                    DType::I8 => b[0] as i8 as i64,
                    _ => b[0] as i64,
                };
                dequantize(quant, raw)
            }));
        }
    }
    Ok(())
}

fn checked_quant(dtype: DType, quant: Option<Quantization>) -> KernelResult<Option<Quantization>> {
    match quant {
        Some(q) if !(q.scale.is_finite() && q.scale > 0.0) => Err(KernelError::Conversion {
            dtype,
            reason: format!("quantization scale must be positive and finite, got {}", q.scale),
        }),
        other => Ok(other),
    }
}

fn dequantize(quant: Option<Quantization>, raw: i64) -> f32 {
    match quant {
        Some(q) => raw.saturating_sub(q.zero_point as i64) as f32 * q.scale,
        None => raw as f32,
    }
}

fn quantize(dtype: DType, quant: Option<Quantization>, value: f32) -> i64 {
    let (min, max) = dtype.integer_range().unwrap_or((i64::MIN, i64::MAX));
    let q = match quant {
        Some(q) => ((value / q.scale).round() as i64).saturating_add(q.zero_point as i64),
        None => value.round() as i64,
    };
    q.clamp(min, max)
}

fn ensure_matches(tensor: &Tensor, attr: &TensorAttr) -> Result<(), String> {
    if tensor.desc.dtype != attr.dtype() || tensor.desc.shape != *attr.shape() {
        return Err(format!(
            "tensor changed since its attributes were read: now {:?} {:?}",
            tensor.desc.dtype,
            tensor.desc.shape.dims()
        ));
    }
    Ok(())
}
