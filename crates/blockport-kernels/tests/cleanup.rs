mod common;

use anyhow::Result;
use bytes::Bytes;
use blockport_core::{
    CudaBuf, DType, DataLayout, Device, KernelError, LedgerStats, Quantization, ResourceLedger,
    Shape, Tensor, TensorHandle, TensorStorage,
};
use blockport_graph::{Graph, ScalarValue};
use blockport_kernels::{execute, execute_params, DepthToSpaceMode, DepthToSpaceParams};
use common::{f32_handle, iota, values, zeros_handle};

fn run(input: &TensorHandle, output: &TensorHandle, ledger: &ResourceLedger) -> KernelError {
    execute(input, output, 2, DepthToSpaceMode::Crd, DataLayout::Whcn, ledger).unwrap_err()
}

fn assert_released(stats: LedgerStats, attrs: usize, buffers: usize) {
    assert_eq!(stats.attrs_acquired, attrs, "{stats:?}");
    assert_eq!(stats.buffers_acquired, buffers, "{stats:?}");
    assert!(stats.is_balanced(), "{stats:?}");
}

#[test]
fn input_buffer_allocation_failure() {
    let ledger = ResourceLedger::with_byte_limit(0);
    let err = run(&f32_handle(&[2, 2, 4], &iota(16)), &zeros_handle(&[4, 4, 1]), &ledger);
    assert!(matches!(err, KernelError::Allocation { what: "input buffer", .. }), "{err}");
    assert_released(ledger.stats(), 2, 0);
}

#[test]
fn output_buffer_allocation_failure() -> Result<()> {
    // Room for the 64-byte input buffer only.
    let ledger = ResourceLedger::with_byte_limit(64);
    let output = zeros_handle(&[4, 4, 1]);
    let err = run(&f32_handle(&[2, 2, 4], &iota(16)), &output, &ledger);
    assert!(matches!(err, KernelError::Allocation { what: "output buffer", .. }), "{err}");
    assert_released(ledger.stats(), 2, 1);
    assert_eq!(values(&output)?, vec![0.0; 16]);
    Ok(())
}

#[test]
fn scalar_read_failure() {
    let graph = Graph::new();
    let ledger = ResourceLedger::new();
    let params = DepthToSpaceParams {
        input: f32_handle(&[2, 2, 4], &iota(16)),
        output: zeros_handle(&[4, 4, 1]),
        block_size: graph.create_scalar(ScalarValue::F32(2.0)),
    };

    let err = execute_params(&params, DepthToSpaceMode::Crd, DataLayout::Whcn, &ledger).unwrap_err();
    assert!(matches!(err, KernelError::ScalarRead { name: "block_size", .. }), "{err}");
    assert_released(ledger.stats(), 2, 0);
}

#[test]
fn write_back_failure() {
    let ledger = ResourceLedger::new();
    let err = run(&f32_handle(&[2, 2, 4], &iota(16)), &device_handle(&[4, 4, 1]), &ledger);
    assert!(matches!(err, KernelError::Write(_)), "{err}");
    assert_released(ledger.stats(), 2, 2);
}

#[test]
fn input_conversion_failure() {
    let ledger = ResourceLedger::new();
    let err = run(&device_handle(&[2, 2, 4]), &zeros_handle(&[4, 4, 1]), &ledger);
    assert!(matches!(err, KernelError::Conversion { .. }), "{err}");
    assert_released(ledger.stats(), 2, 0);
}

#[test]
fn output_attribute_failure() {
    let ledger = ResourceLedger::new();
    let broken = TensorHandle::new(Tensor::from_cpu_bytes(
        DType::F32,
        Shape::from_slice(&[4, 4, 1]),
        Bytes::from_static(&[0; 8]),
    ));
    let err = run(&f32_handle(&[2, 2, 4], &iota(16)), &broken, &ledger);
    assert!(matches!(err, KernelError::Attribute(_)), "{err}");
    assert_released(ledger.stats(), 1, 0);
}

#[test]
fn truncated_input_storage() {
    let ledger = ResourceLedger::new();
    let mut tensor = Tensor::from_f32(Shape::from_slice(&[2, 2, 4]), &iota(16));
    // Metadata still claims 64 bytes.
    tensor.storage = TensorStorage::CpuBytes(Bytes::from(vec![0u8; 32]));
    let err = run(&TensorHandle::new(tensor), &zeros_handle(&[4, 4, 1]), &ledger);
    assert!(matches!(err, KernelError::Conversion { dtype: DType::F32, .. }), "{err}");
    assert_released(ledger.stats(), 2, 0);
}

#[test]
fn output_encode_failure_keeps_output() -> Result<()> {
    let ledger = ResourceLedger::new();
    let output = TensorHandle::new(
        Tensor::zeros(DType::U8, Shape::from_slice(&[4, 4, 1])).with_quantization(Quantization {
            scale: 0.0,
            zero_point: 0,
        }),
    );
    let err = run(&f32_handle(&[2, 2, 4], &iota(16)), &output, &ledger);
    assert!(matches!(err, KernelError::Conversion { dtype: DType::U8, .. }), "{err}");
    assert_released(ledger.stats(), 2, 2);

    let after = output.snapshot()?;
    assert_eq!(after.host_bytes().map(|b| b.to_vec()), Some(vec![0u8; 16]));
    Ok(())
}

#[test]
fn success_releases_everything_once() -> Result<()> {
    let ledger = ResourceLedger::new();
    for _ in 0..3 {
        execute(
            &f32_handle(&[2, 2, 4], &iota(16)),
            &zeros_handle(&[4, 4, 1]),
            2,
            DepthToSpaceMode::Crd,
            DataLayout::Whcn,
            &ledger,
        )?;
    }
    assert_released(ledger.stats(), 6, 6);
    Ok(())
}

fn device_handle(dims: &[usize]) -> TensorHandle {
    let shape = Shape::from_slice(dims);
    let byte_len = shape.numel() * DType::F32.byte_size();
    let mut tensor = Tensor::zeros(DType::F32, shape);
    tensor.desc.device = Device::Cuda { device_id: 1 };
    tensor.storage = TensorStorage::CudaDevice(CudaBuf {
        device_id: 1,
        bytes: Bytes::from(vec![0u8; byte_len]),
    });
    TensorHandle::new(tensor)
}
