use anyhow::{ensure, Result};
use bytes::Bytes;
use blockport_core::{
    encode_f32, from_buffer, tensor_to_f32, to_buffer, CudaBuf, DType, DataLayout, Device,
    FloatBuffer, KernelError, Quantization, ResourceLedger, Shape, Tensor, TensorAttr,
    TensorHandle, TensorStorage,
};

#[test]
fn f32_round_trip_through_handle() -> Result<()> {
    let ledger = ResourceLedger::new();
    let data: Vec<f32> = (0..6).map(|i| i as f32 * 0.25).collect();
    let handle = TensorHandle::new(Tensor::from_f32(Shape::from_slice(&[3, 2]), &data));

    {
        let attr = TensorAttr::read(&handle, DataLayout::Whcn, &ledger)?;
        ensure!(attr.size() == 6, "unexpected element count {}", attr.size());

        let mut buf = to_buffer(&handle, &attr, &ledger)?;
        assert_eq!(&buf[..], &data[..]);
        buf.iter_mut().for_each(|v| *v += 1.0);
        from_buffer(&handle, &attr, &buf, attr.size())?;
    }

    let out = tensor_to_f32(&handle.snapshot()?)?;
    assert_eq!(out, data.iter().map(|v| v + 1.0).collect::<Vec<_>>());

    let stats = ledger.stats();
    assert_eq!(stats.attrs_acquired, 1);
    assert_eq!(stats.buffers_acquired, 1);
    assert!(stats.is_balanced(), "{stats:?}");
    Ok(())
}

#[test]
fn f16_values_widen_exactly() -> Result<()> {
    let bytes = encode_f32(DType::F16, None, &[1.5, -2.0, 0.125])?;
    assert_eq!(bytes.len(), 6);
    let tensor = Tensor::from_cpu_bytes(DType::F16, Shape::from_slice(&[3]), bytes);
    assert_eq!(tensor_to_f32(&tensor)?, vec![1.5, -2.0, 0.125]);
    Ok(())
}

#[test]
fn quantized_u8_dequantizes_and_saturates() -> Result<()> {
    let quant = Quantization {
        scale: 0.5,
        zero_point: 128,
    };
    let tensor = Tensor::from_cpu_bytes(
        DType::U8,
        Shape::from_slice(&[4]),
        Bytes::from_static(&[128, 130, 0, 255]),
    )
    .with_quantization(quant);
    assert_eq!(tensor_to_f32(&tensor)?, vec![0.0, 1.0, -64.0, 63.5]);

    let encoded = encode_f32(DType::U8, Some(quant), &[1.0, 1000.0, -1000.0, 0.3])?;
    assert_eq!(&encoded[..], &[130, 255, 0, 129]);
    Ok(())
}

#[test]
fn plain_integers_round_half_away_and_clamp() -> Result<()> {
    let encoded = encode_f32(DType::I8, None, &[1.4, 2.5, -2.5, -200.0])?;
    assert_eq!(&encoded[..], &[1u8, 3, (-3i8) as u8, (-128i8) as u8]);

    let encoded = encode_f32(DType::I32, None, &[7.0, -7.0])?;
    let tensor = Tensor::from_cpu_bytes(DType::I32, Shape::from_slice(&[2]), encoded);
    assert_eq!(tensor_to_f32(&tensor)?, vec![7.0, -7.0]);
    Ok(())
}

#[test]
fn bad_quantization_scale_is_a_conversion_error() {
    let quant = Quantization {
        scale: 0.0,
        zero_point: 0,
    };
    let err = encode_f32(DType::U8, Some(quant), &[1.0]).unwrap_err();
    assert!(matches!(err, KernelError::Conversion { dtype: DType::U8, .. }), "{err}");
}

#[test]
fn attribute_reader_rejects_bad_handles() {
    let ledger = ResourceLedger::new();

    let rank5 = TensorHandle::new(Tensor::zeros(DType::F32, Shape::from_slice(&[1, 1, 1, 1, 2])));
    let err = TensorAttr::read(&rank5, DataLayout::Whcn, &ledger).unwrap_err();
    assert!(matches!(err, KernelError::Attribute(_)), "{err}");

    let short = TensorHandle::new(Tensor::from_cpu_bytes(
        DType::F32,
        Shape::from_slice(&[2, 2]),
        Bytes::from_static(&[0; 12]),
    ));
    let err = TensorAttr::read(&short, DataLayout::Whcn, &ledger).unwrap_err();
    assert!(matches!(err, KernelError::Attribute(_)), "{err}");

    assert_eq!(ledger.stats().attrs_acquired, 0);
}

#[test]
fn poisoned_handle_fails_attribute_read() {
    let ledger = ResourceLedger::new();
    let handle = TensorHandle::new(Tensor::zeros(DType::F32, Shape::from_slice(&[2])));

    let poisoner = handle.clone();
    let joined = std::thread::spawn(move || {
        let _guard = poisoner.write().unwrap();
        panic!("poison the tensor lock");
    })
    .join();
    assert!(joined.is_err());

    let err = TensorAttr::read(&handle, DataLayout::Whcn, &ledger).unwrap_err();
    assert!(matches!(err, KernelError::Attribute(_)), "{err}");
}

#[test]
fn device_storage_cannot_be_marshalled() -> Result<()> {
    let ledger = ResourceLedger::new();
    let handle = TensorHandle::new(cuda_tensor(&[4]));

    let attr = TensorAttr::read(&handle, DataLayout::Whcn, &ledger)?;
    let err = to_buffer(&handle, &attr, &ledger).unwrap_err();
    assert!(matches!(err, KernelError::Conversion { .. }), "{err}");

    let err = from_buffer(&handle, &attr, &[0.0; 4], 4).unwrap_err();
    assert!(matches!(err, KernelError::Write(_)), "{err}");

    drop(attr);
    assert!(ledger.stats().is_balanced());
    Ok(())
}

#[test]
fn write_back_checks_element_count() -> Result<()> {
    let ledger = ResourceLedger::new();
    let handle = TensorHandle::new(Tensor::zeros(DType::F32, Shape::from_slice(&[4])));
    let attr = TensorAttr::read(&handle, DataLayout::Whcn, &ledger)?;

    let err = from_buffer(&handle, &attr, &[1.0; 3], 3).unwrap_err();
    assert!(matches!(err, KernelError::Write(_)), "{err}");
    assert_eq!(tensor_to_f32(&handle.snapshot()?)?, vec![0.0; 4]);
    Ok(())
}

#[test]
fn scratch_limit_rejects_oversized_buffers() -> Result<()> {
    let ledger = ResourceLedger::with_byte_limit(16);

    let small = FloatBuffer::zeroed(4, &ledger)?;
    assert_eq!(small.len(), 4);
    assert!(small.iter().all(|v| *v == 0.0));

    let err = FloatBuffer::zeroed(1, &ledger).unwrap_err();
    assert!(
        matches!(err, KernelError::Allocation { requested: 4, .. }),
        "{err}"
    );
    assert_eq!(ledger.stats().live_bytes, 16);

    drop(small);
    let stats = ledger.stats();
    assert_eq!(stats.buffers_acquired, 1);
    assert!(stats.is_balanced(), "{stats:?}");
    Ok(())
}

fn cuda_tensor(dims: &[usize]) -> Tensor {
    let shape = Shape::from_slice(dims);
    let byte_len = shape.numel() * DType::F32.byte_size();
    let mut tensor = Tensor::zeros(DType::F32, shape);
    tensor.desc.device = Device::Cuda { device_id: 0 };
    tensor.storage = TensorStorage::CudaDevice(CudaBuf {
        device_id: 0,
        bytes: Bytes::from(vec![0u8; byte_len]),
    });
    tensor
}
