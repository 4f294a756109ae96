#![allow(dead_code)]

use anyhow::Result;
use blockport_core::{tensor_to_f32, DataLayout, Shape, Tensor, TensorHandle};
use blockport_kernels::DepthToSpaceMode;

/// Scatter-style reference: walks the input and places each element.
pub fn reference(
    input: &[f32],
    [w, h, d, n]: [usize; 4],
    bs: usize,
    mode: DepthToSpaceMode,
) -> Vec<f32> {
    let (ow, oh, od) = (w * bs, h * bs, d / (bs * bs));
    let mut out = vec![f32::NAN; input.len()];
    for b in 0..n {
        for c in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let (bh, bw, oc) = match mode {
                        DepthToSpaceMode::Crd => {
                            let rem = c % (bs * bs);
                            (rem / bs, rem % bs, c / (bs * bs))
                        }
                        DepthToSpaceMode::Dcr => {
                            let blk = c / od;
                            (blk / bs, blk % bs, c % od)
                        }
                    };
                    let (xo, yo) = (x * bs + bw, y * bs + bh);
                    let src = x + w * (y + h * (c + d * b));
                    let dst = xo + ow * (yo + oh * (oc + od * b));
                    out[dst] = input[src];
                }
            }
        }
    }
    out
}

pub fn iota(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}

pub fn f32_handle(dims: &[usize], data: &[f32]) -> TensorHandle {
    TensorHandle::new(Tensor::from_f32(Shape::from_slice(dims), data))
}

pub fn zeros_handle(dims: &[usize]) -> TensorHandle {
    TensorHandle::new(Tensor::zeros(
        blockport_core::DType::F32,
        Shape::from_slice(dims),
    ))
}

pub fn values(handle: &TensorHandle) -> Result<Vec<f32>> {
    Ok(tensor_to_f32(&handle.snapshot()?)?)
}

/// Reorder WHCN-ordered values into the CWHN storage order.
pub fn whcn_to_cwhn(values: &[f32], [w, h, d, n]: [usize; 4]) -> Vec<f32> {
    let ext = blockport_core::Extents::new(w, h, d, n);
    let mut out = vec![0.0; values.len()];
    for b in 0..n {
        for c in 0..d {
            for y in 0..h {
                for x in 0..w {
                    out[DataLayout::Cwhn.linear_index(&ext, x, y, c, b)] =
                        values[DataLayout::Whcn.linear_index(&ext, x, y, c, b)];
                }
            }
        }
    }
    out
}
