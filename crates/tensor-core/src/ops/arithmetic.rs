// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binary arithmetic with broadcasting, scalar multiply and equality.
//!
//! All broadcasting kernels share [`broadcast_binary`]: the output shape
//! is `Shape::broadcast(lhs, rhs)` and each input is read through
//! strides that are zero along its broadcast (size-1 or missing)
//! dimensions.

use crate::{Element, Shape, Tensor, TensorError};

/// `output = lhs + rhs` with broadcasting.
///
/// Integer types wrap on overflow.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the inputs cannot be
/// broadcast together, or if `output` does not already have the
/// broadcast shape. Nothing is written on error.
pub fn add<T: Element>(lhs: &Tensor<T>, rhs: &Tensor<T>, output: &mut Tensor<T>) -> Result<(), TensorError> {
    broadcast_binary("add", lhs, rhs, output, |a, b| a.wrapping_add(b))
}

/// `output = lhs - rhs` with broadcasting.
///
/// Integer types wrap on overflow, so `0u32 - 1` is `u32::MAX`.
pub fn subtract<T: Element>(
    lhs: &Tensor<T>,
    rhs: &Tensor<T>,
    output: &mut Tensor<T>,
) -> Result<(), TensorError> {
    broadcast_binary("subtract", lhs, rhs, output, |a, b| a.wrapping_sub(b))
}

/// `output = lhs * rhs` element-wise with broadcasting; integers wrap.
pub fn multiply_elementwise<T: Element>(
    lhs: &Tensor<T>,
    rhs: &Tensor<T>,
    output: &mut Tensor<T>,
) -> Result<(), TensorError> {
    broadcast_binary("multiply", lhs, rhs, output, |a, b| a.wrapping_mul(b))
}

/// `output = input * scalar`.
pub fn multiply<T: Element>(input: &Tensor<T>, scalar: T, output: &mut Tensor<T>) -> Result<(), TensorError> {
    crate::ops::elementwise(input, |x| x.wrapping_mul(scalar), output)
}

/// Exact element-wise equality of two tensors with identical shapes.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the shapes differ.
pub fn equals<T: Element>(lhs: &Tensor<T>, rhs: &Tensor<T>) -> Result<bool, TensorError> {
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "equals",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    Ok(lhs.as_slice() == rhs.as_slice())
}

/// Shared broadcasting driver.
pub(crate) fn broadcast_binary<T, F>(
    op: &'static str,
    lhs: &Tensor<T>,
    rhs: &Tensor<T>,
    output: &mut Tensor<T>,
    f: F,
) -> Result<(), TensorError>
where
    T: Element,
    F: Fn(T, T) -> T,
{
    let shape = Shape::broadcast(lhs.shape(), rhs.shape()).map_err(|_| TensorError::ShapeMismatch {
        op,
        lhs: lhs.shape().clone(),
        rhs: rhs.shape().clone(),
    })?;
    if output.shape() != &shape {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: shape,
            rhs: output.shape().clone(),
        });
    }

    let (a, b) = (lhs.as_slice(), rhs.as_slice());
    let out = output.as_mut_slice();

    // Same shapes: straight zip.
    if lhs.shape() == rhs.shape() {
        for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
            *o = f(x, y);
        }
        return Ok(());
    }

    let rank = shape.rank();
    let dims = shape.dims();
    let a_strides = broadcast_strides(lhs.shape(), rank);
    let b_strides = broadcast_strides(rhs.shape(), rank);
    let mut index = vec![0usize; rank];
    let (mut ai, mut bi) = (0usize, 0usize);

    for o in out.iter_mut() {
        *o = f(a[ai], b[bi]);
        for axis in (0..rank).rev() {
            index[axis] += 1;
            ai += a_strides[axis];
            bi += b_strides[axis];
            if index[axis] < dims[axis] {
                break;
            }
            ai -= a_strides[axis] * dims[axis];
            bi -= b_strides[axis] * dims[axis];
            index[axis] = 0;
        }
    }
    Ok(())
}

/// Row-major strides of `shape` aligned to `rank`, zero on broadcast axes.
fn broadcast_strides(shape: &Shape, rank: usize) -> Vec<usize> {
    let strides = shape.strides();
    let pad = rank - shape.rank();
    (0..rank)
        .map(|axis| {
            if axis < pad || shape.dims()[axis - pad] == 1 {
                0
            } else {
                strides[axis - pad]
            }
        })
        .collect()
}
