// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax and log-softmax along an axis.

use crate::{Float, Tensor, TensorError};

/// Computes softmax along `axis`: `y = exp(x - max) / sum(exp(x - max))`.
///
/// Uses the numerically stable variant that subtracts the maximum value
/// before exponentiation to prevent overflow. Negative axes count from
/// the end.
///
/// # Errors
/// Returns [`TensorError::InvalidAxis`] for an axis outside the rank and
/// [`TensorError::ShapeMismatch`] if input and output shapes differ.
pub fn softmax<T: Float>(input: &Tensor<T>, axis: i64, output: &mut Tensor<T>) -> Result<(), TensorError> {
    normalize_along("softmax", input, axis, output, |row_src, row_dst| {
        let max_val = row_max(row_src);
        let mut sum = T::ZERO;
        for (d, &s) in row_dst.iter_mut().zip(row_src) {
            let e = (s - max_val).exp();
            *d = e;
            sum += e;
        }
        if sum > T::ZERO {
            let inv_sum = T::ONE / sum;
            for d in row_dst.iter_mut() {
                *d = *d * inv_sum;
            }
        }
    })
}

/// Computes log-softmax along `axis`: `y = x - max - ln(sum(exp(x - max)))`.
pub fn log_softmax<T: Float>(
    input: &Tensor<T>,
    axis: i64,
    output: &mut Tensor<T>,
) -> Result<(), TensorError> {
    normalize_along("log_softmax", input, axis, output, |row_src, row_dst| {
        let max_val = row_max(row_src);
        let mut sum = T::ZERO;
        for &s in row_src {
            sum += (s - max_val).exp();
        }
        let log_sum = sum.ln();
        for (d, &s) in row_dst.iter_mut().zip(row_src) {
            *d = s - max_val - log_sum;
        }
    })
}

fn row_max<T: Float>(row: &[T]) -> T {
    row.iter().copied().fold(T::NEG_INFINITY, T::max)
}

/// Splits the tensor into `outer * inner` rows of length `dims[axis]` and
/// hands each (gathered) row to `f`.
fn normalize_along<T, F>(
    op: &'static str,
    input: &Tensor<T>,
    axis: i64,
    output: &mut Tensor<T>,
    mut f: F,
) -> Result<(), TensorError>
where
    T: Float,
    F: FnMut(&[T], &mut [T]),
{
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    let axis = input.shape().normalize_axis(op, axis)?;
    let dims = input.dims();
    let len = dims[axis];
    if len == 0 || input.is_empty() {
        return Ok(());
    }
    let inner: usize = dims[axis + 1..].iter().product();
    let outer = input.len() / (len * inner);

    let src = input.as_slice();
    let dst = output.as_mut_slice();

    if inner == 1 {
        // Contiguous rows.
        for (row_src, row_dst) in src.chunks_exact(len).zip(dst.chunks_exact_mut(len)) {
            f(row_src, row_dst);
        }
        return Ok(());
    }

    let mut row_src = vec![T::ZERO; len];
    let mut row_dst = vec![T::ZERO; len];
    for o in 0..outer {
        for i in 0..inner {
            let base = o * len * inner + i;
            for (k, slot) in row_src.iter_mut().enumerate() {
                *slot = src[base + k * inner];
            }
            f(&row_src, &mut row_dst);
            for (k, &v) in row_dst.iter().enumerate() {
                dst[base + k * inner] = v;
            }
        }
    }
    Ok(())
}
