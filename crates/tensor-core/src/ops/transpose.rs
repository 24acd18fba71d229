// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Axis permutation.

use crate::{Element, Shape, Tensor, TensorError};

/// Validates `perm` against `rank`, defaulting to reversed axes.
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] unless `perm` is a
/// permutation of `0..rank`.
pub fn resolve_permutation(rank: usize, perm: Option<&[usize]>) -> Result<Vec<usize>, TensorError> {
    let Some(perm) = perm else {
        return Ok((0..rank).rev().collect());
    };
    let mut seen = vec![false; rank];
    let valid = perm.len() == rank
        && perm.iter().all(|&p| {
            if p >= rank || seen[p] {
                false
            } else {
                seen[p] = true;
                true
            }
        });
    if !valid {
        return Err(TensorError::InvalidArgument {
            op: "transpose",
            detail: format!("{perm:?} is not a permutation of {rank} axes"),
        });
    }
    Ok(perm.to_vec())
}

/// Output shape of transposing `shape` by `perm`.
pub fn transposed_shape(shape: &Shape, perm: &[usize]) -> Shape {
    Shape::new(perm.iter().map(|&p| shape.dims()[p]).collect())
}

/// `output[i_0, .., i_{r-1}] = input[j]` where `j[perm[a]] = i_a`.
///
/// `perm` must already be validated with [`resolve_permutation`] and
/// `output` must have [`transposed_shape`].
pub fn transpose<T: Element>(input: &Tensor<T>, perm: &[usize], output: &mut Tensor<T>) -> Result<(), TensorError> {
    let perm = resolve_permutation(input.rank(), Some(perm))?;
    let expected = transposed_shape(input.shape(), &perm);
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "transpose (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let in_strides = input.shape().strides();
    // Stride in the input for a unit step along each output axis.
    let walk: Vec<usize> = perm.iter().map(|&p| in_strides[p]).collect();
    let out_dims = expected.dims().to_vec();
    let src = input.as_slice();
    let dst = output.as_mut_slice();

    let mut index = vec![0usize; out_dims.len()];
    let mut offset = 0usize;
    for slot in dst.iter_mut() {
        *slot = src[offset];
        for axis in (0..out_dims.len()).rev() {
            index[axis] += 1;
            offset += walk[axis];
            if index[axis] < out_dims[axis] {
                break;
            }
            offset -= walk[axis] * index[axis];
            index[axis] = 0;
        }
    }
    Ok(())
}
