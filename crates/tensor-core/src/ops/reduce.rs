// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reductions.

use crate::{Element, Tensor, TensorError};

/// Returns the flat index of the first maximum in row-major order.
///
/// Ties resolve to the earliest index. NaNs never compare greater and
/// are therefore never selected unless they come first.
///
/// # Errors
/// Returns [`TensorError::EmptyTensor`] for a tensor with no elements.
pub fn arg_max<T: Element>(input: &Tensor<T>) -> Result<usize, TensorError> {
    let data = input.as_slice();
    let (first, rest) = data
        .split_first()
        .ok_or(TensorError::EmptyTensor { op: "arg_max" })?;
    let mut best = (0, *first);
    for (i, &x) in rest.iter().enumerate() {
        if x > best.1 {
            best = (i + 1, x);
        }
    }
    Ok(best.0)
}
