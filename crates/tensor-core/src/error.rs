// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::{DType, Shape};

/// Errors that can occur during tensor construction and kernel execution.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided data length does not match the element count of the shape.
    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Two tensors have incompatible shapes for the requested operation.
    ///
    /// Broadcasting failures are reported through this variant and name
    /// both operand shapes.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A reshape would change the number of elements.
    #[error("cannot reshape {from} ({} elements) into {to}", from.num_elements())]
    ReshapeMismatch { from: Shape, to: Shape },

    /// The requested reshape dimensions are malformed.
    #[error("invalid reshape: {detail}")]
    InvalidReshape { detail: String },

    /// A flat index or multi-index lies outside the tensor.
    #[error("index {index:?} out of range for shape {shape}")]
    IndexOutOfRange { index: Vec<usize>, shape: Shape },

    /// An axis argument is not valid for a tensor of the given rank.
    #[error("invalid axis {axis} for {op} on a rank-{rank} tensor")]
    InvalidAxis {
        op: &'static str,
        axis: i64,
        rank: usize,
    },

    /// The requested data type is not supported for this operation.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// The aligned allocator could not satisfy a request.
    #[error("out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// The operation needs at least one element.
    #[error("{op} requires a non-empty tensor")]
    EmptyTensor { op: &'static str },

    /// A kernel parameter is malformed (zero stride, bad permutation, ...).
    #[error("invalid argument for {op}: {detail}")]
    InvalidArgument { op: &'static str, detail: String },
}
