// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for node execution and graph scheduling.

use tensor_core::{DType, TensorError};

/// Errors raised by a single node's forward pass.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// An input name is absent from the symbol table.
    #[error("{op}: input '{key}' not found in symbol table")]
    MissingInput { op: &'static str, key: String },

    /// The operator does not support the element type bound to `key`.
    #[error("{op}: unsupported element type {dtype} for '{key}'")]
    UnsupportedType {
        op: &'static str,
        key: String,
        dtype: DType,
    },

    /// An existing output tensor holds a different element type.
    #[error("{op}: output '{key}' holds {actual}, expected {expected}")]
    OutputTypeMismatch {
        op: &'static str,
        key: String,
        expected: DType,
        actual: DType,
    },

    /// An attribute value is out of range or inconsistent with the inputs.
    #[error("{op}: invalid attribute: {detail}")]
    InvalidAttribute { op: &'static str, detail: String },

    /// The underlying kernel failed.
    #[error("{op}: {source}")]
    Tensor {
        op: &'static str,
        #[source]
        source: TensorError,
    },
}

impl NodeError {
    /// Wraps a kernel error with the operator name.
    pub fn tensor(op: &'static str) -> impl FnOnce(TensorError) -> NodeError {
        move |source| NodeError::Tensor { op, source }
    }
}

/// Structural errors found while scheduling a graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The graph has no nodes.
    #[error("graph contains no nodes")]
    EmptyGraph,

    /// Kahn layering stalled before every node was placed.
    #[error("graph contains a cycle: only {scheduled} of {total} nodes could be scheduled")]
    Cycle { scheduled: usize, total: usize },

    /// Two nodes declare the same output name.
    #[error("output '{output}' is produced by both node {first} and node {second}")]
    DuplicateProducer {
        output: String,
        first: usize,
        second: usize,
    },
}
