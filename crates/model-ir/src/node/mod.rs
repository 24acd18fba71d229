// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator nodes.
//!
//! A [`Node`] owns only the names of its inputs and outputs plus its
//! scalar attributes; tensors live in the [`SymbolTable`]. Every variant
//! honours the same forward contract:
//!
//! 1. look up each input by name ([`NodeError::MissingInput`] if absent);
//! 2. match the element type once and reject unsupported ones
//!    ([`NodeError::UnsupportedType`]);
//! 3. bind or allocate each output through [`SymbolTable::output`];
//! 4. run the kernel into that output and touch nothing else.
//!
//! New operators are new variants, so every `match` over [`Node`] stays
//! exhaustive.

mod activation;
mod binary;
mod conv;
mod layout;
mod linear;
mod normalize;
mod passthrough;
mod pool;

pub use activation::{Activation, ActivationNode};
pub use binary::BinaryNode;
pub use conv::ConvNode;
pub use layout::{FlattenNode, ReshapeNode, TransposeNode};
pub use linear::{GemmNode, MatMulNode};
pub use normalize::{LrnNode, SoftmaxNode};
pub use passthrough::{ConstantNode, DropoutNode};
pub use pool::{AvgPoolNode, MaxPoolNode};

use crate::{NodeError, SymbolTable};
use binary::BinaryKind;
use tensor_core::{DType, GemmAlgorithm};

/// Execution settings handed to every forward call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardOptions {
    /// GEMM loop order used by MatMul, Gemm and Conv.
    pub gemm: GemmAlgorithm,
}

/// One operator instance in the graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op_type")]
pub enum Node {
    Add(BinaryNode),
    Sub(BinaryNode),
    Mul(BinaryNode),
    MatMul(MatMulNode),
    Gemm(GemmNode),
    Conv(ConvNode),
    Softmax(SoftmaxNode),
    LogSoftmax(SoftmaxNode),
    Activation(ActivationNode),
    #[serde(rename = "LRN")]
    Lrn(LrnNode),
    MaxPool(MaxPoolNode),
    #[serde(rename = "AveragePool")]
    AvgPool(AvgPoolNode),
    Reshape(ReshapeNode),
    Transpose(TransposeNode),
    Flatten(FlattenNode),
    Dropout(DropoutNode),
    Constant(ConstantNode),
}

impl Node {
    /// ONNX-style operator name, used in errors and logs.
    pub fn op_type(&self) -> &'static str {
        match self {
            Node::Add(_) => "Add",
            Node::Sub(_) => "Sub",
            Node::Mul(_) => "Mul",
            Node::MatMul(_) => "MatMul",
            Node::Gemm(_) => "Gemm",
            Node::Conv(_) => "Conv",
            Node::Softmax(_) => "Softmax",
            Node::LogSoftmax(_) => "LogSoftmax",
            Node::Activation(n) => n.kind.op_type(),
            Node::Lrn(_) => "LRN",
            Node::MaxPool(_) => "MaxPool",
            Node::AvgPool(_) => "AveragePool",
            Node::Reshape(_) => "Reshape",
            Node::Transpose(_) => "Transpose",
            Node::Flatten(_) => "Flatten",
            Node::Dropout(_) => "Dropout",
            Node::Constant(_) => "Constant",
        }
    }

    /// Names this node reads, optional inputs included only when set.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Node::Add(n) | Node::Sub(n) | Node::Mul(n) => vec![n.a.as_str(), n.b.as_str()],
            Node::MatMul(n) => vec![n.a.as_str(), n.b.as_str()],
            Node::Gemm(n) => names(&[&n.a, &n.b], &[n.c.as_ref()]),
            Node::Conv(n) => names(&[&n.x, &n.w], &[n.b.as_ref()]),
            Node::Softmax(n) | Node::LogSoftmax(n) => vec![n.x.as_str()],
            Node::Activation(n) => vec![n.x.as_str()],
            Node::Lrn(n) => vec![n.x.as_str()],
            Node::MaxPool(n) => vec![n.x.as_str()],
            Node::AvgPool(n) => vec![n.x.as_str()],
            Node::Reshape(n) => vec![n.data.as_str(), n.shape.as_str()],
            Node::Transpose(n) => vec![n.x.as_str()],
            Node::Flatten(n) => vec![n.x.as_str()],
            Node::Dropout(n) => names(&[&n.x], &[n.ratio.as_ref(), n.training_mode.as_ref()]),
            Node::Constant(_) => Vec::new(),
        }
    }

    /// Names this node writes, optional outputs included only when set.
    pub fn outputs(&self) -> Vec<&str> {
        match self {
            Node::Add(n) | Node::Sub(n) | Node::Mul(n) => vec![n.c.as_str()],
            Node::MatMul(n) => vec![n.y.as_str()],
            Node::Gemm(n) => vec![n.y.as_str()],
            Node::Conv(n) => vec![n.y.as_str()],
            Node::Softmax(n) | Node::LogSoftmax(n) => vec![n.y.as_str()],
            Node::Activation(n) => vec![n.y.as_str()],
            Node::Lrn(n) => vec![n.y.as_str()],
            Node::MaxPool(n) => names(&[&n.y], &[n.indices.as_ref()]),
            Node::AvgPool(n) => vec![n.y.as_str()],
            Node::Reshape(n) => vec![n.reshaped.as_str()],
            Node::Transpose(n) => vec![n.y.as_str()],
            Node::Flatten(n) => vec![n.y.as_str()],
            Node::Dropout(n) => names(&[&n.y], &[n.mask.as_ref()]),
            Node::Constant(n) => vec![n.y.as_str()],
        }
    }

    /// Runs the operator against `table`.
    pub fn forward(&self, table: &mut SymbolTable, options: &ForwardOptions) -> Result<(), NodeError> {
        tracing::trace!(op = self.op_type(), outputs = ?self.outputs(), "forward");
        match self {
            Node::Add(n) => n.forward(BinaryKind::Add, table),
            Node::Sub(n) => n.forward(BinaryKind::Sub, table),
            Node::Mul(n) => n.forward(BinaryKind::Mul, table),
            Node::MatMul(n) => n.forward(table, options),
            Node::Gemm(n) => n.forward(table, options),
            Node::Conv(n) => n.forward(table, options),
            Node::Softmax(n) => n.forward("Softmax", table, false),
            Node::LogSoftmax(n) => n.forward("LogSoftmax", table, true),
            Node::Activation(n) => n.forward(table),
            Node::Lrn(n) => n.forward(table),
            Node::MaxPool(n) => n.forward(table),
            Node::AvgPool(n) => n.forward(table),
            Node::Reshape(n) => n.forward(table),
            Node::Transpose(n) => n.forward(table),
            Node::Flatten(n) => n.forward(table),
            Node::Dropout(n) => n.forward(table),
            Node::Constant(n) => n.forward(table),
        }
    }
}

fn names<'a>(required: &[&'a String], optional: &[Option<&'a String>]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .chain(optional.iter().flatten().copied())
        .map(String::as_str)
        .collect()
}

pub(crate) fn unsupported(op: &'static str, key: &str, dtype: DType) -> NodeError {
    NodeError::UnsupportedType {
        op,
        key: key.to_string(),
        dtype,
    }
}

pub(crate) fn invalid(op: &'static str, detail: impl Into<String>) -> NodeError {
    NodeError::InvalidAttribute {
        op,
        detail: detail.into(),
    }
}
