// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Broadcasting Add, Sub and Mul.

use super::unsupported;
use crate::{NodeError, SymbolTable};
use std::sync::Arc;
use tensor_core::{dispatch_numeric, ops, Element, Shape, Tensor, TensorError};

/// `c = a (op) b` with broadcasting. Shared by the three arithmetic variants.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BinaryNode {
    pub a: String,
    pub b: String,
    pub c: String,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BinaryKind {
    Add,
    Sub,
    Mul,
}

impl BinaryKind {
    fn op(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
        }
    }

    fn apply<T: Element>(self, a: &Tensor<T>, b: &Tensor<T>, c: &mut Tensor<T>) -> Result<(), TensorError> {
        match self {
            Self::Add => ops::add(a, b, c),
            Self::Sub => ops::subtract(a, b, c),
            Self::Mul => ops::multiply_elementwise(a, b, c),
        }
    }
}

impl BinaryNode {
    pub fn new(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            c: c.into(),
        }
    }

    pub(crate) fn forward(&self, kind: BinaryKind, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = kind.op();
        let a = table.input(op, &self.a)?;
        let b = table.input(op, &self.b)?;
        // Shape errors must surface before an output is bound.
        let shape = Shape::broadcast(a.shape(), b.shape()).map_err(NodeError::tensor(op))?;

        dispatch_numeric!(&a, |lhs| {
            let rhs = typed_like(lhs, &b).ok_or_else(|| unsupported(op, &self.b, b.dtype()))?;
            let out = table.output(op, &self.c, &shape)?;
            kind.apply(lhs, &rhs, out).map_err(NodeError::tensor(op))
        })
    }
}

/// Downcasts `value` to the element type of `_like`.
fn typed_like<T: Element>(_like: &Arc<Tensor<T>>, value: &tensor_core::TensorValue) -> Option<Arc<Tensor<T>>> {
    value.downcast_arc::<T>()
}
