// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reshape, Transpose and Flatten.
//!
//! Reshape and Flatten only change metadata; the output still gets its
//! own buffer because it is bound under a different name.

use super::{invalid, unsupported};
use crate::{NodeError, SymbolTable};
use tensor_core::{dispatch_numeric, ops, Element, Shape, Tensor, TensorError};

/// Copies `input` into the output `key` under `shape`.
fn bind_reshaped<T: Element>(
    table: &mut SymbolTable,
    op: &'static str,
    key: &str,
    input: &Tensor<T>,
    shape: &Shape,
) -> Result<(), NodeError> {
    let out = table.output::<T>(op, key, shape)?;
    out.as_mut_slice().copy_from_slice(input.as_slice());
    Ok(())
}

/// Reshapes `data` to the int64 `shape` tensor.
///
/// A `0` entry copies the input dimension at the same position unless
/// `allowzero` is set; one `-1` is inferred.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReshapeNode {
    pub data: String,
    pub shape: String,
    pub reshaped: String,
    #[serde(default)]
    pub allowzero: bool,
}

impl ReshapeNode {
    const OP: &'static str = "Reshape";

    pub fn new(data: impl Into<String>, shape: impl Into<String>, reshaped: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            shape: shape.into(),
            reshaped: reshaped.into(),
            allowzero: false,
        }
    }

    fn target(&self, input: &Shape, requested: &[i64]) -> Result<Shape, NodeError> {
        let op = Self::OP;
        let mut dims = requested.to_vec();
        if !self.allowzero {
            for (i, d) in dims.iter_mut().enumerate().filter(|(_, d)| **d == 0) {
                let copied = input
                    .dim(i)
                    .ok_or_else(|| invalid(op, format!("0 at position {i} has no input dimension to copy")))?;
                *d = copied as i64;
            }
        } else if dims.contains(&0) && dims.contains(&-1) {
            return Err(invalid(op, "allowzero forbids combining 0 and -1"));
        }

        let total = input.num_elements();
        let shape = Shape::resolve(&dims, total).map_err(NodeError::tensor(op))?;
        if shape.checked_num_elements() != Some(total) {
            return Err(NodeError::Tensor {
                op,
                source: TensorError::ReshapeMismatch {
                    from: input.clone(),
                    to: shape,
                },
            });
        }
        Ok(shape)
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        let data = table.input(op, &self.data)?;
        let requested = table.input(op, &self.shape)?;
        let requested = requested
            .downcast::<i64>()
            .ok_or_else(|| unsupported(op, &self.shape, requested.dtype()))?;
        if requested.rank() > 1 {
            return Err(invalid(op, format!("shape input must be 1-D, got {}", requested.shape())));
        }
        let shape = self.target(data.shape(), requested.as_slice())?;

        dispatch_numeric!(&data, |t| bind_reshaped(table, op, &self.reshaped, t, &shape))
    }
}

/// Permutes axes; without `perm` the axes are reversed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransposeNode {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub perm: Option<Vec<usize>>,
}

impl TransposeNode {
    const OP: &'static str = "Transpose";

    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            perm: None,
        }
    }

    pub fn with_perm(mut self, perm: Vec<usize>) -> Self {
        self.perm = Some(perm);
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        let x = table.input(op, &self.x)?;
        let perm = ops::resolve_permutation(x.shape().rank(), self.perm.as_deref()).map_err(NodeError::tensor(op))?;
        let shape = ops::transposed_shape(x.shape(), &perm);

        dispatch_numeric!(&x, |t| {
            let y = table.output(op, &self.y, &shape)?;
            ops::transpose(t, &perm, y).map_err(NodeError::tensor(op))
        })
    }
}

fn one() -> i64 {
    1
}

/// Flattens to `[prod(d[..axis]), prod(d[axis..])]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlattenNode {
    pub x: String,
    pub y: String,
    #[serde(default = "one")]
    pub axis: i64,
}

impl FlattenNode {
    const OP: &'static str = "Flatten";

    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            axis: 1,
        }
    }

    pub fn with_axis(mut self, axis: i64) -> Self {
        self.axis = axis;
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        let x = table.input(op, &self.x)?;
        let dims = x.shape().dims();
        let rank = dims.len() as i64;
        // axis == rank is allowed and yields [total, 1].
        let axis = if self.axis < 0 { self.axis + rank } else { self.axis };
        if !(0..=rank).contains(&axis) {
            return Err(NodeError::Tensor {
                op,
                source: TensorError::InvalidAxis {
                    op: "flatten",
                    axis: self.axis,
                    rank: dims.len(),
                },
            });
        }
        let (outer, inner) = dims.split_at(axis as usize);
        let shape = Shape::matrix(outer.iter().product(), inner.iter().product());

        dispatch_numeric!(&x, |t| bind_reshaped(table, op, &self.y, t, &shape))
    }
}
