// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax, LogSoftmax and LRN nodes.

use super::{invalid, unsupported};
use crate::{NodeError, SymbolTable};
use tensor_core::ops::{self, LrnParams};
use tensor_core::dispatch_float;

fn minus_one() -> i64 {
    -1
}

/// Softmax (or log-softmax) of `x` along `axis`; negative axes count
/// from the end.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SoftmaxNode {
    pub x: String,
    pub y: String,
    #[serde(default = "minus_one")]
    pub axis: i64,
}

impl SoftmaxNode {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            axis: -1,
        }
    }

    pub fn with_axis(mut self, axis: i64) -> Self {
        self.axis = axis;
        self
    }

    pub(crate) fn forward(&self, op: &'static str, table: &mut SymbolTable, log: bool) -> Result<(), NodeError> {
        let x = table.input(op, &self.x)?;
        let shape = x.shape().clone();
        shape.normalize_axis("softmax", self.axis).map_err(NodeError::tensor(op))?;

        dispatch_float!(
            &x,
            |t| {
                let y = table.output(op, &self.y, &shape)?;
                let result = if log {
                    ops::log_softmax(t, self.axis, y)
                } else {
                    ops::softmax(t, self.axis, y)
                };
                result.map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )
    }
}

fn default_alpha() -> f32 {
    1e-4
}

fn default_beta() -> f32 {
    0.75
}

fn default_bias() -> f32 {
    1.0
}

/// Local response normalization across the channel axis of `[N, C, ..]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LrnNode {
    pub x: String,
    pub y: String,
    pub size: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_beta")]
    pub beta: f32,
    #[serde(default = "default_bias")]
    pub bias: f32,
}

impl LrnNode {
    const OP: &'static str = "LRN";

    pub fn new(x: impl Into<String>, y: impl Into<String>, size: usize) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            size,
            alpha: default_alpha(),
            beta: default_beta(),
            bias: default_bias(),
        }
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        if self.size == 0 {
            return Err(invalid(op, "size must be positive"));
        }
        let x = table.input(op, &self.x)?;
        let shape = x.shape().clone();
        if shape.rank() < 2 {
            return Err(invalid(op, format!("input must be at least [N, C], got {shape}")));
        }
        let params = LrnParams {
            size: self.size,
            alpha: f64::from(self.alpha),
            beta: f64::from(self.beta),
            bias: f64::from(self.bias),
        };

        dispatch_float!(
            &x,
            |t| {
                let y = table.output(op, &self.y, &shape)?;
                ops::lrn(t, params, y).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::{Tensor, TensorValue};

    fn softmax_of(rows: usize, cols: usize, data: Vec<f64>, log: bool) -> Tensor<f64> {
        let mut table = SymbolTable::new();
        table.insert("x", Tensor::from_vec([rows, cols], data).unwrap());
        let op = if log { "LogSoftmax" } else { "Softmax" };
        SoftmaxNode::new("x", "y").forward(op, &mut table, log).unwrap();
        table.get("y").unwrap().downcast::<f64>().unwrap().clone()
    }

    #[test]
    fn test_log_softmax_rows_normalise() {
        #[rustfmt::skip]
        let rows = vec![
            0.0, 0.0, 0.0, 0.0,
            1e30, -1e30, 0.0, 1.0,
            -1e-30, 1e-30, f64::MAX / 2.0, f64::MIN / 2.0,
            700.0, 710.0, -700.0, 3.5,
        ];
        let y = softmax_of(4, 4, rows, true);
        for row in y.as_slice().chunks(4) {
            let total: f64 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-5, "{row:?}");
        }
    }

    #[test]
    fn test_softmax_uniform_row() {
        let y = softmax_of(1, 4, vec![3.0; 4], false);
        assert!(y.as_slice().iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_softmax_invalid_axis() {
        let mut table = SymbolTable::new();
        table.insert("x", Tensor::<f32>::zeros([2, 3]).unwrap());
        let err = SoftmaxNode::new("x", "y")
            .with_axis(2)
            .forward("Softmax", &mut table, false)
            .unwrap_err();
        assert!(matches!(err, NodeError::Tensor { op: "Softmax", .. }));
        assert!(!table.contains("y"));
    }

    #[test]
    fn test_softmax_rejects_integers() {
        let mut table = SymbolTable::new();
        table.insert("x", Tensor::from_vec([1, 2], vec![1i64, 2]).unwrap());
        let err = SoftmaxNode::new("x", "y").forward("Softmax", &mut table, false).unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedType { .. }));
    }

    #[test]
    fn test_lrn_single_channel_window() {
        // size 1: y = x / (1 + 1e-4 * x^2)^0.75
        let mut table = SymbolTable::new();
        table.insert("x", Tensor::from_vec([1, 2, 1, 1], vec![2.0f32, -3.0]).unwrap());
        LrnNode::new("x", "y", 1).forward(&mut table).unwrap();
        let y: TensorValue = table.input("test", "y").unwrap();
        let y = y.downcast::<f32>().unwrap();
        let expect = |v: f32| v / (1.0 + 1e-4 * v * v).powf(0.75);
        assert!((y[0] - expect(2.0)).abs() < 1e-6);
        assert!((y[1] - expect(-3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_lrn_zero_size() {
        let mut table = SymbolTable::new();
        table.insert("x", Tensor::<f32>::zeros([1, 1]).unwrap());
        assert!(LrnNode::new("x", "y", 0).forward(&mut table).is_err());
    }
}
