// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape-preserving element-wise activations.

use super::unsupported;
use crate::{NodeError, SymbolTable};
use tensor_core::ops::{self, GeluApproximation};
use tensor_core::{dispatch_float, Float, Tensor, TensorValue};

fn default_leaky_alpha() -> f32 {
    0.01
}

fn default_elu_alpha() -> f32 {
    1.0
}

/// Which activation an [`ActivationNode`] applies.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Activation {
    Relu,
    LeakyRelu {
        #[serde(default = "default_leaky_alpha")]
        alpha: f32,
    },
    Sigmoid,
    Tanh,
    Gelu {
        #[serde(default)]
        approximation: GeluApproximation,
    },
    Elu {
        #[serde(default = "default_elu_alpha")]
        alpha: f32,
    },
    Swish,
}

impl Activation {
    pub fn op_type(&self) -> &'static str {
        match self {
            Self::Relu => "Relu",
            Self::LeakyRelu { .. } => "LeakyRelu",
            Self::Sigmoid => "Sigmoid",
            Self::Tanh => "Tanh",
            Self::Gelu { .. } => "Gelu",
            Self::Elu { .. } => "Elu",
            Self::Swish => "Swish",
        }
    }

    fn apply<T: Float>(self, x: &Tensor<T>, y: &mut Tensor<T>) -> Result<(), tensor_core::TensorError> {
        match self {
            Self::Relu => ops::elementwise(x, ops::relu, y),
            Self::LeakyRelu { alpha } => {
                let alpha = T::from_f64(f64::from(alpha));
                ops::elementwise(x, |v| ops::leaky_relu(v, alpha), y)
            }
            Self::Sigmoid => ops::elementwise(x, ops::sigmoid, y),
            Self::Tanh => ops::elementwise(x, ops::tanh, y),
            Self::Gelu { approximation } => ops::elementwise(x, |v| ops::gelu(v, approximation), y),
            Self::Elu { alpha } => {
                let alpha = T::from_f64(f64::from(alpha));
                ops::elementwise(x, |v| ops::elu(v, alpha), y)
            }
            Self::Swish => ops::elementwise(x, ops::swish, y),
        }
    }
}

/// `y = f(x)` for one [`Activation`].
///
/// ReLU accepts every element type; the rest are float-only.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActivationNode {
    pub kind: Activation,
    pub x: String,
    pub y: String,
}

impl ActivationNode {
    pub fn new(kind: Activation, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            kind,
            x: x.into(),
            y: y.into(),
        }
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = self.kind.op_type();
        let x = table.input(op, &self.x)?;
        let shape = x.shape().clone();

        if self.kind == Activation::Relu {
            return relu_any(&x, table, op, &self.y);
        }
        dispatch_float!(
            &x,
            |t| {
                let y = table.output(op, &self.y, &shape)?;
                self.kind.apply(t, y).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )
    }
}

fn relu_any(x: &TensorValue, table: &mut SymbolTable, op: &'static str, key: &str) -> Result<(), NodeError> {
    tensor_core::dispatch_numeric!(x, |t| {
        let y = table.output(op, key, t.shape())?;
        ops::elementwise(t, ops::relu, y).map_err(NodeError::tensor(op))
    })
}
