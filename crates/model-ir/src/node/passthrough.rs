// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dropout (inference identity) and Constant.

use super::{invalid, unsupported};
use crate::{NodeError, SymbolTable};
use tensor_core::{dispatch_float, dispatch_numeric, DType, Element, Tensor, TensorValue};

/// Identity at inference time.
///
/// `ratio` and `training_mode` are optional scalar inputs; a non-zero
/// `training_mode` is rejected. The optional `mask` output is a `u32`
/// tensor of ones.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DropoutNode {
    pub x: String,
    #[serde(default)]
    pub ratio: Option<String>,
    #[serde(default)]
    pub training_mode: Option<String>,
    pub y: String,
    #[serde(default)]
    pub mask: Option<String>,
}

impl DropoutNode {
    const OP: &'static str = "Dropout";

    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            ratio: None,
            training_mode: None,
            y: y.into(),
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn with_training_mode(mut self, training_mode: impl Into<String>) -> Self {
        self.training_mode = Some(training_mode.into());
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        let x = table.input(op, &self.x)?;
        if let Some(key) = &self.ratio {
            table.input(op, key)?;
        }
        if let Some(key) = &self.training_mode {
            let flag = table.input(op, key)?;
            if dispatch_numeric!(&flag, |t| any_nonzero(t)) {
                return Err(invalid(op, "training_mode is not supported at inference"));
            }
        }
        let shape = x.shape().clone();
        table.check_output(op, &self.y, x.dtype())?;
        if let Some(key) = &self.mask {
            table.check_output(op, key, DType::U32)?;
        }

        dispatch_float!(
            &x,
            |t| {
                let y = table.output(op, &self.y, &shape)?;
                y.as_mut_slice().copy_from_slice(t.as_slice());
                Ok::<(), NodeError>(())
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )?;

        if let Some(key) = &self.mask {
            table.output::<u32>(op, key, &shape)?.fill(1);
        }
        Ok(())
    }
}

/// Writes a stored tensor to `y`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConstantNode {
    pub y: String,
    pub value: TensorValue,
}

impl ConstantNode {
    const OP: &'static str = "Constant";

    pub fn new(y: impl Into<String>, value: impl Into<TensorValue>) -> Self {
        Self {
            y: y.into(),
            value: value.into(),
        }
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        dispatch_numeric!(&self.value, |t| copy_into(table, op, &self.y, t))
    }
}

fn any_nonzero<T: Element>(t: &Tensor<T>) -> bool {
    t.as_slice().iter().any(|&v| v != T::ZERO)
}

fn copy_into<T: Element>(table: &mut SymbolTable, op: &'static str, key: &str, src: &Tensor<T>) -> Result<(), NodeError> {
    let out = table.output::<T>(op, key, src.shape())?;
    out.as_mut_slice().copy_from_slice(src.as_slice());
    Ok(())
}
