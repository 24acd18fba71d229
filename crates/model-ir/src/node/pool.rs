// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! MaxPool and AveragePool over `[N, C, spatial..]`.

use super::{invalid, unsupported};
use crate::{NodeError, SymbolTable};
use tensor_core::ops::{self, PoolConfig, PoolGeometry};
use tensor_core::{dispatch_float, dispatch_numeric, DType, Tensor};

/// Max pooling with an optional int64 `indices` output.
///
/// Indices are flat offsets into `x`; with `storage_order = 1` the
/// spatial part is enumerated column-major.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MaxPoolNode {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub indices: Option<String>,
    #[serde(flatten)]
    pub config: PoolConfig,
    #[serde(default)]
    pub storage_order: u8,
}

impl MaxPoolNode {
    const OP: &'static str = "MaxPool";

    pub fn new(x: impl Into<String>, y: impl Into<String>, kernel_shape: Vec<usize>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            indices: None,
            config: PoolConfig::new(kernel_shape),
            storage_order: 0,
        }
    }

    pub fn with_indices(mut self, indices: impl Into<String>) -> Self {
        self.indices = Some(indices.into());
        self
    }

    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        if self.storage_order > 1 {
            return Err(invalid(op, format!("storage_order must be 0 or 1, got {}", self.storage_order)));
        }
        let x = table.input(op, &self.x)?;
        let geometry = PoolGeometry::resolve(x.shape(), &self.config).map_err(NodeError::tensor(op))?;
        let in_dims = x.shape().dims().to_vec();
        table.check_output(op, &self.y, x.dtype())?;
        if let Some(key) = &self.indices {
            table.check_output(op, key, DType::I64)?;
        }

        // Indices are computed into a scratch tensor so the table is only
        // borrowed for one output at a time.
        let mut indices = match &self.indices {
            Some(_) => Some(Tensor::<i64>::zeros(geometry.output_shape.clone()).map_err(NodeError::tensor(op))?),
            None => None,
        };

        dispatch_numeric!(&x, |t| {
            let y = table.output(op, &self.y, &geometry.output_shape)?;
            ops::sliding_window(t, &geometry.window, y, indices.as_mut(), ops::max_reducer)
                .map_err(NodeError::tensor(op))?;
        });

        if let (Some(key), Some(computed)) = (&self.indices, indices) {
            let out = table.output::<i64>(op, key, &geometry.output_shape)?;
            for (dst, &src) in out.as_mut_slice().iter_mut().zip(computed.as_slice()) {
                *dst = if self.storage_order == 1 && src >= 0 {
                    ops::column_major_spatial_index(src as usize, &in_dims) as i64
                } else {
                    src
                };
            }
        }
        Ok(())
    }
}

/// Average pooling; padded positions count only with `count_include_pad`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AvgPoolNode {
    pub x: String,
    pub y: String,
    #[serde(flatten)]
    pub config: PoolConfig,
    #[serde(default)]
    pub count_include_pad: bool,
}

impl AvgPoolNode {
    const OP: &'static str = "AveragePool";

    pub fn new(x: impl Into<String>, y: impl Into<String>, kernel_shape: Vec<usize>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            config: PoolConfig::new(kernel_shape),
            count_include_pad: false,
        }
    }

    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable) -> Result<(), NodeError> {
        let op = Self::OP;
        let x = table.input(op, &self.x)?;
        let geometry = PoolGeometry::resolve(x.shape(), &self.config).map_err(NodeError::tensor(op))?;
        let volume = geometry.window.kernel_volume();

        dispatch_float!(
            &x,
            |t| {
                let y = table.output(op, &self.y, &geometry.output_shape)?;
                let reducer = ops::average_reducer(volume, self.count_include_pad);
                ops::sliding_window(t, &geometry.window, y, None, reducer).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )
    }
}
