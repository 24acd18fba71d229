// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution over NCHW via im2col + GEMM.
//!
//! Follows ONNX: the kernel is applied as a cross-correlation (no flip).

use super::{invalid, unsupported, ForwardOptions};
use crate::{NodeError, SymbolTable};
use tensor_core::ops::{im2col, Conv2dGeometry};
use tensor_core::{dispatch_float, gemm, Float, MatrixRef, Shape, Tensor};

/// `y = conv(x, w) + b` with `x: [N, C, H, W]`, `w: [M, C, kh, kw]`, `b: [M]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConvNode {
    pub x: String,
    pub w: String,
    #[serde(default)]
    pub b: Option<String>,
    pub y: String,
    /// Inferred from `w` when empty.
    #[serde(default)]
    pub kernel_shape: Vec<usize>,
    #[serde(default)]
    pub strides: Vec<usize>,
    #[serde(default)]
    pub dilations: Vec<usize>,
    /// `[top, left, bottom, right]`.
    #[serde(default)]
    pub pads: Vec<usize>,
    #[serde(default = "default_group")]
    pub group: usize,
}

fn default_group() -> usize {
    1
}

fn pair(op: &'static str, name: &str, values: &[usize], default: usize) -> Result<[usize; 2], NodeError> {
    match values {
        [] => Ok([default; 2]),
        &[a, b] => Ok([a, b]),
        _ => Err(invalid(op, format!("{name} must have 2 entries, got {values:?}"))),
    }
}

impl ConvNode {
    const OP: &'static str = "Conv";

    pub fn new(x: impl Into<String>, w: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            w: w.into(),
            b: None,
            y: y.into(),
            kernel_shape: Vec::new(),
            strides: Vec::new(),
            dilations: Vec::new(),
            pads: Vec::new(),
            group: 1,
        }
    }

    pub fn with_bias(mut self, b: impl Into<String>) -> Self {
        self.b = Some(b.into());
        self
    }

    pub fn with_strides(mut self, strides: Vec<usize>) -> Self {
        self.strides = strides;
        self
    }

    pub fn with_pads(mut self, pads: Vec<usize>) -> Self {
        self.pads = pads;
        self
    }

    pub fn with_dilations(mut self, dilations: Vec<usize>) -> Self {
        self.dilations = dilations;
        self
    }

    /// Resolves attributes against the input and weight shapes.
    fn geometry(&self, x: &Shape, w: &Shape) -> Result<(usize, usize, Conv2dGeometry), NodeError> {
        let op = Self::OP;
        if self.group != 1 {
            return Err(invalid(op, format!("group = {} is not supported", self.group)));
        }
        let (&[n, c, h, width], &[m, wc, kh, kw]) = (x.dims(), w.dims()) else {
            return Err(invalid(op, format!("expected 4-D input and weight, got {x} and {w}")));
        };
        if wc != c {
            return Err(invalid(op, format!("weight has {wc} input channels, input has {c}")));
        }
        if !self.kernel_shape.is_empty() && self.kernel_shape != [kh, kw] {
            return Err(invalid(
                op,
                format!("kernel_shape {:?} disagrees with weight {w}", self.kernel_shape),
            ));
        }
        let pads = match self.pads.as_slice() {
            [] => [0; 4],
            &[t, l, b, r] => [t, l, b, r],
            other => return Err(invalid(op, format!("pads must have 4 entries, got {other:?}"))),
        };
        let geometry = Conv2dGeometry {
            channels: c,
            height: h,
            width,
            kernel: [kh, kw],
            strides: pair(op, "strides", &self.strides, 1)?,
            dilations: pair(op, "dilations", &self.dilations, 1)?,
            pads,
        };
        Ok((n, m, geometry))
    }

    pub(crate) fn forward(&self, table: &mut SymbolTable, options: &ForwardOptions) -> Result<(), NodeError> {
        let op = Self::OP;
        let x = table.input(op, &self.x)?;
        let w = table.input(op, &self.w)?;
        let b = self.b.as_deref().map(|key| table.input(op, key).map(|v| (key, v))).transpose()?;

        let (batch, maps, geometry) = self.geometry(x.shape(), w.shape())?;
        let (out_h, out_w) = geometry.output_hw().map_err(NodeError::tensor(op))?;
        if let Some((key, bias)) = &b {
            if bias.shape().dims() != [maps] {
                return Err(invalid(op, format!("bias '{key}' must be [{maps}], got {}", bias.shape())));
            }
        }
        let out_shape = Shape::new(vec![batch, maps, out_h, out_w]);

        dispatch_float!(
            &x,
            |input| {
                let weight = w.downcast_arc().ok_or_else(|| unsupported(op, &self.w, w.dtype()))?;
                let bias = match &b {
                    Some((key, value)) => Some(value.downcast_arc().ok_or_else(|| unsupported(op, key, value.dtype()))?),
                    None => None,
                };
                let y = table.output(op, &self.y, &out_shape)?;
                convolve(input, &weight, bias.as_deref(), &geometry, maps, options, y).map_err(NodeError::tensor(op))
            },
            |dtype| Err(unsupported(op, &self.x, dtype))
        )
    }
}

fn convolve<T: Float>(
    input: &Tensor<T>,
    weight: &Tensor<T>,
    bias: Option<&Tensor<T>>,
    geometry: &Conv2dGeometry,
    maps: usize,
    options: &ForwardOptions,
    output: &mut Tensor<T>,
) -> Result<(), tensor_core::TensorError> {
    let patch = geometry.patch_len();
    let (out_h, out_w) = geometry.output_hw()?;
    let spatial = out_h * out_w;
    let image_len = geometry.channels * geometry.height * geometry.width;
    let mut columns = vec![T::ZERO; patch * spatial];

    let kernels = MatrixRef::new(weight.as_slice(), maps, patch)?;
    let out = output.as_mut_slice();
    for (image, y) in input.as_slice().chunks(image_len.max(1)).zip(out.chunks_mut((maps * spatial).max(1))) {
        im2col(image, geometry, &mut columns)?;
        let cols = MatrixRef::new(&columns, patch, spatial)?;
        gemm(options.gemm, T::ONE, kernels, cols, T::ZERO, y, spatial)?;
        if let Some(bias) = bias {
            for (plane, &bv) in y.chunks_mut(spatial.max(1)).zip(bias.as_slice()) {
                plane.iter_mut().for_each(|v| *v += bv);
            }
        }
    }
    Ok(())
}
