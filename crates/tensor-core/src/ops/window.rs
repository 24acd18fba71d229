// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sliding-window enumeration for pooling.
//!
//! Inputs are laid out `[N, C, d_0, .., d_{s-1}]`; windows slide over the
//! `s` spatial axes independently for every `(n, c)` plane. Positions
//! that fall into padding are left out of the window entirely, so a
//! reducer only ever sees real input values together with their flat
//! row-major index into the whole input tensor.

use crate::{Element, Shape, Tensor, TensorError};

/// ONNX `auto_pad` modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoPad {
    /// Use the explicit `pads`.
    #[default]
    NotSet,
    /// Pad so that `out = ceil(in / stride)`, extra unit at the end.
    SameUpper,
    /// As `SameUpper`, extra unit at the beginning.
    SameLower,
    /// No padding.
    Valid,
}

/// Pooling attributes as they appear on a node.
///
/// Empty `strides`/`dilations` default to ones and empty `pads` to zeros.
/// `pads` uses the ONNX layout `[b_0, .., b_{s-1}, e_0, .., e_{s-1}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub kernel_shape: Vec<usize>,
    pub strides: Vec<usize>,
    pub dilations: Vec<usize>,
    pub pads: Vec<usize>,
    pub auto_pad: AutoPad,
    pub ceil_mode: bool,
}

impl PoolConfig {
    pub fn new(kernel_shape: Vec<usize>) -> Self {
        Self {
            kernel_shape,
            ..Self::default()
        }
    }
}

/// Fully resolved window over the spatial axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub kernel: Vec<usize>,
    pub strides: Vec<usize>,
    pub dilations: Vec<usize>,
    /// `(begin, end)` padding per spatial axis.
    pub pads: Vec<(usize, usize)>,
}

impl WindowSpec {
    /// Number of taps in one window, padding included.
    pub fn kernel_volume(&self) -> usize {
        self.kernel.iter().product()
    }
}

/// A [`WindowSpec`] together with the output shape it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolGeometry {
    pub window: WindowSpec,
    pub output_shape: Shape,
}

fn invalid(detail: String) -> TensorError {
    TensorError::InvalidArgument { op: "pool", detail }
}

fn per_axis(name: &str, values: &[usize], spatial: usize, default: usize) -> Result<Vec<usize>, TensorError> {
    if values.is_empty() {
        return Ok(vec![default; spatial]);
    }
    if values.len() != spatial {
        return Err(invalid(format!("{name} has {} entries, expected {spatial}", values.len())));
    }
    Ok(values.to_vec())
}

impl PoolGeometry {
    /// Resolves `config` against `input_shape` (`[N, C, spatial..]`).
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidArgument`] for a rank below 3,
    /// attribute lengths that disagree with the spatial rank, zero
    /// kernel/stride/dilation entries, or a window that does not fit.
    pub fn resolve(input_shape: &Shape, config: &PoolConfig) -> Result<Self, TensorError> {
        let dims = input_shape.dims();
        if dims.len() < 3 {
            return Err(invalid(format!("input {input_shape} needs at least one spatial axis")));
        }
        let spatial = dims.len() - 2;

        let kernel = per_axis("kernel_shape", &config.kernel_shape, spatial, 0)?;
        let strides = per_axis("strides", &config.strides, spatial, 1)?;
        let dilations = per_axis("dilations", &config.dilations, spatial, 1)?;
        if kernel.iter().chain(&strides).chain(&dilations).any(|&v| v == 0) {
            return Err(invalid(format!(
                "kernel {kernel:?}, strides {strides:?} and dilations {dilations:?} must be non-zero"
            )));
        }
        let flat_pads = per_axis("pads", &config.pads, 2 * spatial, 0)?;

        let mut pads = Vec::with_capacity(spatial);
        let mut out_dims = dims[..2].to_vec();
        for axis in 0..spatial {
            let input = dims[2 + axis];
            let (k, s, d) = (kernel[axis], strides[axis], dilations[axis]);
            let ekernel = (k - 1) * d + 1;

            let (begin, end, out) = match config.auto_pad {
                AutoPad::NotSet => {
                    let (begin, end) = (flat_pads[axis], flat_pads[axis + spatial]);
                    let span = input + begin + end;
                    if span < ekernel {
                        return Err(invalid(format!("window {ekernel} exceeds padded extent {span} on axis {axis}")));
                    }
                    let mut out = if config.ceil_mode {
                        (span - ekernel).div_ceil(s) + 1
                    } else {
                        (span - ekernel) / s + 1
                    };
                    // The last window must start inside the input or left padding.
                    if config.ceil_mode && (out - 1) * s >= input + begin {
                        out -= 1;
                    }
                    (begin, end, out)
                }
                AutoPad::Valid => {
                    if input < ekernel {
                        return Err(invalid(format!("window {ekernel} exceeds extent {input} on axis {axis}")));
                    }
                    (0, 0, (input - ekernel) / s + 1)
                }
                AutoPad::SameUpper | AutoPad::SameLower => {
                    let out = input.div_ceil(s);
                    let total = ((out.max(1) - 1) * s + ekernel).saturating_sub(input);
                    let begin = if config.auto_pad == AutoPad::SameLower {
                        (total + 1) / 2
                    } else {
                        total / 2
                    };
                    (begin, total - begin, out)
                }
            };
            pads.push((begin, end));
            out_dims.push(out);
        }

        Ok(Self {
            window: WindowSpec {
                kernel,
                strides,
                dilations,
                pads,
            },
            output_shape: Shape::new(out_dims),
        })
    }
}

/// Drives `reducer` over every window of `input`.
///
/// For each output cell the reducer receives the in-bounds window values
/// and their flat indices into `input`, and returns the output value plus
/// optionally the flat index of the chosen element. When `indices` is
/// given it receives that index (or `-1` if the reducer returned none).
///
/// # Errors
/// Returns a shape error if `output` (or `indices`) does not have the
/// shape produced by [`PoolGeometry::resolve`], or whatever the reducer
/// returns.
pub fn sliding_window<T, R>(
    input: &Tensor<T>,
    window: &WindowSpec,
    output: &mut Tensor<T>,
    mut indices: Option<&mut Tensor<i64>>,
    mut reducer: R,
) -> Result<(), TensorError>
where
    T: Element,
    R: FnMut(&[T], &[usize]) -> Result<(T, Option<usize>), TensorError>,
{
    let in_dims = input.dims();
    let out_dims = output.dims().to_vec();
    let spatial = window.kernel.len();
    if in_dims.len() != spatial + 2 || out_dims.len() != spatial + 2 || in_dims[..2] != out_dims[..2] {
        return Err(TensorError::ShapeMismatch {
            op: "pool (output)",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    if let Some(idx) = indices.as_deref() {
        if idx.dims() != out_dims.as_slice() {
            return Err(TensorError::ShapeMismatch {
                op: "pool (indices)",
                lhs: output.shape().clone(),
                rhs: idx.shape().clone(),
            });
        }
    }

    let in_spatial = &in_dims[2..];
    let out_spatial = &out_dims[2..];
    let in_plane: usize = in_spatial.iter().product();
    let out_plane: usize = out_spatial.iter().product();
    let planes = in_dims[0] * in_dims[1];
    let in_strides = Shape::new(in_spatial.to_vec()).strides();

    let src = input.as_slice();
    let mut values = Vec::with_capacity(window.kernel_volume());
    let mut sources = Vec::with_capacity(window.kernel_volume());
    let mut out_pos = vec![0usize; spatial];
    let mut tap = vec![0usize; spatial];

    for plane in 0..planes {
        let in_base = plane * in_plane;
        for cell in 0..out_plane {
            unravel_into(cell, out_spatial, &mut out_pos);
            values.clear();
            sources.clear();

            tap.iter_mut().for_each(|t| *t = 0);
            'taps: loop {
                let mut offset = in_base;
                let mut inside = true;
                for axis in 0..spatial {
                    let pos = (out_pos[axis] * window.strides[axis] + tap[axis] * window.dilations[axis]) as isize
                        - window.pads[axis].0 as isize;
                    if pos < 0 || pos as usize >= in_spatial[axis] {
                        inside = false;
                        break;
                    }
                    offset += pos as usize * in_strides[axis];
                }
                if inside {
                    values.push(src[offset]);
                    sources.push(offset);
                }

                for axis in (0..spatial).rev() {
                    tap[axis] += 1;
                    if tap[axis] < window.kernel[axis] {
                        continue 'taps;
                    }
                    tap[axis] = 0;
                }
                break;
            }

            let (value, chosen) = reducer(&values, &sources)?;
            let flat = plane * out_plane + cell;
            output.as_mut_slice()[flat] = value;
            if let Some(idx) = indices.as_deref_mut() {
                idx.as_mut_slice()[flat] = chosen.map_or(-1, |i| i as i64);
            }
        }
    }
    Ok(())
}

fn unravel_into(mut flat: usize, dims: &[usize], out: &mut [usize]) {
    for (slot, &d) in out.iter_mut().zip(dims).rev() {
        *slot = flat % d;
        flat /= d;
    }
}

/// Reducer returning the first maximum and its source index.
pub fn max_reducer<T: Element>(values: &[T], sources: &[usize]) -> Result<(T, Option<usize>), TensorError> {
    let mut best: Option<(T, usize)> = None;
    for (&v, &src) in values.iter().zip(sources) {
        match best {
            Some((b, _)) if v > b => best = Some((v, src)),
            None => best = Some((v, src)),
            _ => {}
        }
    }
    best.map(|(v, src)| (v, Some(src)))
        .ok_or(TensorError::EmptyTensor { op: "max_pool" })
}

/// Builds an averaging reducer.
///
/// With `count_include_pad` the divisor is the full kernel volume;
/// otherwise it is the number of in-bounds taps.
pub fn average_reducer<T: Element>(
    kernel_volume: usize,
    count_include_pad: bool,
) -> impl FnMut(&[T], &[usize]) -> Result<(T, Option<usize>), TensorError> {
    move |values, _| {
        if values.is_empty() {
            return Err(TensorError::EmptyTensor { op: "average_pool" });
        }
        let sum = values.iter().fold(T::ZERO, |acc, &v| acc + v);
        let count = if count_include_pad { kernel_volume } else { values.len() };
        Ok((T::from_f64(sum.to_f64() / count as f64), None))
    }
}

/// Converts a row-major flat index into the input to one whose spatial
/// axes are enumerated column-major (`storage_order = 1`).
pub fn column_major_spatial_index(flat: usize, dims: &[usize]) -> usize {
    if dims.len() < 3 {
        return flat;
    }
    let plane: usize = dims[2..].iter().product();
    if plane == 0 {
        return flat;
    }
    let (base, mut rem) = (flat - flat % plane, flat % plane);
    let mut coords = vec![0usize; dims.len() - 2];
    unravel_into(rem, &dims[2..], &mut coords);
    rem = 0;
    for (axis, &c) in coords.iter().enumerate().rev() {
        rem = rem * dims[2 + axis] + c;
    }
    base + rem
}
