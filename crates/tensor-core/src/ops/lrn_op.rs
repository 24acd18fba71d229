// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Local response normalization across channels.

use crate::{Float, Tensor, TensorError};

/// Parameters of [`lrn`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrnParams {
    /// Number of channels in the window.
    pub size: usize,
    pub alpha: f64,
    pub beta: f64,
    pub bias: f64,
}

impl Default for LrnParams {
    fn default() -> Self {
        Self {
            size: 1,
            alpha: 1e-4,
            beta: 0.75,
            bias: 1.0,
        }
    }
}

/// Normalises each element by the squares of its channel neighbours:
///
/// `y = x / (bias + alpha / size * square_sum)^beta`
///
/// For channel `c` the window spans
/// `[c - (size-1)/2, c + (size-1)/2 + (size-1)%2]`, clipped to the valid
/// channel range. `input` is `[N, C, ...]` with any number of trailing
/// spatial dimensions.
///
/// # Errors
/// Returns an error for rank < 2, `size == 0`, or mismatched shapes.
pub fn lrn<T: Float>(input: &Tensor<T>, params: LrnParams, output: &mut Tensor<T>) -> Result<(), TensorError> {
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "lrn",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    if input.rank() < 2 {
        return Err(TensorError::InvalidArgument {
            op: "lrn",
            detail: format!("expected at least [N, C], got {}", input.shape()),
        });
    }
    if params.size == 0 {
        return Err(TensorError::InvalidArgument {
            op: "lrn",
            detail: "size must be positive".into(),
        });
    }

    let dims = input.dims();
    let (batch, channels) = (dims[0], dims[1]);
    let spatial: usize = dims[2..].iter().product();
    let half_low = (params.size - 1) / 2;
    let half_high = half_low + (params.size - 1) % 2;

    let bias = T::from_f64(params.bias);
    let scale = T::from_f64(params.alpha / params.size as f64);
    let beta = T::from_f64(params.beta);

    let src = input.as_slice();
    let dst = output.as_mut_slice();

    for n in 0..batch {
        let base = n * channels * spatial;
        for c in 0..channels {
            let start = c.saturating_sub(half_low);
            let end = (c + half_high).min(channels - 1);
            for s in 0..spatial {
                let mut square_sum = T::ZERO;
                for k in start..=end {
                    let v = src[base + k * spatial + s];
                    square_sum += v * v;
                }
                let idx = base + c * spatial + s;
                dst[idx] = src[idx] / (bias + scale * square_sum).powf(beta);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lrn_matches_formula() {
        // [1, 3, 1, 1], size 3: each window covers all neighbours present.
        let input = Tensor::from_vec([1, 3, 1, 1], vec![1.0f32, 2.0, 3.0]).unwrap();
        let mut output = Tensor::zeros([1, 3, 1, 1]).unwrap();
        let params = LrnParams {
            size: 3,
            alpha: 1.0,
            beta: 1.0,
            bias: 1.0,
        };
        lrn(&input, params, &mut output).unwrap();

        let expect = |x: f32, sq: f32| x / (1.0 + sq / 3.0);
        let r = output.as_slice();
        assert!((r[0] - expect(1.0, 1.0 + 4.0)).abs() < 1e-6);
        assert!((r[1] - expect(2.0, 1.0 + 4.0 + 9.0)).abs() < 1e-6);
        assert!((r[2] - expect(3.0, 4.0 + 9.0)).abs() < 1e-6);
    }

    #[test]
    fn test_lrn_even_size_window_leans_forward() {
        // size 2: window for c is [c, c+1].
        let input = Tensor::from_vec([1, 2, 1], vec![1.0f64, 2.0]).unwrap();
        let mut output = Tensor::zeros([1, 2, 1]).unwrap();
        let params = LrnParams {
            size: 2,
            alpha: 2.0,
            beta: 1.0,
            bias: 0.0,
        };
        lrn(&input, params, &mut output).unwrap();
        let r = output.as_slice();
        assert!((r[0] - 1.0 / 5.0).abs() < 1e-12);
        assert!((r[1] - 2.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_lrn_default_is_near_identity_for_small_values() {
        let input = Tensor::from_vec([1, 2], vec![0.1f32, 0.2]).unwrap();
        let mut output = Tensor::zeros([1, 2]).unwrap();
        lrn(&input, LrnParams::default(), &mut output).unwrap();
        assert!((output[0] - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_lrn_rank_too_low() {
        let input = Tensor::<f32>::zeros([3]).unwrap();
        let mut output = Tensor::zeros([3]).unwrap();
        assert!(lrn(&input, LrnParams::default(), &mut output).is_err());
    }
}
