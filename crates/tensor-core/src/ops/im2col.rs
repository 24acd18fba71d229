// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Patch unrolling for 2-D convolution.
//!
//! [`im2col`] lays one image `[C, H, W]` out as a `[C*kh*kw, OH*OW]`
//! matrix so that a convolution with weights viewed as `[M, C*kh*kw]`
//! becomes a single GEMM producing `[M, OH*OW]`. Padded positions are
//! zeros.

use crate::{Element, TensorError};

/// Geometry of a 2-D convolution over a single image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub kernel: [usize; 2],
    pub strides: [usize; 2],
    pub dilations: [usize; 2],
    /// `[top, left, bottom, right]`.
    pub pads: [usize; 4],
}

impl Conv2dGeometry {
    fn effective_kernel(&self, axis: usize) -> usize {
        (self.kernel[axis] - 1) * self.dilations[axis] + 1
    }

    /// Validates parameters and returns `(out_h, out_w)`.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidArgument`] for zero kernel, stride or
    /// dilation, or when the dilated kernel does not fit the padded input.
    pub fn output_hw(&self) -> Result<(usize, usize), TensorError> {
        if self.kernel.contains(&0) || self.strides.contains(&0) || self.dilations.contains(&0) {
            return Err(TensorError::InvalidArgument {
                op: "conv",
                detail: format!(
                    "kernel {:?}, strides {:?} and dilations {:?} must be non-zero",
                    self.kernel, self.strides, self.dilations
                ),
            });
        }
        let padded = [
            self.height + self.pads[0] + self.pads[2],
            self.width + self.pads[1] + self.pads[3],
        ];
        let mut out = [0usize; 2];
        for axis in 0..2 {
            let ek = self.effective_kernel(axis);
            if padded[axis] < ek {
                return Err(TensorError::InvalidArgument {
                    op: "conv",
                    detail: format!("effective kernel {ek} exceeds padded extent {}", padded[axis]),
                });
            }
            out[axis] = (padded[axis] - ek) / self.strides[axis] + 1;
        }
        Ok((out[0], out[1]))
    }

    /// Rows of the unrolled matrix: `C * kh * kw`.
    pub fn patch_len(&self) -> usize {
        self.channels * self.kernel[0] * self.kernel[1]
    }
}

/// Unrolls one `[C, H, W]` image into `columns` (`[C*kh*kw, OH*OW]`,
/// row-major).
///
/// # Errors
/// Returns a size error if `image` or `columns` do not match the geometry.
pub fn im2col<T: Element>(image: &[T], geometry: &Conv2dGeometry, columns: &mut [T]) -> Result<(), TensorError> {
    let (out_h, out_w) = geometry.output_hw()?;
    let (c, h, w) = (geometry.channels, geometry.height, geometry.width);
    if image.len() != c * h * w {
        return Err(TensorError::BufferSizeMismatch {
            expected: c * h * w,
            actual: image.len(),
        });
    }
    let spatial = out_h * out_w;
    if columns.len() != geometry.patch_len() * spatial {
        return Err(TensorError::BufferSizeMismatch {
            expected: geometry.patch_len() * spatial,
            actual: columns.len(),
        });
    }

    let [kh, kw] = geometry.kernel;
    let [sh, sw] = geometry.strides;
    let [dh, dw] = geometry.dilations;
    let (pad_top, pad_left) = (geometry.pads[0], geometry.pads[1]);

    for (row, dst) in columns.chunks_mut(spatial.max(1)).enumerate().take(geometry.patch_len()) {
        let ch = row / (kh * kw);
        let ki = (row / kw) % kh;
        let kj = row % kw;
        let plane = &image[ch * h * w..(ch + 1) * h * w];
        for oy in 0..out_h {
            // Signed arithmetic only at the padding boundary.
            let iy = (oy * sh + ki * dh) as isize - pad_top as isize;
            for ox in 0..out_w {
                let ix = (ox * sw + kj * dw) as isize - pad_left as isize;
                dst[oy * out_w + ox] = if iy >= 0 && ix >= 0 && (iy as usize) < h && (ix as usize) < w {
                    plane[iy as usize * w + ix as usize]
                } else {
                    T::ZERO
                };
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(h: usize, w: usize, k: usize, pads: [usize; 4]) -> Conv2dGeometry {
        Conv2dGeometry {
            channels: 1,
            height: h,
            width: w,
            kernel: [k, k],
            strides: [1, 1],
            dilations: [1, 1],
            pads,
        }
    }

    #[test]
    fn test_im2col_3x3_kernel_2() {
        let image: Vec<f32> = (1..=9).map(|x| x as f32).collect();
        let g = geometry(3, 3, 2, [0; 4]);
        assert_eq!(g.output_hw().unwrap(), (2, 2));
        let mut cols = vec![0.0; 4 * 4];
        im2col(&image, &g, &mut cols).unwrap();
        #[rustfmt::skip]
        let expected = [
            1.0, 2.0, 4.0, 5.0,
            2.0, 3.0, 5.0, 6.0,
            4.0, 5.0, 7.0, 8.0,
            5.0, 6.0, 8.0, 9.0,
        ];
        assert_eq!(cols, expected);
    }

    #[test]
    fn test_im2col_padding_is_zero() {
        let image = vec![1.0f64; 4];
        let g = geometry(2, 2, 3, [1, 1, 1, 1]);
        assert_eq!(g.output_hw().unwrap(), (2, 2));
        let mut cols = vec![-1.0; 9 * 4];
        im2col(&image, &g, &mut cols).unwrap();
        // Kernel corner (0,0) only sees the image from output (1,1).
        assert_eq!(&cols[0..4], &[0.0, 0.0, 0.0, 1.0]);
        // Kernel centre sees every pixel.
        assert_eq!(&cols[16..20], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_strided_dilated_output_size() {
        let g = Conv2dGeometry {
            channels: 2,
            height: 7,
            width: 9,
            kernel: [3, 2],
            strides: [2, 3],
            dilations: [2, 1],
            pads: [0, 1, 0, 1],
        };
        // (7 - 5) / 2 + 1 = 2, (11 - 2) / 3 + 1 = 4
        assert_eq!(g.output_hw().unwrap(), (2, 4));
        assert_eq!(g.patch_len(), 12);
    }

    #[test]
    fn test_kernel_too_large() {
        let g = geometry(2, 2, 3, [0; 4]);
        assert!(g.output_hw().is_err());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let mut g = geometry(4, 4, 2, [0; 4]);
        g.strides = [0, 1];
        assert!(matches!(g.output_hw(), Err(TensorError::InvalidArgument { op: "conv", .. })));
    }
}
