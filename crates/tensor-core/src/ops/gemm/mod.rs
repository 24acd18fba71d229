// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! General matrix multiply: `C = alpha * op(A) @ op(B) + beta * C`.
//!
//! Every algorithm computes the same product; they differ only in loop
//! order and blocking. Transposition never copies: a [`MatrixRef`]
//! marked transposed swaps the roles of its row and column strides when
//! read.
//!
//! | algorithm      | loop order                         |
//! |----------------|------------------------------------|
//! | `InnerProduct` | i, j, then dot product over k      |
//! | `OuterProduct` | k, then rank-1 update over i, j    |
//! | `RowWise`      | i, k, j                            |
//! | `ColumnWise`   | j, k, i                            |
//! | `Blocked`      | 64³ tiles, row blocks on rayon     |
//! | `Simd`         | i, 8-lane j chunks, k (feature `simd`) |

#[cfg(feature = "simd")]
mod simd;

use crate::{Element, TensorError};
use rayon::prelude::*;
use std::fmt;

/// Tile edge used by [`GemmAlgorithm::Blocked`].
const BLOCK: usize = 64;

/// Below this many multiply-adds the blocked kernel stays single-threaded.
const PARALLEL_THRESHOLD: usize = 1 << 18;

/// Selects the loop structure used by [`gemm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GemmAlgorithm {
    InnerProduct,
    OuterProduct,
    RowWise,
    ColumnWise,
    Blocked,
    #[cfg(feature = "simd")]
    Simd,
}

impl GemmAlgorithm {
    /// Every algorithm compiled into this build.
    pub const ALL: &'static [GemmAlgorithm] = &[
        GemmAlgorithm::InnerProduct,
        GemmAlgorithm::OuterProduct,
        GemmAlgorithm::RowWise,
        GemmAlgorithm::ColumnWise,
        GemmAlgorithm::Blocked,
        #[cfg(feature = "simd")]
        GemmAlgorithm::Simd,
    ];

    /// Parses an algorithm name, accepting kebab-case, snake_case and a
    /// few short aliases (`"inner"`, `"outer"`, `"row"`, `"col"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "inner-product" | "inner" => Some(Self::InnerProduct),
            "outer-product" | "outer" => Some(Self::OuterProduct),
            "row-wise" | "row" => Some(Self::RowWise),
            "column-wise" | "col" | "column" => Some(Self::ColumnWise),
            "blocked" | "tiled" => Some(Self::Blocked),
            #[cfg(feature = "simd")]
            "simd" => Some(Self::Simd),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InnerProduct => "inner-product",
            Self::OuterProduct => "outer-product",
            Self::RowWise => "row-wise",
            Self::ColumnWise => "column-wise",
            Self::Blocked => "blocked",
            #[cfg(feature = "simd")]
            Self::Simd => "simd",
        }
    }
}

impl Default for GemmAlgorithm {
    #[cfg(feature = "simd")]
    fn default() -> Self {
        Self::Simd
    }

    #[cfg(not(feature = "simd"))]
    fn default() -> Self {
        Self::Blocked
    }
}

impl fmt::Display for GemmAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only, possibly transposed, row-major matrix over a slice.
///
/// `rows`/`cols` are the logical dimensions *after* transposition;
/// `ld` is the leading dimension (row stride) of the stored matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixRef<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    ld: usize,
    transposed: bool,
}

impl<'a, T: Element> MatrixRef<'a, T> {
    /// Wraps a dense `rows x cols` row-major matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Result<Self, TensorError> {
        Self::with_ld(data, rows, cols, cols)
    }

    /// Wraps a `rows x cols` row-major matrix with row stride `ld`.
    pub fn with_ld(data: &'a [T], rows: usize, cols: usize, ld: usize) -> Result<Self, TensorError> {
        if ld < cols {
            return Err(TensorError::InvalidArgument {
                op: "gemm",
                detail: format!("leading dimension {ld} is smaller than {cols} columns"),
            });
        }
        let needed = if rows == 0 || cols == 0 { 0 } else { (rows - 1) * ld + cols };
        if data.len() < needed {
            return Err(TensorError::BufferSizeMismatch {
                expected: needed,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            rows,
            cols,
            ld,
            transposed: false,
        })
    }

    /// Returns the logical transpose without touching the data.
    pub fn t(self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
            transposed: !self.transposed,
            ..self
        }
    }

    /// Applies [`t`](Self::t) when `flag` is set.
    pub fn transpose_if(self, flag: bool) -> Self {
        if flag {
            self.t()
        } else {
            self
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element at logical position `(i, j)`.
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        if self.transposed {
            self.data[j * self.ld + i]
        } else {
            self.data[i * self.ld + j]
        }
    }
}

/// Computes `C = alpha * A @ B + beta * C` with the chosen algorithm.
///
/// `A` is `M x K`, `B` is `K x N` (both as seen through their
/// [`MatrixRef`], so transposition is already folded in) and `c` is an
/// `M x N` row-major matrix with row stride `ldc`. When `beta` is zero,
/// `C` is overwritten rather than scaled, so stale NaNs do not leak
/// through.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if `A.cols != B.rows`, and a
/// size error if `c` is too small for `M x N` at stride `ldc`.
///
/// # Examples
/// ```
/// use tensor_core::{gemm, GemmAlgorithm, MatrixRef};
/// let a = [1.0f32, 2.0, 3.0, 4.0];
/// let b = [5.0f32, 6.0, 7.0, 8.0];
/// let mut c = [0.0f32; 4];
/// let (a, b) = (MatrixRef::new(&a, 2, 2).unwrap(), MatrixRef::new(&b, 2, 2).unwrap());
/// gemm(GemmAlgorithm::InnerProduct, 1.0, a, b, 0.0, &mut c, 2).unwrap();
/// assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
/// ```
pub fn gemm<T: Element>(
    algorithm: GemmAlgorithm,
    alpha: T,
    a: MatrixRef<'_, T>,
    b: MatrixRef<'_, T>,
    beta: T,
    c: &mut [T],
    ldc: usize,
) -> Result<(), TensorError> {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    if b.rows() != k {
        return Err(TensorError::ShapeMismatch {
            op: "gemm",
            lhs: crate::Shape::matrix(m, k),
            rhs: crate::Shape::matrix(b.rows(), n),
        });
    }
    if ldc < n {
        return Err(TensorError::InvalidArgument {
            op: "gemm",
            detail: format!("ldc {ldc} is smaller than {n} columns"),
        });
    }
    let needed = if m == 0 || n == 0 { 0 } else { (m - 1) * ldc + n };
    if c.len() < needed {
        return Err(TensorError::BufferSizeMismatch {
            expected: needed,
            actual: c.len(),
        });
    }
    if m == 0 || n == 0 {
        return Ok(());
    }

    scale_c(c, m, n, ldc, beta);
    if k == 0 {
        return Ok(());
    }

    tracing::trace!(%algorithm, m, n, k, "gemm");
    match algorithm {
        GemmAlgorithm::InnerProduct => inner_product(alpha, &a, &b, c, ldc),
        GemmAlgorithm::OuterProduct => outer_product(alpha, &a, &b, c, ldc),
        GemmAlgorithm::RowWise => row_wise(alpha, &a, &b, c, ldc),
        GemmAlgorithm::ColumnWise => column_wise(alpha, &a, &b, c, ldc),
        GemmAlgorithm::Blocked => blocked(alpha, &a, &b, c, ldc),
        #[cfg(feature = "simd")]
        GemmAlgorithm::Simd => simd::lanes(alpha, &a, &b, c, ldc),
    }
    Ok(())
}

fn scale_c<T: Element>(c: &mut [T], m: usize, n: usize, ldc: usize, beta: T) {
    if beta == T::ONE {
        return;
    }
    for i in 0..m {
        for x in &mut c[i * ldc..i * ldc + n] {
            *x = if beta == T::ZERO { T::ZERO } else { beta * *x };
        }
    }
}

fn inner_product<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    for i in 0..a.rows() {
        for j in 0..b.cols() {
            let mut dot = T::ZERO;
            for p in 0..a.cols() {
                dot += a.get(i, p) * b.get(p, j);
            }
            c[i * ldc + j] += alpha * dot;
        }
    }
}

fn outer_product<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    for p in 0..a.cols() {
        for i in 0..a.rows() {
            let aip = alpha * a.get(i, p);
            for j in 0..b.cols() {
                c[i * ldc + j] += aip * b.get(p, j);
            }
        }
    }
}

fn row_wise<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    let n = b.cols();
    for i in 0..a.rows() {
        let c_row = &mut c[i * ldc..i * ldc + n];
        for p in 0..a.cols() {
            let aip = alpha * a.get(i, p);
            for (j, cij) in c_row.iter_mut().enumerate() {
                *cij += aip * b.get(p, j);
            }
        }
    }
}

fn column_wise<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    for j in 0..b.cols() {
        for p in 0..a.cols() {
            let bpj = alpha * b.get(p, j);
            for i in 0..a.rows() {
                c[i * ldc + j] += a.get(i, p) * bpj;
            }
        }
    }
}

fn blocked<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let block_rows = |i0: usize, c_block: &mut [T]| {
        let i1 = (i0 + BLOCK).min(m);
        for p0 in (0..k).step_by(BLOCK) {
            let p1 = (p0 + BLOCK).min(k);
            for j0 in (0..n).step_by(BLOCK) {
                let j1 = (j0 + BLOCK).min(n);
                for i in i0..i1 {
                    let row = (i - i0) * ldc;
                    for p in p0..p1 {
                        let aip = alpha * a.get(i, p);
                        for j in j0..j1 {
                            c_block[row + j] += aip * b.get(p, j);
                        }
                    }
                }
            }
        }
    };

    if m.saturating_mul(n).saturating_mul(k) < PARALLEL_THRESHOLD {
        for (bi, c_block) in c.chunks_mut(BLOCK * ldc).enumerate() {
            let i0 = bi * BLOCK;
            if i0 >= m {
                break;
            }
            block_rows(i0, c_block);
        }
    } else {
        c.par_chunks_mut(BLOCK * ldc)
            .enumerate()
            .filter(|(bi, _)| bi * BLOCK < m)
            .for_each(|(bi, c_block)| block_rows(bi * BLOCK, c_block));
    }
}
