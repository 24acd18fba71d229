// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-width lane kernel.
//!
//! Each row of `C` is processed in chunks of [`LANES`] columns held in a
//! stack accumulator, so the innermost loop is a straight-line
//! multiply-add over an array the compiler can keep in vector registers.
//! The tail (`n % LANES` columns) falls back to scalar dot products.

use super::MatrixRef;
use crate::Element;

/// Accumulator width: 8 f32 lanes fill one 256-bit register.
pub(super) const LANES: usize = 8;

pub(super) fn lanes<T: Element>(alpha: T, a: &MatrixRef<'_, T>, b: &MatrixRef<'_, T>, c: &mut [T], ldc: usize) {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let full = n - n % LANES;

    for i in 0..m {
        let c_row = &mut c[i * ldc..i * ldc + n];

        for j0 in (0..full).step_by(LANES) {
            let mut acc = [T::ZERO; LANES];
            for p in 0..k {
                let aip = a.get(i, p);
                for (l, slot) in acc.iter_mut().enumerate() {
                    *slot += aip * b.get(p, j0 + l);
                }
            }
            for (dst, &v) in c_row[j0..j0 + LANES].iter_mut().zip(&acc) {
                *dst += alpha * v;
            }
        }

        for j in full..n {
            let mut dot = T::ZERO;
            for p in 0..k {
                dot += a.get(i, p) * b.get(p, j);
            }
            c_row[j] += alpha * dot;
        }
    }
}
