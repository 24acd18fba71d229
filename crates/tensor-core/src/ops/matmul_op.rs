// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D matrix multiplication on top of [`gemm`](super::gemm).

use super::gemm::{gemm, GemmAlgorithm, MatrixRef};
use crate::{Element, Shape, Tensor, TensorError};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `output` must already be
/// `[M, N]`. Its previous contents are overwritten.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if either input is not 2-D, the
/// inner dimensions differ, or `output` has the wrong shape.
pub fn matmul<T: Element>(
    lhs: &Tensor<T>,
    rhs: &Tensor<T>,
    output: &mut Tensor<T>,
    algorithm: GemmAlgorithm,
) -> Result<(), TensorError> {
    let (m, k, n) = match (lhs.dims(), rhs.dims()) {
        (&[m, k], &[k2, n]) if k == k2 => (m, k, n),
        _ => {
            return Err(TensorError::ShapeMismatch {
                op: "matmul",
                lhs: lhs.shape().clone(),
                rhs: rhs.shape().clone(),
            })
        }
    };

    let expected = Shape::matrix(m, n);
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let a = MatrixRef::new(lhs.as_slice(), m, k)?;
    let b = MatrixRef::new(rhs.as_slice(), k, n)?;
    gemm(algorithm, T::ONE, a, b, T::ZERO, output.as_mut_slice(), n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_2x3_times_3x2() {
        // [[1,2,3],[4,5,6]] @ [[7,8],[9,10],[11,12]] = [[58,64],[139,154]]
        let a = Tensor::from_vec([2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::from_vec([3, 2], vec![7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let mut c = Tensor::full([2, 2], 99.0f32).unwrap();

        matmul(&a, &b, &mut c, GemmAlgorithm::default()).unwrap();
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_integer() {
        let a = Tensor::from_vec([1, 2], vec![2i32, 3]).unwrap();
        let b = Tensor::from_vec([2, 1], vec![4i32, 5]).unwrap();
        let mut c = Tensor::zeros([1, 1]).unwrap();
        matmul(&a, &b, &mut c, GemmAlgorithm::RowWise).unwrap();
        assert_eq!(c.as_slice(), &[23]);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Tensor::<f32>::zeros([2, 3]).unwrap();
        let b = Tensor::<f32>::zeros([4, 2]).unwrap();
        let mut c = Tensor::zeros([2, 2]).unwrap();
        assert!(matches!(
            matmul(&a, &b, &mut c, GemmAlgorithm::Blocked),
            Err(TensorError::ShapeMismatch { op: "matmul", .. })
        ));
    }

    #[test]
    fn test_matmul_rejects_non_matrix() {
        let a = Tensor::<f64>::zeros([2, 2, 2]).unwrap();
        let b = Tensor::<f64>::zeros([2, 2]).unwrap();
        let mut c = Tensor::zeros([2, 2]).unwrap();
        assert!(matmul(&a, &b, &mut c, GemmAlgorithm::Blocked).is_err());
    }

    #[test]
    fn test_matmul_wrong_output_shape() {
        let a = Tensor::<f32>::zeros([2, 3]).unwrap();
        let b = Tensor::<f32>::zeros([3, 4]).unwrap();
        let mut c = Tensor::zeros([4, 2]).unwrap();
        assert!(matches!(
            matmul(&a, &b, &mut c, GemmAlgorithm::Blocked),
            Err(TensorError::ShapeMismatch { op: "matmul (output)", .. })
        ));
    }
}
