// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Unary element-wise application.

use crate::{Element, Tensor, TensorError};

/// Applies `f` to every element of `input`, writing into `output`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if `output` does not have the
/// shape of `input`.
pub fn elementwise<T, U, F>(input: &Tensor<T>, f: F, output: &mut Tensor<U>) -> Result<(), TensorError>
where
    T: Element,
    U: Element,
    F: Fn(T) -> U,
{
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "elementwise",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    for (o, &x) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *o = f(x);
    }
    Ok(())
}

/// Applies `f` to every element of `tensor` in place.
pub fn elementwise_in_place<T, F>(tensor: &mut Tensor<T>, f: F)
where
    T: Element,
    F: Fn(T) -> T,
{
    for x in tensor.as_mut_slice() {
        *x = f(*x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementwise_square() {
        let a = Tensor::from_vec([2, 2], vec![1.0f32, -2.0, 3.0, -4.0]).unwrap();
        let mut out = Tensor::zeros([2, 2]).unwrap();
        elementwise(&a, |x| x * x, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[1.0, 4.0, 9.0, 16.0]);
    }

    #[test]
    fn test_elementwise_changes_type() {
        let a = Tensor::from_vec([3], vec![1.5f64, 2.5, -0.5]).unwrap();
        let mut out = Tensor::<i64>::zeros([3]).unwrap();
        elementwise(&a, |x| x as i64, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[1, 2, 0]);
    }

    #[test]
    fn test_elementwise_shape_mismatch() {
        let a = Tensor::<f32>::zeros([2, 3]).unwrap();
        let mut out = Tensor::<f32>::zeros([3, 2]).unwrap();
        assert!(elementwise(&a, |x| x, &mut out).is_err());
    }

    #[test]
    fn test_in_place() {
        let mut a = Tensor::from_vec([3], vec![1u32, 2, 3]).unwrap();
        elementwise_in_place(&mut a, |x| x + 10);
        assert_eq!(a.as_slice(), &[11, 12, 13]);
    }
}
