// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The type-erased tensor handle stored in symbol tables.
//!
//! A [`TensorValue`] is a closed sum over the six supported element
//! types, each arm holding a shared [`Tensor`]. Code that needs the
//! concrete type matches once at its entry point, usually through
//! [`dispatch_numeric!`](crate::dispatch_numeric) or
//! [`dispatch_float!`](crate::dispatch_float), and then runs a generic
//! function over `T: Element`.

use crate::{DType, Element, Shape, Tensor};
use std::sync::Arc;

/// A shared tensor of any supported element type.
///
/// Cloning a `TensorValue` clones the `Arc`, not the data. Writers go
/// through [`Arc::make_mut`], so a value shared with another table is
/// copied before it is modified.
///
/// Serialized as `{"dtype": "f32", "tensor": {"shape": [..], "data": [..]}}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "dtype", content = "tensor", rename_all = "lowercase")]
pub enum TensorValue {
    F32(Arc<Tensor<f32>>),
    F64(Arc<Tensor<f64>>),
    I32(Arc<Tensor<i32>>),
    I64(Arc<Tensor<i64>>),
    U32(Arc<Tensor<u32>>),
    U64(Arc<Tensor<u64>>),
}

impl TensorValue {
    /// Returns the active element type.
    pub fn dtype(&self) -> DType {
        crate::dispatch_numeric!(self, |t| t.dtype())
    }

    /// Returns the shape of the held tensor.
    pub fn shape(&self) -> &Shape {
        crate::dispatch_numeric!(self, |t| t.shape())
    }

    /// Borrows the held tensor as `Tensor<T>` if the types match.
    pub fn downcast<T: Element>(&self) -> Option<&Tensor<T>> {
        T::from_value(self).map(|t| t.as_ref())
    }

    /// Clones the `Arc` handle if the types match.
    pub fn downcast_arc<T: Element>(&self) -> Option<Arc<Tensor<T>>> {
        T::from_value(self).cloned()
    }

    /// Returns `true` if both values hold the same type and are close
    /// under [`Tensor::is_close`].
    pub fn is_close(&self, other: &TensorValue, rtol: f64) -> bool {
        crate::dispatch_numeric!(self, |t| {
            other
                .downcast()
                .map(|o| t.is_close(o, rtol))
                .unwrap_or(false)
        })
    }
}

impl<T: Element> From<Tensor<T>> for TensorValue {
    fn from(tensor: Tensor<T>) -> Self {
        T::into_value(Arc::new(tensor))
    }
}

impl<T: Element> From<Arc<Tensor<T>>> for TensorValue {
    fn from(tensor: Arc<Tensor<T>>) -> Self {
        T::into_value(tensor)
    }
}

/// Matches every arm of a [`TensorValue`] and evaluates `$body` with the
/// typed `Arc<Tensor<T>>` bound to `$t`.
///
/// ```
/// use tensor_core::{dispatch_numeric, Tensor, TensorValue};
/// let v = TensorValue::from(Tensor::from_vec([3], vec![1i64, 2, 3]).unwrap());
/// let n = dispatch_numeric!(&v, |t| t.len());
/// assert_eq!(n, 3);
/// ```
#[macro_export]
macro_rules! dispatch_numeric {
    ($value:expr, |$t:ident| $body:expr) => {
        match $value {
            $crate::TensorValue::F32($t) => $body,
            $crate::TensorValue::F64($t) => $body,
            $crate::TensorValue::I32($t) => $body,
            $crate::TensorValue::I64($t) => $body,
            $crate::TensorValue::U32($t) => $body,
            $crate::TensorValue::U64($t) => $body,
        }
    };
}

/// Like [`dispatch_numeric!`] but only for the floating-point arms;
/// every other type evaluates `$fallback` with the element type bound to
/// `$dtype`.
#[macro_export]
macro_rules! dispatch_float {
    ($value:expr, |$t:ident| $body:expr, |$dtype:ident| $fallback:expr) => {
        match $value {
            $crate::TensorValue::F32($t) => $body,
            $crate::TensorValue::F64($t) => $body,
            other => {
                let $dtype = other.dtype();
                $fallback
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tensor() {
        let v = TensorValue::from(Tensor::from_vec([2, 2], vec![1.0f64; 4]).unwrap());
        assert_eq!(v.dtype(), DType::F64);
        assert_eq!(v.shape().dims(), &[2, 2]);
        assert!(v.downcast::<f64>().is_some());
        assert!(v.downcast::<f32>().is_none());
    }

    #[test]
    fn test_clone_shares_data() {
        let v = TensorValue::from(Tensor::from_vec([2], vec![1u64, 2]).unwrap());
        let w = v.clone();
        let a = v.downcast_arc::<u64>().unwrap();
        let b = w.downcast_arc::<u64>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_make_mut_copies_shared() {
        let v = TensorValue::from(Tensor::from_vec([2], vec![1i32, 2]).unwrap());
        let mut w = v.clone();
        if let Some(t) = i32::from_value_mut(&mut w) {
            Arc::make_mut(t)[0] = 9;
        }
        assert_eq!(v.downcast::<i32>().unwrap().as_slice(), &[1, 2]);
        assert_eq!(w.downcast::<i32>().unwrap().as_slice(), &[9, 2]);
    }

    #[test]
    fn test_dispatch_float_fallback() {
        let v = TensorValue::from(Tensor::from_vec([1], vec![3u32]).unwrap());
        let r: Result<usize, DType> = dispatch_float!(&v, |t| Ok(t.len()), |dtype| Err(dtype));
        assert_eq!(r, Err(DType::U32));
    }

    #[test]
    fn test_is_close_across_types() {
        let a = TensorValue::from(Tensor::from_vec([1], vec![1.0f32]).unwrap());
        let b = TensorValue::from(Tensor::from_vec([1], vec![1.0f64]).unwrap());
        assert!(a.is_close(&a.clone(), 1e-6));
        assert!(!a.is_close(&b, 1e-6));
    }

    #[test]
    fn test_serde_round_trip_checks_shape() {
        let v = TensorValue::from(Tensor::from_vec([2], vec![1i64, -2]).unwrap());
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"dtype\":\"i64\""));
        let back: TensorValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let bad = r#"{"dtype":"f32","tensor":{"shape":[3],"data":[1.0]}}"#;
        assert!(serde_json::from_str::<TensorValue>(bad).is_err());
    }
}
