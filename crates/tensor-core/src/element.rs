// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element traits that tie Rust scalar types to [`DType`] and [`TensorValue`].
//!
//! [`Element`] is implemented for exactly the six types the runtime
//! carries; the trait is sealed so the closed set stays closed.
//! [`Float`] adds the transcendental functions the activation kernels need.

use crate::{DType, Tensor, TensorValue};
use rand::distributions::uniform::SampleUniform;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
}

/// A scalar type that can be stored in a [`Tensor`].
pub trait Element:
    sealed::Sealed
    + Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SampleUniform
    + serde::Serialize
    + serde::de::DeserializeOwned
{
    /// The runtime tag for this type.
    const DTYPE: DType;
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// Smallest finite value; the seed for max reductions.
    const LOWEST: Self;

    /// Lossy conversion from `f64` (`as` semantics).
    fn from_f64(v: f64) -> Self;

    /// Lossy conversion to `f64` (`as` semantics).
    fn to_f64(self) -> f64;

    /// Borrows the typed tensor if `value` holds this element type.
    fn from_value(value: &TensorValue) -> Option<&Arc<Tensor<Self>>>;

    /// Mutably borrows the typed tensor if `value` holds this element type.
    fn from_value_mut(value: &mut TensorValue) -> Option<&mut Arc<Tensor<Self>>>;

    /// Wraps a typed tensor into the tagged union.
    fn into_value(tensor: Arc<Tensor<Self>>) -> TensorValue;

    /// Addition that wraps on integer overflow; IEEE addition for floats.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// Subtraction that wraps on integer overflow; IEEE subtraction for floats.
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Multiplication that wraps on integer overflow; IEEE multiplication for floats.
    fn wrapping_mul(self, rhs: Self) -> Self;
}

macro_rules! arith_methods {
    (ieee) => {
        #[inline]
        fn wrapping_add(self, rhs: Self) -> Self {
            self + rhs
        }
        #[inline]
        fn wrapping_sub(self, rhs: Self) -> Self {
            self - rhs
        }
        #[inline]
        fn wrapping_mul(self, rhs: Self) -> Self {
            self * rhs
        }
    };
    (wrapping, $ty:ty) => {
        #[inline]
        fn wrapping_add(self, rhs: Self) -> Self {
            <$ty>::wrapping_add(self, rhs)
        }
        #[inline]
        fn wrapping_sub(self, rhs: Self) -> Self {
            <$ty>::wrapping_sub(self, rhs)
        }
        #[inline]
        fn wrapping_mul(self, rhs: Self) -> Self {
            <$ty>::wrapping_mul(self, rhs)
        }
    };
}

/// Floating-point elements.
pub trait Float: Element + Neg<Output = Self> {
    const NEG_INFINITY: Self;

    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn tanh(self) -> Self;
    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn powf(self, n: Self) -> Self;
    fn erf(self) -> Self;
    fn max(self, other: Self) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $zero:expr, $one:expr, $($arith:tt)+) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const DTYPE: DType = DType::$variant;
            const ZERO: Self = $zero;
            const ONE: Self = $one;
            const LOWEST: Self = <$ty>::MIN;

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_value(value: &TensorValue) -> Option<&Arc<Tensor<Self>>> {
                match value {
                    TensorValue::$variant(t) => Some(t),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut TensorValue) -> Option<&mut Arc<Tensor<Self>>> {
                match value {
                    TensorValue::$variant(t) => Some(t),
                    _ => None,
                }
            }

            fn into_value(tensor: Arc<Tensor<Self>>) -> TensorValue {
                TensorValue::$variant(tensor)
            }

            arith_methods!($($arith)+);
        }
    };
}

impl_element!(f32, F32, 0.0, 1.0, ieee);
impl_element!(f64, F64, 0.0, 1.0, ieee);
impl_element!(i32, I32, 0, 1, wrapping, i32);
impl_element!(i64, I64, 0, 1, wrapping, i64);
impl_element!(u32, U32, 0, 1, wrapping, u32);
impl_element!(u64, U64, 0, 1, wrapping, u64);

macro_rules! impl_float {
    ($ty:ty, $erf:path) => {
        impl Float for $ty {
            const NEG_INFINITY: Self = <$ty>::NEG_INFINITY;

            #[inline]
            fn exp(self) -> Self {
                <$ty>::exp(self)
            }
            #[inline]
            fn ln(self) -> Self {
                <$ty>::ln(self)
            }
            #[inline]
            fn tanh(self) -> Self {
                <$ty>::tanh(self)
            }
            #[inline]
            fn sqrt(self) -> Self {
                <$ty>::sqrt(self)
            }
            #[inline]
            fn abs(self) -> Self {
                <$ty>::abs(self)
            }
            #[inline]
            fn powf(self, n: Self) -> Self {
                <$ty>::powf(self, n)
            }
            #[inline]
            fn erf(self) -> Self {
                $erf(self)
            }
            #[inline]
            fn max(self, other: Self) -> Self {
                <$ty>::max(self, other)
            }
        }
    };
}

impl_float!(f32, libm::erff);
impl_float!(f64, libm::erf);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<f32 as Element>::DTYPE, DType::F32);
        assert_eq!(<i64 as Element>::DTYPE, DType::I64);
        assert_eq!(<u32 as Element>::DTYPE, DType::U32);
    }

    #[test]
    fn test_value_roundtrip() {
        let t = Arc::new(Tensor::<i32>::from_vec([2], vec![1, 2]).unwrap());
        let v = i32::into_value(t);
        assert_eq!(v.dtype(), DType::I32);
        assert!(i32::from_value(&v).is_some());
        assert!(f32::from_value(&v).is_none());
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(Element::wrapping_sub(0u32, 1), u32::MAX);
        assert_eq!(Element::wrapping_add(i32::MAX, 1), i32::MIN);
        assert_eq!(Element::wrapping_mul(u64::MAX, 2), u64::MAX - 1);
        assert_eq!(Element::wrapping_add(1.5f32, 2.0), 3.5);
    }

    #[test]
    fn test_erf_values() {
        assert!(Float::erf(0.0f32).abs() < 1e-7);
        assert!((Float::erf(1.0f64) - 0.842_700_792_949_715).abs() < 1e-12);
    }
}
