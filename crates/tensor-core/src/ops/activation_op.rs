// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scalar activation functions.
//!
//! These are the per-element bodies the activation nodes feed to
//! [`elementwise`](crate::ops::elementwise). They are generic over
//! [`Float`] (ReLU over any [`Element`]) and computed in the element's
//! own precision.

use crate::{Element, Float};

/// Coefficient `sqrt(2/π)`.
const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;

/// Cubic coefficient in the tanh approximation.
const GELU_COEFF: f64 = 0.044_715;

/// Which GELU formula to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeluApproximation {
    /// `0.5 * x * (1 + erf(x / sqrt(2)))`.
    #[default]
    None,
    /// `0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`, the GPT-2 form.
    Tanh,
}

/// `max(x, 0)`.
#[inline]
pub fn relu<T: Element>(x: T) -> T {
    if x > T::ZERO {
        x
    } else {
        T::ZERO
    }
}

/// `x` for positive inputs, `alpha * x` otherwise.
#[inline]
pub fn leaky_relu<T: Float>(x: T, alpha: T) -> T {
    if x >= T::ZERO {
        x
    } else {
        alpha * x
    }
}

/// `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid<T: Float>(x: T) -> T {
    T::ONE / (T::ONE + (-x).exp())
}

#[inline]
pub fn tanh<T: Float>(x: T) -> T {
    x.tanh()
}

/// Gaussian Error Linear Unit.
#[inline]
pub fn gelu<T: Float>(x: T, approximation: GeluApproximation) -> T {
    let half = T::from_f64(0.5);
    match approximation {
        GeluApproximation::None => {
            half * x * (T::ONE + (x / T::from_f64(std::f64::consts::SQRT_2)).erf())
        }
        GeluApproximation::Tanh => {
            let inner = T::from_f64(SQRT_2_OVER_PI) * (x + T::from_f64(GELU_COEFF) * x * x * x);
            half * x * (T::ONE + inner.tanh())
        }
    }
}

/// `x` for positive inputs, `alpha * (e^x - 1)` otherwise.
#[inline]
pub fn elu<T: Float>(x: T, alpha: T) -> T {
    if x > T::ZERO {
        x
    } else {
        alpha * (x.exp() - T::ONE)
    }
}

/// `x * sigmoid(x)`.
#[inline]
pub fn swish<T: Float>(x: T) -> T {
    x * sigmoid(x)
}
