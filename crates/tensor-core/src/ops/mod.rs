// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor kernels.
//!
//! Each operation writes into a caller-provided output tensor whose
//! shape it validates first, so nothing is allocated in the inference
//! hot path. Kernels are generic over [`Element`](crate::Element) or
//! [`Float`](crate::Float); type dispatch happens once, at the node.

mod activation_op;
mod arithmetic;
mod elementwise;
mod gemm;
mod im2col;
mod lrn_op;
mod matmul_op;
mod reduce;
mod softmax_op;
mod transpose;
mod window;

pub use activation_op::{elu, gelu, leaky_relu, relu, sigmoid, swish, tanh, GeluApproximation};
pub use arithmetic::{add, equals, multiply, multiply_elementwise, subtract};
pub use elementwise::{elementwise, elementwise_in_place};
pub use gemm::{gemm, GemmAlgorithm, MatrixRef};
pub use im2col::{im2col, Conv2dGeometry};
pub use lrn_op::{lrn, LrnParams};
pub use matmul_op::matmul;
pub use reduce::arg_max;
pub use softmax_op::{log_softmax, softmax};
pub use transpose::{resolve_permutation, transpose, transposed_shape};
pub use window::{
    average_reducer, column_major_spatial_index, max_reducer, sliding_window, AutoPad, PoolConfig, PoolGeometry,
    WindowSpec,
};
