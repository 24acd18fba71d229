// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Typed tensors and numeric kernels for graph inference.
//!
//! This crate provides:
//! - [`Tensor<T>`] — a dense, row-major tensor over 64-byte aligned storage.
//! - [`Shape`] — dimension lists with broadcasting and `-1` resolution.
//! - [`DType`], [`Element`] and [`Float`] — the closed set of six element
//!   types (f32, f64, i32, i64, u32, u64) and their arithmetic.
//! - [`TensorValue`] — the type-erased union a symbol table stores, with
//!   the [`dispatch_numeric!`] and [`dispatch_float!`] entry-point macros.
//! - Kernels: broadcasting arithmetic, GEMM with interchangeable loop
//!   orders, softmax, activations, LRN, transpose, im2col and windowed
//!   pooling.
//!
//! # Design Goals
//! - Kernels write into caller-provided outputs and allocate nothing hidden.
//! - Runtime types are matched once at an entry point; kernels are generic.
//! - Clean error types via `thiserror`.

mod dtype;
mod element;
mod error;
pub mod ops;
mod shape;
mod storage;
mod tensor;
mod value;

pub use dtype::DType;
pub use element::{Element, Float};
pub use error::TensorError;
pub use ops::{gemm, GemmAlgorithm, MatrixRef};
pub use shape::Shape;
pub use storage::{AlignedBuffer, MEMORY_ALIGNMENT};
pub use tensor::{Tensor, DEFAULT_RTOL};
pub use value::TensorValue;
