// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The executor that runs an operator graph from `model-ir` over
//! tensors from `tensor-core`.
//!
//! A [`Model`] holds:
//! - the nodes, in any order (edges come from tensor names);
//! - a stored table of initializers every run starts from;
//! - the declared input and output names;
//! - a [`RuntimeConfig`] choosing the execution mode and GEMM algorithm.
//!
//! # Type-State Pipeline
//! Each `infer` call walks a type-safe pipeline:
//! ```text
//! InferenceRun<Unscheduled> → InferenceRun<Scheduled> → outputs
//! ```
//! Transitions are compile-time checked; the runtime [`RunState`] of each
//! step is logged with `tracing`.
//!
//! # Parallel Execution
//! Nodes within one dependency layer are independent and run on a
//! `rayon` pool in [`ExecutionMode::LayeredParallel`]; layers run in
//! order with a barrier between them.

mod config;
mod engine;
mod error;
mod run;

pub use config::{ExecutionMode, RuntimeConfig};
pub use engine::Model;
pub use error::RuntimeError;
pub use run::{Failure, InferenceRun, RunStage, RunState, Scheduled, Unscheduled};
