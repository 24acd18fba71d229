// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the inference runtime.

use model_ir::{GraphError, NodeError};

/// Errors that can occur while building a model or running inference.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The graph could not be scheduled.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A node's forward computation failed.
    #[error("node {index} ({op}) failed: {source}")]
    Node {
        index: usize,
        op: &'static str,
        #[source]
        source: NodeError,
    },

    /// A declared model output was not produced.
    #[error("declared output '{name}' was not produced")]
    MissingOutput { name: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The worker pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}
