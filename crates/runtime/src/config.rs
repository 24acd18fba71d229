// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! execution = "layered-parallel"
//! num_threads = 4
//! gemm = "blocked"
//! strict_outputs = true
//! ```

use crate::RuntimeError;
use model_ir::ForwardOptions;
use std::path::Path;
use tensor_core::GemmAlgorithm;

/// How the nodes of one dependency layer are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One node at a time, in layer order.
    Sequential,
    /// All nodes of a layer on a worker pool, with a barrier between layers.
    #[default]
    LayeredParallel,
}

/// Configuration for the inference runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Layer execution mode.
    pub execution: ExecutionMode,
    /// Number of worker threads (defaults to number of online CPU cores).
    pub num_threads: Option<usize>,
    /// GEMM algorithm name: `"inner-product"`, `"outer-product"`,
    /// `"row-wise"`, `"column-wise"`, `"blocked"` or `"simd"`.
    pub gemm: String,
    /// Whether a declared output missing after inference is an error.
    pub strict_outputs: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string, rejecting unknown GEMM names.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))?;
        config.gemm_algorithm()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// The GEMM algorithm named by `gemm`.
    ///
    /// `"simd"` only resolves when `tensor-core` is built with its `simd`
    /// feature.
    pub fn gemm_algorithm(&self) -> Result<GemmAlgorithm, RuntimeError> {
        GemmAlgorithm::from_str_loose(&self.gemm).ok_or_else(|| {
            let known: Vec<&str> = GemmAlgorithm::ALL.iter().map(|a| a.as_str()).collect();
            RuntimeError::Config(format!(
                "unknown gemm algorithm '{}'; expected one of {}",
                self.gemm,
                known.join(", "),
            ))
        })
    }

    /// Per-node options derived from this config.
    pub fn forward_options(&self) -> Result<ForwardOptions, RuntimeError> {
        Ok(ForwardOptions {
            gemm: self.gemm_algorithm()?,
        })
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            num_threads: None,
            gemm: GemmAlgorithm::default().as_str().to_string(),
            strict_outputs: true,
        }
    }
}
