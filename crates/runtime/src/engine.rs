// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The model: an operator graph plus the tensors it starts from.
//!
//! A [`Model`] is immutable during inference. Every [`Model::infer`]
//! call works on its own copy of the stored table, so concurrent calls
//! on a shared `&Model` never observe each other's writes.

use crate::{ExecutionMode, InferenceRun, RuntimeConfig, RuntimeError};
use model_ir::{graph, ExecutionPlan, ForwardOptions, GraphError, Node, SymbolTable};
use std::sync::Arc;

/// An executable operator graph.
///
/// # Example
/// ```
/// use model_ir::{Node, SymbolTable};
/// use model_ir::node::BinaryNode;
/// use runtime::Model;
/// use tensor_core::Tensor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bias = Tensor::from_vec([3], vec![1.0f32, 1.0, 1.0])?;
/// let model = Model::new(
///     vec![Node::Add(BinaryNode::new("x", "bias", "y"))],
///     SymbolTable::from_iter([("bias", bias)]),
///     vec!["x".into()],
///     vec!["y".into()],
/// )?;
///
/// let x = Tensor::from_vec([3], vec![1.0f32, 2.0, 3.0])?;
/// let outputs = model.infer(SymbolTable::from_iter([("x", x)]))?;
/// let y = outputs.get("y").and_then(|v| v.downcast::<f32>()).unwrap();
/// assert_eq!(y.as_slice(), &[2.0, 3.0, 4.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Model {
    nodes: Vec<Node>,
    table: SymbolTable,
    inputs: Vec<String>,
    outputs: Vec<String>,
    config: RuntimeConfig,
    options: ForwardOptions,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Model {
    /// Builds a model with the default [`RuntimeConfig`].
    ///
    /// # Errors
    /// [`GraphError::DuplicateProducer`] if two nodes declare the same
    /// output; [`RuntimeError::ThreadPool`] if the worker pool cannot
    /// start.
    pub fn new(
        nodes: Vec<Node>,
        table: SymbolTable,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Result<Self, RuntimeError> {
        Self::with_config(nodes, table, inputs, outputs, RuntimeConfig::default())
    }

    /// Builds a model with an explicit configuration.
    pub fn with_config(
        nodes: Vec<Node>,
        table: SymbolTable,
        inputs: Vec<String>,
        outputs: Vec<String>,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        graph::producers(&nodes)?;
        let options = config.forward_options()?;
        let pool = build_pool(&config)?;

        tracing::info!(
            nodes = nodes.len(),
            initializers = table.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            execution = ?config.execution,
            gemm = %options.gemm,
            "model created"
        );

        Ok(Self {
            nodes,
            table,
            inputs,
            outputs,
            config,
            options,
            pool,
        })
    }

    /// Appends a node.
    ///
    /// # Errors
    /// [`GraphError::DuplicateProducer`] if one of its outputs is already
    /// produced; the model is left unchanged.
    pub fn add_node(&mut self, node: Node) -> Result<(), RuntimeError> {
        self.nodes.push(node);
        if let Err(e) = graph::producers(&self.nodes) {
            self.nodes.pop();
            return Err(e.into());
        }
        let index = self.nodes.len() - 1;
        tracing::debug!(index, op = self.nodes[index].op_type(), "node added");
        Ok(())
    }

    /// The layering an `infer` call would use.
    pub fn plan(&self) -> Result<ExecutionPlan, GraphError> {
        ExecutionPlan::for_nodes(&self.nodes)
    }

    /// Starts an inference call without running it, for callers that
    /// want to inspect the schedule or run state.
    pub fn run(&self, inputs: SymbolTable) -> InferenceRun<'_> {
        InferenceRun::new(self, inputs)
    }

    /// Runs the graph on `inputs` and returns the declared outputs.
    ///
    /// Caller inputs take precedence over stored tensors of the same
    /// name.
    ///
    /// # Errors
    /// Structural errors before any node runs, the first node failure,
    /// or a missing declared output under strict outputs.
    pub fn infer(&self, inputs: SymbolTable) -> Result<SymbolTable, RuntimeError> {
        self.run(inputs).schedule()?.execute()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The stored name → tensor table every run starts from.
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn forward_options(&self) -> ForwardOptions {
        self.options
    }

    pub(crate) fn pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_deref()
    }
}

fn build_pool(config: &RuntimeConfig) -> Result<Option<Arc<rayon::ThreadPool>>, RuntimeError> {
    if config.execution != ExecutionMode::LayeredParallel {
        return Ok(None);
    }
    let threads = config.resolve_threads();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("edge-onnx-worker-{i}"))
        .build()
        .map_err(|e| RuntimeError::ThreadPool(format!("failed to build worker pool: {e}")))?;
    tracing::debug!(threads, "worker pool ready");
    Ok(Some(Arc::new(pool)))
}
