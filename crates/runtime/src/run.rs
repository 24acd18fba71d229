// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A single inference call with a type-state–enforced pipeline.
//!
//! ```text
//! InferenceRun<Unscheduled>
//!     │  .schedule()      Kahn layering, cycle check
//!     ▼
//! InferenceRun<Scheduled>
//!     │  .execute()       layer by layer, barrier between layers
//!     ▼
//!   SymbolTable of declared outputs
//! ```
//!
//! Each run owns a working table seeded from the model's stored table
//! and overlaid with the caller's inputs, so the model itself is never
//! written to.

use crate::{ExecutionMode, Model, RuntimeError};
use model_ir::{ExecutionPlan, ForwardOptions, Node, SymbolTable};
use rayon::prelude::*;
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────

/// The run is seeded but its layers are unknown.
#[derive(Debug)]
pub struct Unscheduled;

/// The run holds a valid layering.
#[derive(Debug)]
pub struct Scheduled {
    plan: ExecutionPlan,
}

/// Sealed trait for run stages.
pub trait RunStage: fmt::Debug {}
impl RunStage for Unscheduled {}
impl RunStage for Scheduled {}

// ── Observable state ───────────────────────────────────────────

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The graph is empty or contains a cycle.
    Structural,
    /// A node's forward computation failed.
    Node,
    /// A declared output was not produced.
    MissingOutput,
    /// The runtime could not be set up.
    Setup,
}

/// Lifecycle of one inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Unscheduled,
    Scheduled,
    Executing,
    Completed,
    Failed(Failure),
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Unscheduled => write!(f, "unscheduled"),
            RunState::Scheduled => write!(f, "scheduled"),
            RunState::Executing => write!(f, "executing"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed(failure) => write!(f, "failed ({failure:?})"),
        }
    }
}

impl RuntimeError {
    /// The terminal state a run ends in when it fails with `self`.
    pub fn run_state(&self) -> RunState {
        let failure = match self {
            RuntimeError::Graph(_) => Failure::Structural,
            RuntimeError::Node { .. } => Failure::Node,
            RuntimeError::MissingOutput { .. } => Failure::MissingOutput,
            RuntimeError::Config(_) | RuntimeError::ThreadPool(_) => Failure::Setup,
        };
        RunState::Failed(failure)
    }
}

// ── Run ────────────────────────────────────────────────────────

/// One `infer` call against a [`Model`].
///
/// `S` is a type-state marker: `execute` only exists once the run is
/// scheduled.
pub struct InferenceRun<'m, S: RunStage = Unscheduled> {
    model: &'m Model,
    table: SymbolTable,
    state: RunState,
    stage: S,
}

impl<S: RunStage> InferenceRun<'_, S> {
    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The working table as it currently stands.
    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    fn fail(&mut self, error: RuntimeError) -> RuntimeError {
        self.transition(error.run_state());
        error
    }
}

// ── Unscheduled → Scheduled ────────────────────────────────────

impl<'m> InferenceRun<'m, Unscheduled> {
    /// Seeds a working table: the model's table, then `inputs` on top.
    pub(crate) fn new(model: &'m Model, inputs: SymbolTable) -> Self {
        let mut table = model.table().clone();
        for name in model.inputs() {
            if !inputs.contains(name) && !table.contains(name) {
                tracing::warn!(input = %name, "declared input not supplied");
            }
        }
        table.merge(inputs);

        Self {
            model,
            table,
            state: RunState::Unscheduled,
            stage: Unscheduled,
        }
    }

    /// Resolves producers and layers the graph.
    ///
    /// # Errors
    /// [`RuntimeError::Graph`] for an empty or cyclic graph; no node
    /// runs in that case.
    pub fn schedule(mut self) -> Result<InferenceRun<'m, Scheduled>, RuntimeError> {
        let plan = match ExecutionPlan::for_nodes(self.model.nodes()) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.transition(RunState::Scheduled);

        Ok(InferenceRun {
            model: self.model,
            table: self.table,
            state: self.state,
            stage: Scheduled { plan },
        })
    }
}

// ── Scheduled → outputs ────────────────────────────────────────

impl InferenceRun<'_, Scheduled> {
    pub fn plan(&self) -> &ExecutionPlan {
        &self.stage.plan
    }

    /// Runs every layer and collects the model's declared outputs.
    ///
    /// # Errors
    /// The first failing node in layer order ([`RuntimeError::Node`]),
    /// or [`RuntimeError::MissingOutput`] when strict outputs are on.
    pub fn execute(mut self) -> Result<SymbolTable, RuntimeError> {
        self.transition(RunState::Executing);
        tracing::info!(
            nodes = self.stage.plan.num_nodes(),
            layers = self.stage.plan.num_layers(),
            "inference started"
        );

        if let Err(e) = self.run_layers() {
            return Err(self.fail(e));
        }
        let outputs = match self.collect_outputs() {
            Ok(outputs) => outputs,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(RunState::Completed);
        tracing::info!(outputs = outputs.len(), "inference finished");
        Ok(outputs)
    }

    fn run_layers(&mut self) -> Result<(), RuntimeError> {
        let model = self.model;
        let options = model.forward_options();
        let nodes = model.nodes();

        for (index, layer) in self.stage.plan.iter().enumerate() {
            tracing::debug!(layer = index, width = layer.len(), "executing layer");
            match (model.config().execution, model.pool()) {
                (ExecutionMode::LayeredParallel, Some(pool)) if layer.len() > 1 => {
                    run_parallel(pool, nodes, layer, &mut self.table, options)?;
                }
                _ => {
                    for &i in layer {
                        run_node(nodes, i, &mut self.table, options)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_outputs(&self) -> Result<SymbolTable, RuntimeError> {
        let strict = self.model.config().strict_outputs;
        let mut outputs = SymbolTable::new();
        for name in self.model.outputs() {
            match self.table.get(name) {
                Some(value) => {
                    outputs.insert(name.as_str(), value.clone());
                }
                None if strict => {
                    return Err(RuntimeError::MissingOutput { name: name.clone() });
                }
                None => tracing::warn!(output = %name, "declared output not produced, omitting"),
            }
        }
        Ok(outputs)
    }
}

impl<S: RunStage> fmt::Debug for InferenceRun<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceRun")
            .field("stage", &self.stage)
            .field("state", &self.state)
            .field("tensors", &self.table.len())
            .finish()
    }
}

// ── Layer execution ────────────────────────────────────────────

fn run_node(
    nodes: &[Node],
    index: usize,
    table: &mut SymbolTable,
    options: ForwardOptions,
) -> Result<(), RuntimeError> {
    let node = &nodes[index];
    node.forward(table, &options).map_err(|source| RuntimeError::Node {
        index,
        op: node.op_type(),
        source,
    })
}

/// Runs one layer on `pool`.
///
/// Each node gets a scratch table holding handles to its inputs and
/// taking ownership of its existing outputs, so output buffers are
/// reused without copying. Nodes of one layer never read each other's
/// outputs, so the scratch tables are disjoint in what they write.
fn run_parallel(
    pool: &rayon::ThreadPool,
    nodes: &[Node],
    layer: &[usize],
    table: &mut SymbolTable,
    options: ForwardOptions,
) -> Result<(), RuntimeError> {
    let scratches: Vec<SymbolTable> = layer.iter().map(|&i| scratch_for(&nodes[i], table)).collect();

    let results: Vec<Result<SymbolTable, RuntimeError>> = pool.install(|| {
        layer
            .par_iter()
            .zip(scratches)
            .map(|(&i, mut scratch)| run_node(nodes, i, &mut scratch, options).map(|()| scratch))
            .collect()
    });

    for result in results {
        table.merge(result?);
    }
    Ok(())
}

fn scratch_for(node: &Node, table: &mut SymbolTable) -> SymbolTable {
    let mut scratch = SymbolTable::new();
    for name in node.inputs() {
        if let Some(value) = table.get(name) {
            scratch.insert(name, value.clone());
        }
    }
    for name in node.outputs() {
        if let Some(value) = table.remove(name) {
            scratch.insert(name, value);
        }
    }
    scratch
}

