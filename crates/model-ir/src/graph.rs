// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dependency resolution and Kahn layering.
//!
//! Edges come from tensor names: if node `p` declares output `t` and
//! node `c` reads `t`, then `p → c`. Names nobody produces are external
//! (caller inputs or initializers) and impose no edge.
//!
//! ```text
//! nodes ──producers()──▶ name → node
//!       ──DependencyGraph::build()──▶ edges, in-degrees
//!       ──layers()──▶ ExecutionPlan [[layer 0], [layer 1], ..]
//! ```
//!
//! Within a layer no node depends on another, so a layer can run in
//! parallel; layers themselves run strictly in order.

use crate::{GraphError, Node};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Maps every produced tensor name to its unique producer.
///
/// # Errors
/// [`GraphError::DuplicateProducer`] if two nodes (or one node twice)
/// declare the same output.
pub fn producers(nodes: &[Node]) -> Result<HashMap<&str, usize>, GraphError> {
    let mut map = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for output in node.outputs() {
            if let Some(first) = map.insert(output, index) {
                return Err(GraphError::DuplicateProducer {
                    output: output.to_string(),
                    first,
                    second: index,
                });
            }
        }
    }
    Ok(map)
}

/// Producer → consumer edges between node indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    successors: Vec<BTreeSet<usize>>,
    in_degree: Vec<usize>,
}

impl DependencyGraph {
    /// Resolves edges for `nodes`. Parallel edges collapse into one and
    /// a node reading its own output adds no edge.
    pub fn build(nodes: &[Node]) -> Result<Self, GraphError> {
        let producers = producers(nodes)?;
        let mut successors = vec![BTreeSet::new(); nodes.len()];
        let mut in_degree = vec![0; nodes.len()];

        for (consumer, node) in nodes.iter().enumerate() {
            for input in node.inputs() {
                let Some(&producer) = producers.get(input) else {
                    continue;
                };
                if producer != consumer && successors[producer].insert(consumer) {
                    in_degree[consumer] += 1;
                }
            }
        }
        Ok(Self { successors, in_degree })
    }

    pub fn num_nodes(&self) -> usize {
        self.in_degree.len()
    }

    /// All edges as `(producer, consumer)`, in index order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(p, succ)| succ.iter().map(move |&c| (p, c)))
    }

    /// Kahn's algorithm, draining the ready set one layer at a time.
    ///
    /// # Errors
    /// [`GraphError::EmptyGraph`] for no nodes, [`GraphError::Cycle`] if
    /// some nodes never become ready.
    pub fn layers(&self) -> Result<ExecutionPlan, GraphError> {
        let total = self.num_nodes();
        if total == 0 {
            return Err(GraphError::EmptyGraph);
        }

        let mut in_degree = self.in_degree.clone();
        let mut current: Vec<usize> = (0..total).filter(|&i| in_degree[i] == 0).collect();
        let mut layers = Vec::new();
        let mut scheduled = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for &succ in &self.successors[node] {
                    in_degree[succ] -= 1;
                    if in_degree[succ] == 0 {
                        next.push(succ);
                    }
                }
            }
            next.sort_unstable();
            scheduled += current.len();
            tracing::debug!(layer = layers.len(), width = current.len(), "layer scheduled");
            layers.push(std::mem::replace(&mut current, next));
        }

        if scheduled < total {
            return Err(GraphError::Cycle { scheduled, total });
        }
        Ok(ExecutionPlan { layers })
    }
}

/// Node indices grouped into dependency layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    layers: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    /// Builds the plan for `nodes` in one step.
    pub fn for_nodes(nodes: &[Node]) -> Result<Self, GraphError> {
        DependencyGraph::build(nodes)?.layers()
    }

    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total number of scheduled nodes.
    pub fn num_nodes(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Widest layer, i.e. the most nodes that can run at once.
    pub fn max_width(&self) -> usize {
        self.layers.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Layer index of `node`, if scheduled.
    pub fn layer_of(&self, node: usize) -> Option<usize> {
        self.layers.iter().position(|layer| layer.contains(&node))
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.layers.iter().map(Vec::as_slice)
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExecutionPlan ({} layers, {} nodes):", self.num_layers(), self.num_nodes())?;
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  layer {i}: {layer:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Activation, ActivationNode, BinaryNode};

    fn relu(x: &str, y: &str) -> Node {
        Node::Activation(ActivationNode::new(Activation::Relu, x, y))
    }

    fn add(a: &str, b: &str, c: &str) -> Node {
        Node::Add(BinaryNode::new(a, b, c))
    }

    #[test]
    fn test_diamond_layers() {
        // in -> r0 -> {r1, r2} -> add
        let nodes = vec![add("t1", "t2", "out"), relu("in", "t0"), relu("t0", "t1"), relu("t0", "t2")];
        let plan = ExecutionPlan::for_nodes(&nodes).unwrap();
        assert_eq!(plan.layers(), &[vec![1], vec![2, 3], vec![0]]);
        assert_eq!(plan.max_width(), 2);
        assert_eq!(plan.layer_of(0), Some(2));
    }

    #[test]
    fn test_independent_nodes_share_layer() {
        let nodes = vec![relu("a", "x"), relu("b", "y"), relu("c", "z")];
        let plan = ExecutionPlan::for_nodes(&nodes).unwrap();
        assert_eq!(plan.num_layers(), 1);
        assert_eq!(plan.num_nodes(), 3);
    }

    #[test]
    fn test_cycle_detected() {
        let nodes = vec![relu("in", "a"), add("a", "c", "b"), relu("b", "c")];
        let err = ExecutionPlan::for_nodes(&nodes).unwrap_err();
        assert_eq!(err, GraphError::Cycle { scheduled: 1, total: 3 });
    }

    #[test]
    fn test_self_loop_adds_no_edge() {
        let nodes = vec![add("x", "acc", "acc")];
        let graph = DependencyGraph::build(&nodes).unwrap();
        assert_eq!(graph.edges().count(), 0);
        assert_eq!(graph.layers().unwrap().num_layers(), 1);
    }

    #[test]
    fn test_parallel_edges_collapse() {
        let nodes = vec![relu("in", "t"), add("t", "t", "u")];
        let graph = DependencyGraph::build(&nodes).unwrap();
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(graph.layers().unwrap().layers(), &[vec![0], vec![1]]);
    }

    #[test]
    fn test_duplicate_producer_rejected() {
        let nodes = vec![relu("a", "t"), relu("b", "t")];
        assert_eq!(
            DependencyGraph::build(&nodes).unwrap_err(),
            GraphError::DuplicateProducer {
                output: "t".into(),
                first: 0,
                second: 1
            }
        );
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(ExecutionPlan::for_nodes(&[]).unwrap_err(), GraphError::EmptyGraph);
    }

    #[test]
    fn test_display() {
        let plan = ExecutionPlan::for_nodes(&[relu("a", "b"), relu("b", "c")]).unwrap();
        let text = plan.to_string();
        assert!(text.contains("2 layers"));
        assert!(text.contains("layer 1: [1]"));
    }
}
