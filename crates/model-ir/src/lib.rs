// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The operator graph the runtime executes:
//!
//! - [`Node`] — a closed set of operator variants sharing one forward
//!   contract (look up inputs, dispatch on element type, bind or
//!   allocate outputs, compute).
//! - [`SymbolTable`] — the name → tensor mapping nodes read and write.
//! - [`DependencyGraph`] / [`ExecutionPlan`] — producer/consumer edges
//!   derived from tensor names and their Kahn layering.
//!
//! Nodes derive `serde` so an external loader can build them from JSON;
//! no loader lives here.
//!
//! # Example
//! ```
//! use model_ir::{ExecutionPlan, ForwardOptions, Node, SymbolTable};
//! use model_ir::node::{Activation, ActivationNode};
//! use tensor_core::Tensor;
//!
//! let nodes = vec![Node::Activation(ActivationNode::new(Activation::Relu, "x", "y"))];
//! let plan = ExecutionPlan::for_nodes(&nodes).unwrap();
//!
//! let mut table = SymbolTable::new();
//! table.insert("x", Tensor::from_vec([3], vec![-1.0f32, 0.0, 2.0]).unwrap());
//! for layer in plan.iter() {
//!     for &i in layer {
//!         nodes[i].forward(&mut table, &ForwardOptions::default()).unwrap();
//!     }
//! }
//! assert_eq!(table.get("y").unwrap().downcast::<f32>().unwrap().as_slice(), &[0.0, 0.0, 2.0]);
//! ```

mod error;
pub mod graph;
pub mod node;
mod table;

pub use error::{GraphError, NodeError};
pub use graph::{DependencyGraph, ExecutionPlan};
pub use node::{ForwardOptions, Node};
pub use table::SymbolTable;
