// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: run a LeNet-style classifier on a random image.
//!
//! Builds the graph in code with random weights, prints its layering,
//! then runs it once per execution mode and reports the predicted class.
//!
//! ```bash
//! cargo run -p runtime --example lenet_like
//! cargo run -p runtime --example lenet_like -- runtime.toml
//! RUST_LOG=debug cargo run -p runtime --example lenet_like
//! ```

use anyhow::{anyhow, Context};
use model_ir::node::{
    Activation, ActivationNode, ConvNode, FlattenNode, GemmNode, MaxPoolNode, SoftmaxNode,
};
use model_ir::{Node, SymbolTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use runtime::{ExecutionMode, Model, RuntimeConfig};
use std::path::Path;
use std::time::Instant;
use tensor_core::ops::{arg_max, PoolConfig};
use tensor_core::Tensor;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading {path}"))?,
        None => RuntimeConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(2025);
    let (nodes, table) = lenet(&mut rng)?;
    let image = Tensor::<f32>::random_uniform([1, 1, 28, 28], 0.0, 1.0, &mut rng)?;

    for execution in [ExecutionMode::Sequential, ExecutionMode::LayeredParallel] {
        let config = RuntimeConfig {
            execution,
            ..base.clone()
        };
        let model = Model::with_config(
            nodes.clone(),
            table.clone(),
            vec!["image".into()],
            vec!["probs".into()],
            config,
        )?;
        if execution == ExecutionMode::Sequential {
            println!("{}", model.plan()?);
        }

        let start = Instant::now();
        let outputs = model.infer(SymbolTable::from_iter([("image", image.clone())]))?;
        let elapsed = start.elapsed();

        let probs = outputs
            .get("probs")
            .and_then(|v| v.downcast::<f32>())
            .ok_or_else(|| anyhow!("model produced no f32 'probs'"))?;
        let class = arg_max(probs)?;
        println!(
            "{execution:?}: class {class} (p = {:.4}) in {elapsed:?}",
            probs.as_slice()[class],
        );
    }
    Ok(())
}

fn lenet(rng: &mut StdRng) -> anyhow::Result<(Vec<Node>, SymbolTable)> {
    let pool = |x: &str, y: &str| {
        let config = PoolConfig {
            strides: vec![2, 2],
            ..PoolConfig::new(vec![2, 2])
        };
        Node::MaxPool(MaxPoolNode::new(x, y, vec![2, 2]).with_config(config))
    };
    let relu = |x: &str, y: &str| Node::Activation(ActivationNode::new(Activation::Relu, x, y));

    let nodes = vec![
        Node::Conv(ConvNode::new("image", "conv1.w", "conv1").with_bias("conv1.b").with_pads(vec![2, 2, 2, 2])),
        relu("conv1", "conv1.relu"),
        pool("conv1.relu", "pool1"),
        Node::Conv(ConvNode::new("pool1", "conv2.w", "conv2").with_bias("conv2.b")),
        relu("conv2", "conv2.relu"),
        pool("conv2.relu", "pool2"),
        Node::Flatten(FlattenNode::new("pool2", "flat")),
        Node::Gemm(GemmNode::new("flat", "fc1.w", "fc1").with_c("fc1.b")),
        relu("fc1", "fc1.relu"),
        Node::Gemm(GemmNode::new("fc1.relu", "fc2.w", "fc2").with_c("fc2.b")),
        relu("fc2", "fc2.relu"),
        Node::Gemm(GemmNode::new("fc2.relu", "fc3.w", "logits").with_c("fc3.b")),
        Node::Softmax(SoftmaxNode::new("logits", "probs")),
    ];

    let shapes: [(&str, &[usize]); 10] = [
        ("conv1.w", &[6, 1, 5, 5]),
        ("conv1.b", &[6]),
        ("conv2.w", &[16, 6, 5, 5]),
        ("conv2.b", &[16]),
        ("fc1.w", &[400, 120]),
        ("fc1.b", &[120]),
        ("fc2.w", &[120, 84]),
        ("fc2.b", &[84]),
        ("fc3.w", &[84, 10]),
        ("fc3.b", &[10]),
    ];
    let mut table = SymbolTable::new();
    for (name, dims) in shapes {
        table.insert(name, Tensor::<f32>::random_uniform(dims, -0.1, 0.1, rng)?);
    }
    Ok((nodes, table))
}
