// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end inference pipeline.
//!
//! These tests exercise the complete flow from node construction →
//! scheduling → layered execution → output collection, across all three
//! crates, in both execution modes.

use model_ir::node::{
    Activation, ActivationNode, BinaryNode, ConstantNode, ConvNode, FlattenNode, GemmNode,
    MaxPoolNode, ReshapeNode, SoftmaxNode,
};
use model_ir::{DependencyGraph, GraphError, Node, NodeError, SymbolTable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use runtime::{ExecutionMode, Failure, Model, RunState, RuntimeConfig, RuntimeError};
use tensor_core::ops::PoolConfig;
use tensor_core::{GemmAlgorithm, Tensor, TensorError, TensorValue};

// ── Helpers ────────────────────────────────────────────────────

fn config(execution: ExecutionMode) -> RuntimeConfig {
    RuntimeConfig {
        execution,
        num_threads: Some(4),
        ..Default::default()
    }
}

fn uniform(rng: &mut StdRng, dims: &[usize], bound: f32) -> TensorValue {
    Tensor::<f32>::random_uniform(dims, -bound, bound, rng).unwrap().into()
}

fn relu(x: &str, y: &str) -> Node {
    Node::Activation(ActivationNode::new(Activation::Relu, x, y))
}

fn max_pool_2x2(x: &str, y: &str) -> Node {
    let config = PoolConfig {
        strides: vec![2, 2],
        ..PoolConfig::new(vec![2, 2])
    };
    Node::MaxPool(MaxPoolNode::new(x, y, vec![2, 2]).with_config(config))
}

fn f32_values<'a>(table: &'a SymbolTable, name: &str) -> &'a Tensor<f32> {
    table
        .get(name)
        .unwrap_or_else(|| panic!("missing '{name}'"))
        .downcast::<f32>()
        .unwrap_or_else(|| panic!("'{name}' is not f32"))
}

fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= tol, "element {i}: {a} vs {e}");
    }
}

/// A LeNet-style classifier over a 1×1×28×28 image, with a gated
/// first dense layer and two heads so some layers hold several nodes.
fn lenet_like(seed: u64, config: RuntimeConfig) -> Model {
    let mut rng = StdRng::seed_from_u64(seed);
    let nodes = vec![
        Node::Conv(ConvNode::new("image", "conv1.w", "conv1").with_bias("conv1.b").with_pads(vec![2, 2, 2, 2])),
        relu("conv1", "conv1.relu"),
        max_pool_2x2("conv1.relu", "pool1"),
        Node::Conv(ConvNode::new("pool1", "conv2.w", "conv2").with_bias("conv2.b")),
        relu("conv2", "conv2.relu"),
        max_pool_2x2("conv2.relu", "pool2"),
        Node::Flatten(FlattenNode::new("pool2", "flat")),
        Node::Gemm(GemmNode::new("flat", "fc1.w", "fc1").with_c("fc1.b")),
        Node::Gemm(GemmNode::new("flat", "gate.w", "gate").with_c("gate.b")),
        Node::Activation(ActivationNode::new(Activation::Sigmoid, "gate", "gate.sigmoid")),
        Node::Mul(BinaryNode::new("fc1", "gate.sigmoid", "gated")),
        relu("gated", "hidden"),
        Node::Gemm(GemmNode::new("hidden", "fc2.w", "logits").with_c("fc2.b")),
        Node::Softmax(SoftmaxNode::new("logits", "probs")),
        Node::LogSoftmax(SoftmaxNode::new("logits", "log_probs")),
    ];

    let mut table = SymbolTable::new();
    table.insert("conv1.w", uniform(&mut rng, &[6, 1, 5, 5], 0.3));
    table.insert("conv1.b", uniform(&mut rng, &[6], 0.1));
    table.insert("conv2.w", uniform(&mut rng, &[16, 6, 5, 5], 0.1));
    table.insert("conv2.b", uniform(&mut rng, &[16], 0.1));
    table.insert("fc1.w", uniform(&mut rng, &[400, 120], 0.05));
    table.insert("fc1.b", uniform(&mut rng, &[120], 0.05));
    table.insert("gate.w", uniform(&mut rng, &[400, 120], 0.05));
    table.insert("gate.b", uniform(&mut rng, &[120], 0.05));
    table.insert("fc2.w", uniform(&mut rng, &[120, 10], 0.1));
    table.insert("fc2.b", uniform(&mut rng, &[10], 0.1));

    Model::with_config(
        nodes,
        table,
        vec!["image".into()],
        vec!["probs".into(), "log_probs".into()],
        config,
    )
    .unwrap()
}

fn image(seed: u64) -> SymbolTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels = Tensor::<f32>::random_uniform([1, 1, 28, 28], 0.0, 1.0, &mut rng).unwrap();
    SymbolTable::from_iter([("image", pixels)])
}

/// A random DAG of Add/Relu nodes over `n` tensors, shuffled so node
/// order says nothing about dependency order.
fn random_dag(rng: &mut StdRng, n: usize) -> Vec<Node> {
    let mut nodes: Vec<Node> = (0..n)
        .map(|i| {
            let pick = |rng: &mut StdRng| -> String {
                match rng.gen_range(0..=i) {
                    0 => "x".to_string(),
                    j => format!("t{}", j - 1),
                }
            };
            let output = format!("t{i}");
            if rng.gen_bool(0.5) {
                let (a, b) = (pick(rng), pick(rng));
                Node::Add(BinaryNode::new(a, b, output))
            } else {
                let a = pick(rng);
                relu(&a, &output)
            }
        })
        .collect();
    nodes.shuffle(rng);
    nodes
}

// ── End-to-end ─────────────────────────────────────────────────

#[test]
fn test_lenet_like_end_to_end() {
    let model = lenet_like(7, config(ExecutionMode::LayeredParallel));
    let plan = model.plan().unwrap();
    assert_eq!(plan.num_nodes(), model.nodes().len());
    assert_eq!(plan.max_width(), 2);

    let outputs = model.infer(image(1)).unwrap();
    assert_eq!(outputs.len(), 2);

    let probs = f32_values(&outputs, "probs");
    assert_eq!(probs.dims(), &[1, 10]);
    assert!(probs.as_slice().iter().all(|p| p.is_finite() && *p >= 0.0));
    let total: f32 = probs.as_slice().iter().sum();
    assert!((total - 1.0).abs() < 1e-5, "sum = {total}");

    let log_probs = f32_values(&outputs, "log_probs");
    let from_log: Vec<f32> = log_probs.as_slice().iter().map(|v| v.exp()).collect();
    assert_close(&from_log, probs.as_slice(), 1e-5);

    // Intermediates never leak into the result.
    assert!(outputs.get("pool2").is_none());
}

#[test]
fn test_parallel_matches_sequential() {
    let sequential = lenet_like(11, config(ExecutionMode::Sequential));
    let parallel = lenet_like(11, config(ExecutionMode::LayeredParallel));

    for seed in 0..3 {
        let a = sequential.infer(image(seed)).unwrap();
        let b = parallel.infer(image(seed)).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_concurrent_infer_on_shared_model() {
    let model = lenet_like(3, config(ExecutionMode::LayeredParallel));
    let expected = model.infer(image(5)).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| model.infer(image(5)).unwrap())).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

// ── Operators through the executor ─────────────────────────────

#[test]
fn test_gemm_scenario() {
    let a = Tensor::from_vec([2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
    let b = Tensor::from_vec([2, 2], vec![5.0f32, 6.0, 7.0, 8.0]).unwrap();
    let model = Model::new(
        vec![Node::Gemm(GemmNode::new("A", "B", "Y").with_scalars(1.0, 0.0))],
        SymbolTable::from_iter([("B", b)]),
        vec!["A".into()],
        vec!["Y".into()],
    )
    .unwrap();

    let outputs = model.infer(SymbolTable::from_iter([("A", a)])).unwrap();
    let y = f32_values(&outputs, "Y");
    assert_eq!(y.dims(), &[2, 2]);
    assert_eq!(y.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
}

#[test]
fn test_gemm_algorithms_interchangeable() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut table = SymbolTable::new();
    table.insert("A", uniform(&mut rng, &[13, 17], 1.0));
    table.insert("B", uniform(&mut rng, &[19, 13], 1.0));
    table.insert("C", uniform(&mut rng, &[19], 1.0));

    // Y = 0.7 * A^T @ B^T + 1.3 * C, shape [17, 19].
    let node = Node::Gemm(
        GemmNode::new("A", "B", "Y")
            .with_c("C")
            .with_scalars(0.7, 1.3)
            .with_transpose(true, true),
    );

    let run = |algorithm: GemmAlgorithm| {
        let config = RuntimeConfig {
            gemm: algorithm.as_str().into(),
            ..config(ExecutionMode::Sequential)
        };
        let model = Model::with_config(vec![node.clone()], table.clone(), vec![], vec!["Y".into()], config).unwrap();
        model.infer(SymbolTable::new()).unwrap()
    };

    let reference = run(GemmAlgorithm::InnerProduct);
    let expected = f32_values(&reference, "Y");
    assert_eq!(expected.dims(), &[17, 19]);
    for &algorithm in GemmAlgorithm::ALL {
        let outputs = run(algorithm);
        assert_close(f32_values(&outputs, "Y").as_slice(), expected.as_slice(), 1e-4);
    }
}

#[test]
fn test_broadcast_add_and_incompatible_shapes() {
    let a: Vec<f32> = (0..24).map(|v| v as f32).collect();
    let model = Model::new(
        vec![Node::Add(BinaryNode::new("A", "B", "C"))],
        SymbolTable::new(),
        vec!["A".into(), "B".into()],
        vec!["C".into()],
    )
    .unwrap();

    let inputs = SymbolTable::from_iter([
        ("A", Tensor::from_vec([2, 3, 4], a.clone()).unwrap()),
        ("B", Tensor::from_vec([1, 3, 1], vec![100.0f32, 200.0, 300.0]).unwrap()),
    ]);
    let outputs = model.infer(inputs).unwrap();
    let c = f32_values(&outputs, "C");
    assert_eq!(c.dims(), &[2, 3, 4]);
    for i in 0..2 {
        for j in 0..3 {
            for k in 0..4 {
                let expected = a[i * 12 + j * 4 + k] + 100.0 * (j + 1) as f32;
                assert_eq!(c.at(&[i, j, k]).unwrap(), expected);
            }
        }
    }

    let inputs = SymbolTable::from_iter([
        ("A", Tensor::<f32>::zeros([2, 3]).unwrap()),
        ("B", Tensor::<f32>::zeros([3, 2]).unwrap()),
    ]);
    let err = model.infer(inputs).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Node {
            source: NodeError::Tensor { source: TensorError::ShapeMismatch { .. }, .. },
            ..
        }
    ));
}

#[test]
fn test_integer_arithmetic_wraps() {
    let nodes = vec![
        Node::Sub(BinaryNode::new("zero", "one", "underflow")),
        Node::Constant(ConstantNode::new("max", Tensor::from_vec([1], vec![i32::MAX]).unwrap())),
        Node::Constant(ConstantNode::new("step", Tensor::from_vec([1], vec![1i32]).unwrap())),
        Node::Add(BinaryNode::new("max", "step", "overflow")),
        Node::Mul(BinaryNode::new("max", "max", "square")),
    ];
    for execution in [ExecutionMode::Sequential, ExecutionMode::LayeredParallel] {
        let model = Model::with_config(
            nodes.clone(),
            SymbolTable::new(),
            vec!["zero".into(), "one".into()],
            vec!["underflow".into(), "overflow".into(), "square".into()],
            config(execution),
        )
        .unwrap();
        let inputs = SymbolTable::from_iter([
            ("zero", Tensor::from_vec([1], vec![0u32]).unwrap()),
            ("one", Tensor::from_vec([1], vec![1u32]).unwrap()),
        ]);
        let outputs = model.infer(inputs).unwrap();

        let get_u32 = |name: &str| outputs.get(name).unwrap().downcast::<u32>().unwrap().to_vec();
        let get_i32 = |name: &str| outputs.get(name).unwrap().downcast::<i32>().unwrap().to_vec();
        assert_eq!(get_u32("underflow"), vec![u32::MAX]);
        assert_eq!(get_i32("overflow"), vec![i32::MIN]);
        assert_eq!(get_i32("square"), vec![i32::MAX.wrapping_mul(i32::MAX)]);
    }
}

#[test]
fn test_reshape_round_trip() {
    let data = Tensor::from_vec([6], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    let mut table = SymbolTable::new();
    table.insert("to_matrix", Tensor::from_vec([2], vec![-1i64, 3]).unwrap());
    table.insert("to_vector", Tensor::from_vec([1], vec![6i64]).unwrap());
    let model = Model::new(
        vec![
            Node::Reshape(ReshapeNode::new("data", "to_matrix", "matrix")),
            Node::Reshape(ReshapeNode::new("matrix", "to_vector", "back")),
        ],
        table,
        vec!["data".into()],
        vec!["matrix".into(), "back".into()],
    )
    .unwrap();

    let outputs = model.infer(SymbolTable::from_iter([("data", data.clone())])).unwrap();
    let matrix = outputs.get("matrix").unwrap().downcast::<i32>().unwrap();
    assert_eq!(matrix.dims(), &[2, 3]);
    assert_eq!(outputs.get("back").unwrap().downcast::<i32>().unwrap(), &data);
}

#[test]
fn test_max_pool_indices() {
    let x = Tensor::from_vec([1, 1, 2, 4], vec![1.0f32, 9.0, 3.0, 2.0, 5.0, 4.0, 8.0, 7.0]).unwrap();
    let config = PoolConfig {
        strides: vec![2, 2],
        ..PoolConfig::new(vec![2, 2])
    };
    let model = Model::new(
        vec![Node::MaxPool(
            MaxPoolNode::new("X", "Y", vec![2, 2]).with_config(config).with_indices("I"),
        )],
        SymbolTable::new(),
        vec!["X".into()],
        vec!["Y".into(), "I".into()],
    )
    .unwrap();

    let outputs = model.infer(SymbolTable::from_iter([("X", x.clone())])).unwrap();
    let y = f32_values(&outputs, "Y");
    let indices = outputs.get("I").unwrap().downcast::<i64>().unwrap();
    assert_eq!(y.as_slice(), &[9.0, 8.0]);
    assert_eq!(indices.as_slice(), &[1, 6]);
    for (value, &index) in y.as_slice().iter().zip(indices.as_slice()) {
        assert_eq!(x.get(index as usize).unwrap(), *value);
    }
}

#[test]
fn test_log_softmax_extreme_rows() {
    let rows = vec![
        0.0f32, 0.0, 0.0, 0.0,
        1e30, -1e30, 0.0, 1.0,
        -80.0, -85.0, -90.0, -95.0,
        f32::MAX, f32::MIN_POSITIVE, -f32::MAX, 3.5,
    ];
    let model = Model::new(
        vec![Node::LogSoftmax(SoftmaxNode::new("X", "Y"))],
        SymbolTable::new(),
        vec!["X".into()],
        vec!["Y".into()],
    )
    .unwrap();

    let outputs = model
        .infer(SymbolTable::from_iter([("X", Tensor::from_vec([4, 4], rows).unwrap())]))
        .unwrap();
    let y = f32_values(&outputs, "Y");
    for row in y.as_slice().chunks(4) {
        let total: f32 = row.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5, "row {row:?} sums to {total}");
    }
}

// ── Scheduling ─────────────────────────────────────────────────

#[test]
fn test_cycle_fails_without_output() {
    let model = Model::new(
        vec![relu("x", "y"), relu("a", "b"), relu("b", "a")],
        SymbolTable::new(),
        vec!["x".into()],
        vec!["y".into()],
    )
    .unwrap();

    let inputs = SymbolTable::from_iter([("x", Tensor::from_vec([1], vec![1.0f32]).unwrap())]);
    let err = model.run(inputs).schedule().unwrap_err();
    assert!(matches!(err, RuntimeError::Graph(GraphError::Cycle { scheduled: 1, total: 3 })));
    assert_eq!(err.run_state(), RunState::Failed(Failure::Structural));

    let inputs = SymbolTable::from_iter([("x", Tensor::from_vec([1], vec![1.0f32]).unwrap())]);
    assert!(matches!(model.infer(inputs), Err(RuntimeError::Graph(GraphError::Cycle { .. }))));
}

#[test]
fn test_layering_properties_random_dags() {
    let mut rng = StdRng::seed_from_u64(2025);
    for _ in 0..25 {
        let n = rng.gen_range(1..40);
        let nodes = random_dag(&mut rng, n);
        let graph = DependencyGraph::build(&nodes).unwrap();
        let plan = graph.layers().unwrap();

        // Every node appears in exactly one layer.
        let mut seen = vec![0usize; n];
        for layer in plan.iter() {
            for &i in layer {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
        assert_eq!(plan.num_nodes(), n);

        // Producers strictly precede consumers.
        for (producer, consumer) in graph.edges() {
            assert!(plan.layer_of(producer).unwrap() < plan.layer_of(consumer).unwrap());
        }

        // And the whole thing runs.
        let model = Model::with_config(nodes, SymbolTable::new(), vec!["x".into()], vec![], config(ExecutionMode::LayeredParallel)).unwrap();
        let x = Tensor::from_vec([3], vec![-1.0f32, 0.0, 1.0]).unwrap();
        model.infer(SymbolTable::from_iter([("x", x)])).unwrap();
    }
}

#[test]
fn test_first_failure_in_layer_order() {
    let model = Model::with_config(
        vec![relu("x", "a"), relu("missing.1", "b"), relu("missing.2", "c")],
        SymbolTable::new(),
        vec!["x".into()],
        vec![],
        config(ExecutionMode::LayeredParallel),
    )
    .unwrap();
    let inputs = SymbolTable::from_iter([("x", Tensor::from_vec([1], vec![1.0f32]).unwrap())]);
    match model.infer(inputs).unwrap_err() {
        RuntimeError::Node { index, .. } => assert_eq!(index, 1),
        other => panic!("unexpected error: {other}"),
    }
}

// ── Outputs & configuration ────────────────────────────────────

#[test]
fn test_strict_and_lenient_outputs() {
    let build = |strict_outputs: bool| {
        Model::with_config(
            vec![relu("x", "y")],
            SymbolTable::new(),
            vec!["x".into()],
            vec!["y".into(), "ghost".into()],
            RuntimeConfig {
                strict_outputs,
                ..Default::default()
            },
        )
        .unwrap()
    };
    let inputs = || SymbolTable::from_iter([("x", Tensor::from_vec([2], vec![-1.0f32, 1.0]).unwrap())]);

    let err = build(true).infer(inputs()).unwrap_err();
    assert!(matches!(err, RuntimeError::MissingOutput { ref name } if name == "ghost"));
    assert_eq!(err.run_state(), RunState::Failed(Failure::MissingOutput));

    let outputs = build(false).infer(inputs()).unwrap();
    assert_eq!(outputs.names(), vec!["y"]);
    assert_eq!(f32_values(&outputs, "y").as_slice(), &[0.0, 1.0]);
}

#[test]
fn test_config_file_drives_model() {
    let path = std::env::temp_dir().join(format!("edge-onnx-runtime-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "execution = \"sequential\"\ngemm = \"column-wise\"\nstrict_outputs = false\n",
    )
    .unwrap();
    let config = RuntimeConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.execution, ExecutionMode::Sequential);
    assert_eq!(config.gemm_algorithm().unwrap(), GemmAlgorithm::ColumnWise);

    let model = lenet_like(1, config);
    let outputs = model.infer(image(0)).unwrap();
    assert_eq!(f32_values(&outputs, "probs").dims(), &[1, 10]);
}
