// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for GEMM loop orders and broadcasting arithmetic.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;
use tensor_core::{gemm, ops, GemmAlgorithm, MatrixRef, Tensor};

fn bench_gemm(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("gemm");

    for &n in &[32usize, 128, 256] {
        let a = Tensor::<f32>::random_uniform([n, n], -1.0, 1.0, &mut rng).unwrap();
        let b = Tensor::<f32>::random_uniform([n, n], -1.0, 1.0, &mut rng).unwrap();
        let mut out = vec![0.0f32; n * n];
        group.throughput(Throughput::Elements((2 * n * n * n) as u64));

        for &algorithm in GemmAlgorithm::ALL {
            group.bench_with_input(BenchmarkId::new(algorithm.as_str(), n), &n, |bench, &n| {
                bench.iter(|| {
                    let lhs = MatrixRef::new(a.as_slice(), n, n).unwrap();
                    let rhs = MatrixRef::new(b.as_slice(), n, n).unwrap();
                    gemm(algorithm, 1.0, lhs, rhs, 0.0, black_box(&mut out), n).unwrap();
                })
            });
        }
    }
    group.finish();
}

fn bench_broadcast_add(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let mut group = c.benchmark_group("broadcast_add");

    let x = Tensor::<f32>::random_uniform([64, 256], -1.0, 1.0, &mut rng).unwrap();
    let same = Tensor::<f32>::random_uniform([64, 256], -1.0, 1.0, &mut rng).unwrap();
    let row = Tensor::<f32>::random_uniform([256], -1.0, 1.0, &mut rng).unwrap();
    let col = Tensor::<f32>::random_uniform([64, 1], -1.0, 1.0, &mut rng).unwrap();
    let mut out = Tensor::<f32>::zeros([64, 256]).unwrap();

    for (name, rhs) in [("same_shape", &same), ("row", &row), ("column", &col)] {
        group.bench_function(name, |bench| {
            bench.iter(|| ops::add(black_box(&x), black_box(rhs), &mut out).unwrap())
        });
    }
    group.finish();
}

fn bench_softmax(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(13);
    let x = Tensor::<f32>::random_uniform([32, 1000], -5.0, 5.0, &mut rng).unwrap();
    let mut out = Tensor::<f32>::zeros([32, 1000]).unwrap();
    c.bench_function("softmax_32x1000", |bench| {
        bench.iter(|| ops::softmax(black_box(&x), -1, &mut out).unwrap())
    });
}

criterion_group!(benches, bench_gemm, bench_broadcast_add, bench_softmax);
criterion_main!(benches);
