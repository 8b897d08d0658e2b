// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for view composition and materialisation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tensor_core::{s, Array, Tensor};

fn grid(rows: usize, cols: usize) -> Tensor {
    let values: Vec<f32> = (0..rows * cols).map(|v| v as f32).collect();
    Tensor::from_array(Array::from_vec(&[rows, cols], values).unwrap())
}

fn bench_slice_compute(c: &mut Criterion) {
    let t = grid(1024, 256);
    c.bench_function("slice_compute_block_512x128", |b| {
        b.iter(|| {
            let v = t.slice(s![256..768, 64..192]).unwrap();
            black_box(v.compute().unwrap())
        })
    });
}

fn bench_nested_views(c: &mut Criterion) {
    let t = grid(1024, 256);
    c.bench_function("nested_views_compute", |b| {
        b.iter(|| {
            let v = t
                .slice(s![100..900])
                .unwrap()
                .slice(s![50..600])
                .unwrap()
                .get(10)
                .unwrap();
            black_box(v.compute().unwrap())
        })
    });
}

fn bench_concat_read(c: &mut Criterion) {
    let parts: Vec<Tensor> = (0..16).map(|_| grid(256, 64)).collect();
    let t = Tensor::concat(&parts).unwrap();
    c.bench_function("concat_16_parts_compute", |b| {
        b.iter(|| black_box(t.compute().unwrap()))
    });
}

criterion_group!(benches, bench_slice_compute, bench_nested_views, bench_concat_read);
criterion_main!(benches);
