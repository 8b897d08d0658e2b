// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: generate a dataset whose row count is only known after the
//! generator has run, store it, and read parts of it back.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p hub --example unknown_count -- /tmp/unknown_count
//! ```

use hub::{generate, Dataset, FieldMap, Generator, GeneratorError, Schema};
use tensor_core::{s, Array, DType, TensorSpec};
use tracing_subscriber::EnvFilter;

/// Emits `n` rows for input `n`.
struct UnknownCount;

impl Generator for UnknownCount {
    type Input = usize;

    fn meta(&self) -> Schema {
        vec![
            ("arr".into(), TensorSpec::new(&[-1, 5], DType::Int32).unwrap()),
            ("rra".into(), TensorSpec::new(&[-1], DType::Int32).unwrap()),
        ]
    }

    fn call(&self, &n: &usize) -> Result<FieldMap, GeneratorError> {
        let arr: Vec<i32> = (0..n as i32).flat_map(|x| x..x + 5).collect();
        Ok(FieldMap::from([
            ("arr".into(), Array::from_vec(&[n, 5], arr)?),
            ("rra".into(), Array::vector((0..n as i32).collect())),
        ]))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let location = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mem://demo/unknown_count".to_string());

    let ds = generate(UnknownCount, (1..=10).collect())?;
    for (name, tensor) in ds.tensors() {
        println!("{name:<6} declared {}", tensor.shape());
    }

    let stored = ds.store(&location)?;
    println!("\nstored {} rows at {location}", stored.len()?);
    for (name, tensor) in stored.tensors() {
        println!("{name:<6} resolved {}", tensor.shape());
    }

    let loaded = Dataset::load(&location)?;
    let rra = loaded.tensor("rra")?;
    println!("\nrra[:10] = {:?}", rra.slice(s![..10])?.compute()?.to_vec::<i32>()?);
    println!("rra[9]   = {}", rra.get(9)?.compute()?.item::<i32>()?);
    println!(
        "arr[5]   = {:?}",
        loaded.tensor("arr")?.get(5)?.compute()?.to_vec::<i32>()?
    );
    Ok(())
}
