// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Building datasets from a user callable.
//!
//! A [`Generator`] declares a schema (field name → [`TensorSpec`]) and maps
//! one input to a set of arrays. [`generate`] returns immediately with one
//! lazy tensor per declared field; the callable runs once per input the
//! first time any field is materialised:
//!
//! ```text
//! inputs ──► call(0) call(1) ... call(n-1)   (rayon pool, in input order)
//!              │       │            │
//!              ▼       ▼            ▼
//!           check each output against its TensorSpec
//!              │
//!              ▼
//!           concatenate per field ──► memoised arrays ──► row reads
//! ```

use crate::error::GENERATOR_ORIGIN;
use crate::{Dataset, DatasetError, HubConfig};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tensor_core::{Array, Block, Dim, Layout, RowSource, Shape, Tensor, TensorError, TensorSpec};

/// Ordered field declarations of a generator.
pub type Schema = Vec<(String, TensorSpec)>;

/// The arrays produced by one generator call, keyed by field name.
pub type FieldMap = HashMap<String, Array>;

/// Failure reported by a generator call.
pub type GeneratorError = Box<dyn std::error::Error + Send + Sync>;

/// A user callable that turns one input into rows of several fields.
///
/// # Example
/// ```
/// use hub::{generate, FieldMap, Generator, GeneratorError, Schema};
/// use tensor_core::{Array, DType, TensorSpec};
///
/// struct Squares;
///
/// impl Generator for Squares {
///     type Input = i64;
///
///     fn meta(&self) -> Schema {
///         vec![("sq".into(), TensorSpec::new(&[1], DType::Int64).unwrap())]
///     }
///
///     fn call(&self, x: &i64) -> Result<FieldMap, GeneratorError> {
///         Ok(FieldMap::from([("sq".into(), Array::vector(vec![x * x]))]))
///     }
/// }
///
/// let ds = generate(Squares, vec![1, 2, 3]).unwrap();
/// let sq = ds.tensor("sq").unwrap().compute().unwrap();
/// assert_eq!(sq.to_vec::<i64>().unwrap(), vec![1, 4, 9]);
/// ```
pub trait Generator: Send + Sync {
    /// One unit of work.
    type Input: Send + Sync;

    /// Field names, in order, with per-call shape templates and dtypes.
    /// A `-1` leading dimension means a call may emit any number of rows.
    fn meta(&self) -> Schema;

    /// Produces every declared field for one input.
    fn call(&self, input: &Self::Input) -> Result<FieldMap, GeneratorError>;
}

/// Builds a lazy dataset from `generator` applied to every input, with the
/// default configuration.
pub fn generate<G>(generator: G, inputs: Vec<G::Input>) -> Result<Dataset, DatasetError>
where
    G: Generator + 'static,
    G::Input: 'static,
{
    generate_with(generator, inputs, &HubConfig::default())
}

/// Builds a lazy dataset from `generator` applied to every input.
///
/// Each output tensor's leading dimension is `k * inputs.len()` when the
/// template's leading dimension is a fixed `k`, otherwise unknown. Other
/// template dimensions are kept as declared.
pub fn generate_with<G>(
    generator: G,
    inputs: Vec<G::Input>,
    config: &HubConfig,
) -> Result<Dataset, DatasetError>
where
    G: Generator + 'static,
    G::Input: 'static,
{
    config.validate()?;
    let schema = generator.meta();
    if let Some((name, _)) = schema.iter().find(|(_, spec)| spec.shape.rank() == 0) {
        return Err(DatasetError::Shape(format!(
            "field '{name}' is declared as a scalar; generated fields need a leading dimension"
        )));
    }

    let num_inputs = inputs.len();
    let output: Arc<dyn Output> = Arc::new(Generation {
        generator,
        inputs,
        schema: schema.clone(),
        parallel: config.parallel_generate,
        threads: config.num_threads,
        arrays: OnceLock::new(),
    });

    let fields = schema
        .into_iter()
        .enumerate()
        .map(|(index, (name, spec))| {
            let source = GeneratedField {
                output: Arc::clone(&output),
                index,
                name: name.clone(),
            };
            let tensor = Tensor::deferred(
                generated_shape(&spec, num_inputs),
                spec.dtype,
                Layout::Dense,
                Arc::new(source),
            )?;
            Ok((name, tensor))
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    Dataset::from_tensors(fields)
}

// ── Memoised generation ────────────────────────────────────────

/// Type-erased access to the memoised output of one generation.
trait Output: Send + Sync + fmt::Debug {
    fn field(&self, index: usize) -> Result<&Array, TensorError>;
}

struct Generation<G: Generator> {
    generator: G,
    inputs: Vec<G::Input>,
    schema: Schema,
    parallel: bool,
    /// Dedicated pool size; `None` runs on the global rayon pool.
    threads: Option<usize>,
    arrays: OnceLock<Result<Vec<Array>, TensorError>>,
}

impl<G: Generator> Generation<G> {
    fn run(&self) -> Result<Vec<Array>, TensorError> {
        let start = Instant::now();
        let calls = if self.parallel && self.inputs.len() > 1 {
            match self.threads {
                Some(threads) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()
                        .map_err(|e| TensorError::Source {
                            origin: GENERATOR_ORIGIN.into(),
                            detail: format!("cannot start worker pool: {e}"),
                        })?;
                    pool.install(|| self.call_parallel())?
                }
                None => self.call_parallel()?,
            }
        } else {
            self.inputs
                .iter()
                .enumerate()
                .map(|(i, input)| self.call_one(i, input))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut per_field: Vec<Vec<Array>> = (0..self.schema.len())
            .map(|_| Vec::with_capacity(calls.len()))
            .collect();
        for call in calls {
            for (parts, array) in per_field.iter_mut().zip(call) {
                parts.push(array);
            }
        }

        let arrays = per_field
            .into_iter()
            .zip(&self.schema)
            .map(|(parts, (_, spec))| {
                if parts.is_empty() {
                    let mut dims: Vec<usize> = spec
                        .shape
                        .dims()
                        .iter()
                        .map(|d| d.fixed().unwrap_or(0))
                        .collect();
                    dims[0] = 0;
                    Ok(Array::zeros(&dims, spec.dtype))
                } else {
                    Array::concat_rows(&parts)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "generated {} rows x {} fields from {} inputs in {:.2?}",
            arrays.first().and_then(Array::leading_dim).unwrap_or(0),
            arrays.len(),
            self.inputs.len(),
            start.elapsed(),
        );
        Ok(arrays)
    }

    fn call_parallel(&self) -> Result<Vec<Vec<Array>>, TensorError> {
        self.inputs
            .par_iter()
            .enumerate()
            .map(|(i, input)| self.call_one(i, input))
            .collect()
    }

    /// Runs the callable on input `i` and checks its output, returning the
    /// arrays in schema order.
    fn call_one(&self, i: usize, input: &G::Input) -> Result<Vec<Array>, TensorError> {
        let mut out = self
            .generator
            .call(input)
            .map_err(|e| TensorError::Source {
                origin: GENERATOR_ORIGIN.into(),
                detail: format!("input {i}: {e}"),
            })?;

        let mut arrays = Vec::with_capacity(self.schema.len());
        let mut rows: Option<usize> = None;
        for (name, spec) in &self.schema {
            let array = out.remove(name).ok_or_else(|| TensorError::MissingField {
                field: name.clone(),
                input: i,
            })?;
            spec.check(name, &array)?;
            let n = array.leading_dim().unwrap_or(0);
            match rows {
                Some(expected) if expected != n => {
                    return Err(TensorError::LengthMismatch {
                        name: name.clone(),
                        expected,
                        actual: n,
                    });
                }
                _ => rows = Some(n),
            }
            arrays.push(array);
        }
        if !out.is_empty() {
            tracing::debug!(input = i, extra = out.len(), "ignoring undeclared generator fields");
        }
        Ok(arrays)
    }
}

impl<G: Generator> Output for Generation<G> {
    fn field(&self, index: usize) -> Result<&Array, TensorError> {
        match self.arrays.get_or_init(|| self.run()) {
            Ok(arrays) => arrays
                .get(index)
                .ok_or_else(|| TensorError::shape(format!("no generated field {index}"))),
            Err(e) => Err(e.clone()),
        }
    }
}

impl<G: Generator> fmt::Debug for Generation<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation")
            .field("inputs", &self.inputs.len())
            .field("fields", &self.schema.len())
            .field("done", &self.arrays.get().is_some())
            .finish()
    }
}

/// Row source for one generated field.
#[derive(Debug)]
struct GeneratedField {
    output: Arc<dyn Output>,
    index: usize,
    name: String,
}

impl RowSource for GeneratedField {
    fn num_rows(&self) -> Result<usize, TensorError> {
        let array = self.output.field(self.index)?;
        array
            .leading_dim()
            .ok_or_else(|| TensorError::shape(format!("generated field '{}' is a scalar", self.name)))
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError> {
        let array = self.output.field(self.index)?;
        if rows.start == 0 && Some(rows.end) == array.leading_dim() {
            return Ok(Block::Dense(array.clone()));
        }
        array.rows(rows).map(Block::Dense)
    }
}

/// Shape of a generated field with the leading dimension replaced, for
/// callers that need to predict it without building a dataset.
pub fn generated_shape(spec: &TensorSpec, num_inputs: usize) -> Shape {
    let leading = match spec.shape.dim(0) {
        Some(Dim::Fixed(k)) => Dim::Fixed(k * num_inputs),
        _ => Dim::Unknown,
    };
    spec.shape.with_leading(leading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tensor_core::DType;

    /// Emits `n` rows for input `n`: `arr[x] = [x, x+1, .., x+4]`, `rra[x] = x`.
    struct UnknownCount {
        calls: Arc<AtomicUsize>,
    }

    impl Generator for UnknownCount {
        type Input = usize;

        fn meta(&self) -> Schema {
            vec![
                ("arr".into(), TensorSpec::new(&[-1, 5], DType::Int32).unwrap()),
                ("rra".into(), TensorSpec::new(&[-1], DType::Int32).unwrap()),
            ]
        }

        fn call(&self, &n: &usize) -> Result<FieldMap, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let arr: Vec<i32> = (0..n as i32)
                .flat_map(|x| (0..5).map(move |i| x + i))
                .collect();
            let rra: Vec<i32> = (0..n as i32).collect();
            Ok(FieldMap::from([
                ("arr".into(), Array::from_vec(&[n, 5], arr)?),
                ("rra".into(), Array::vector(rra)),
            ]))
        }
    }

    fn unknown_count(inputs: Vec<usize>) -> (Dataset, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let ds = generate(
            UnknownCount {
                calls: Arc::clone(&calls),
            },
            inputs,
        )
        .unwrap();
        (ds, calls)
    }

    #[test]
    fn test_generate_is_lazy_and_runs_once() {
        let (ds, calls) = unknown_count((1..=10).collect());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ds.tensor("arr").unwrap().shape().to_signed(), vec![-1, 5]);
        assert_eq!(ds.tensor("rra").unwrap().shape().to_signed(), vec![-1]);

        assert_eq!(ds.len().unwrap(), 55);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        ds.tensor("rra").unwrap().compute().unwrap();
        ds.tensor("arr").unwrap().get(5).unwrap().compute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_unknown_count_values() {
        let (ds, _) = unknown_count((1..=10).collect());
        let rra = ds.tensor("rra").unwrap();
        let head = rra.slice(tensor_core::s![..10]).unwrap().compute().unwrap();
        assert_eq!(head.to_vec::<i32>().unwrap(), vec![0, 0, 1, 0, 1, 2, 0, 1, 2, 3]);
        assert_eq!(rra.get(9).unwrap().compute().unwrap().item::<i32>().unwrap(), 3);
        let arr5 = ds.tensor("arr").unwrap().get(5).unwrap().compute().unwrap();
        assert_eq!(arr5.to_vec::<i32>().unwrap(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = HubConfig {
            parallel_generate: false,
            ..Default::default()
        };
        let seq = generate_with(UnknownCount { calls }, (1..=6).collect(), &config).unwrap();
        let (par, _) = unknown_count((1..=6).collect());
        for key in ["arr", "rra"] {
            assert_eq!(
                seq.tensor(key).unwrap().compute().unwrap(),
                par.tensor(key).unwrap().compute().unwrap()
            );
        }
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = HubConfig {
            num_threads: Some(2),
            ..Default::default()
        };
        let pooled = generate_with(
            UnknownCount {
                calls: Arc::clone(&calls),
            },
            (1..=8).collect(),
            &config,
        )
        .unwrap();
        let (global, _) = unknown_count((1..=8).collect());
        assert_eq!(
            pooled.tensor("rra").unwrap().compute().unwrap(),
            global.tensor("rra").unwrap().compute().unwrap()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_zero_inputs() {
        let (ds, calls) = unknown_count(vec![]);
        assert_eq!(ds.len().unwrap(), 0);
        assert_eq!(ds.tensor("arr").unwrap().compute().unwrap().dims(), &[0, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct Fixed;

    impl Generator for Fixed {
        type Input = i32;

        fn meta(&self) -> Schema {
            vec![("pair".into(), TensorSpec::new(&[2, 3], DType::Int32).unwrap())]
        }

        fn call(&self, &x: &i32) -> Result<FieldMap, GeneratorError> {
            Ok(FieldMap::from([(
                "pair".into(),
                Array::from_vec(&[2, 3], vec![x; 6])?,
            )]))
        }
    }

    #[test]
    fn test_fixed_leading_dim_scales_with_inputs() {
        let ds = generate(Fixed, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(ds.tensor("pair").unwrap().shape().to_signed(), vec![8, 3]);
        assert_eq!(
            generated_shape(&Fixed.meta()[0].1, 4).to_signed(),
            vec![8, 3]
        );
        let row = ds.tensor("pair").unwrap().get(7).unwrap().compute().unwrap();
        assert_eq!(row.to_vec::<i32>().unwrap(), vec![4, 4, 4]);
    }

    /// Misbehaves on a chosen input.
    struct Faulty {
        mode: &'static str,
    }

    impl Generator for Faulty {
        type Input = usize;

        fn meta(&self) -> Schema {
            vec![
                ("a".into(), TensorSpec::new(&[-1, 2], DType::Float32).unwrap()),
                ("b".into(), TensorSpec::new(&[-1], DType::Float32).unwrap()),
            ]
        }

        fn call(&self, &i: &usize) -> Result<FieldMap, GeneratorError> {
            let a = Array::zeros(&[1, 2], DType::Float32);
            let b = Array::zeros(&[1], DType::Float32);
            if i != 2 {
                return Ok(FieldMap::from([("a".into(), a), ("b".into(), b)]));
            }
            match self.mode {
                "missing" => Ok(FieldMap::from([("a".into(), a)])),
                "shape" => Ok(FieldMap::from([
                    ("a".into(), Array::zeros(&[1, 3], DType::Float32)),
                    ("b".into(), b),
                ])),
                "rows" => Ok(FieldMap::from([
                    ("a".into(), a),
                    ("b".into(), Array::zeros(&[2], DType::Float32)),
                ])),
                _ => Err("sensor offline".into()),
            }
        }
    }

    #[test]
    fn test_errors_surface_at_materialisation() {
        for mode in ["missing", "shape", "rows", "fail"] {
            let ds = generate(Faulty { mode }, (0..4).collect()).unwrap();
            let err = ds.len().unwrap_err();
            let expected = match mode {
                "missing" => matches!(err, DatasetError::Schema(_)),
                "shape" => matches!(err, DatasetError::Shape(_)),
                "rows" => matches!(err, DatasetError::LengthMismatch { .. }),
                _ => matches!(err, DatasetError::Generator(ref d) if d.contains("sensor offline")),
            };
            assert!(expected, "mode {mode}: {err:?}");
        }
    }

    #[test]
    fn test_scalar_schema_rejected() {
        struct Scalar;
        impl Generator for Scalar {
            type Input = ();
            fn meta(&self) -> Schema {
                vec![("s".into(), TensorSpec::new(&[], DType::Int32).unwrap())]
            }
            fn call(&self, _: &()) -> Result<FieldMap, GeneratorError> {
                Ok(FieldMap::new())
            }
        }
        assert!(matches!(generate(Scalar, vec![()]), Err(DatasetError::Shape(_))));
    }
}
