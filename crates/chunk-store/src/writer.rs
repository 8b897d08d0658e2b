// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dataset store.
//!
//! A store writes every chunk under a fresh generation directory and then
//! commits by writing `manifest.json`:
//!
//! ```text
//! <root>/
//!   manifest.json            ← written last; names the live generation
//!   g<id>/<field>/<n>.safetensors
//! ```
//!
//! Readers only follow the manifest, so they see the previous dataset or
//! the new one, never a mix. A commit keeps the generation it replaces
//! (recorded as `retained`) so datasets opened before the store can still
//! read their chunks; the generation before that one is removed. A failed
//! store removes its own generation instead.
//!
//! The committed manifest is re-read just before the commit. Two stores
//! racing on the same location still both commit, last writer wins, and
//! the loser's generation is left behind as unreferenced files.

use crate::manifest::{ChunkEntry, FieldEntry, Manifest, FORMAT_VERSION, MANIFEST_FILE};
use crate::{chunk, StorageBackend, StorageError, WriteReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tensor_core::{Block, Dim, Layout, Shape, Tensor, TensorError};

/// Default target size of one chunk file.
pub const DEFAULT_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Writer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Target chunk size in bytes. A chunk always holds at least one row.
    pub chunk_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Stores named fields and commits them with a new manifest.
///
/// Every field must have the same number of rows. Unknown dimensions are
/// resolved from the data; generated fields are materialised here.
pub fn write_dataset(
    backend: &dyn StorageBackend,
    fields: &[(String, Tensor)],
    options: &StoreOptions,
) -> Result<(Manifest, WriteReport), StorageError> {
    let start = Instant::now();

    let num_rows = match fields.first() {
        Some((_, tensor)) => tensor.len()?,
        None => 0,
    };
    for (name, tensor) in fields {
        let n = tensor.len()?;
        if n != num_rows {
            return Err(TensorError::LengthMismatch {
                name: name.clone(),
                expected: num_rows,
                actual: n,
            }
            .into());
        }
    }

    let data_dir = new_generation_id();
    let mut report = WriteReport {
        location: backend.describe(),
        rows: num_rows,
        fields: fields.len(),
        ..WriteReport::default()
    };

    let manifest = match write_generation(backend, &data_dir, fields, num_rows, options, &mut report)
    {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!("store to {} failed, discarding {data_dir}: {e}", report.location);
            if let Err(cleanup) = backend.delete_prefix(&data_dir) {
                tracing::warn!("could not remove partial generation {data_dir}: {cleanup}");
            }
            return Err(e);
        }
    };

    report.elapsed = start.elapsed();
    tracing::info!("{}", report.summary());
    Ok((manifest, report))
}

// ── Private helpers ────────────────────────────────────────────

fn write_generation(
    backend: &dyn StorageBackend,
    data_dir: &str,
    fields: &[(String, Tensor)],
    num_rows: usize,
    options: &StoreOptions,
    report: &mut WriteReport,
) -> Result<Manifest, StorageError> {
    let mut entries = Vec::with_capacity(fields.len());
    for (index, (name, tensor)) in fields.iter().enumerate() {
        let writer = FieldWriter {
            backend,
            data_dir,
            index,
            name,
            tensor,
            num_rows,
        };
        entries.push(writer.write(options.chunk_bytes, report)?);
    }

    let current = committed_generations(backend);
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        data_dir: data_dir.to_string(),
        retained: current
            .as_ref()
            .map(|(live, _)| live.clone())
            .filter(|live| live != data_dir),
        num_rows,
        fields: entries,
    };
    manifest.validate()?;

    let json = manifest.to_json()?;
    backend.put(MANIFEST_FILE, &json)?;
    report.bytes_written += json.len() as u64;

    if let Some((live, Some(stale))) = current {
        if stale != live && stale != data_dir {
            if let Err(e) = backend.delete_prefix(&stale) {
                tracing::warn!("could not remove stale generation {stale}: {e}");
            }
        }
    }
    Ok(manifest)
}

/// Reads the live and retained generations of the committed manifest, if any.
fn committed_generations(backend: &dyn StorageBackend) -> Option<(String, Option<String>)> {
    match backend.get(MANIFEST_FILE) {
        Ok(blob) => match Manifest::from_json(&blob) {
            Ok(manifest) => Some((manifest.data_dir, manifest.retained)),
            Err(e) => {
                tracing::warn!("ignoring unreadable manifest at {}: {e}", backend.describe());
                None
            }
        },
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            tracing::warn!("could not read existing manifest at {}: {e}", backend.describe());
            None
        }
    }
}

fn new_generation_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "g{nanos:x}-{:x}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

struct FieldWriter<'a> {
    backend: &'a dyn StorageBackend,
    data_dir: &'a str,
    index: usize,
    name: &'a str,
    tensor: &'a Tensor,
    num_rows: usize,
}

impl FieldWriter<'_> {
    fn write(&self, chunk_bytes: usize, report: &mut WriteReport) -> Result<FieldEntry, StorageError> {
        let layout = self.tensor.layout();
        let dtype = self.tensor.dtype();
        let mut observed: Option<Vec<Dim>> = None;
        let mut chunks = Vec::new();

        if self.num_rows > 0 {
            let per_chunk = self.rows_per_chunk(chunk_bytes)?;
            let mut start = 0;
            while start < self.num_rows {
                let end = (start + per_chunk).min(self.num_rows);
                let block = self.tensor.read_rows(start..end)?;
                if block.num_rows() != end - start || block.layout() != layout {
                    return Err(TensorError::shape(format!(
                        "field '{}' produced {} {} rows for range {start}..{end}",
                        self.name,
                        block.num_rows(),
                        block.layout().as_str()
                    ))
                    .into());
                }

                let bytes = match &block {
                    Block::Dense(array) => {
                        self.observe_dense(&mut observed, &array.dims()[1..])?;
                        chunk::encode_dense(array)?
                    }
                    Block::Ragged(rows) => {
                        for row in rows {
                            observe_ragged(&mut observed, row.dims());
                        }
                        chunk::encode_ragged(dtype, rows)?
                    }
                };

                let file = format!("{}/{}/{}.safetensors", self.data_dir, self.index, chunks.len());
                self.backend.put(&file, &bytes)?;
                tracing::debug!(
                    field = self.name,
                    %file,
                    rows = end - start,
                    bytes = bytes.len(),
                    "wrote chunk"
                );
                report.chunks += 1;
                report.bytes_written += bytes.len() as u64;
                chunks.push(ChunkEntry {
                    file,
                    start_row: start,
                    num_rows: end - start,
                });
                start = end;
            }
        }

        let shape = self.resolved_shape(observed)?;
        Ok(FieldEntry {
            name: self.name.to_string(),
            dtype: dtype.as_str().to_string(),
            shape: shape.to_signed(),
            dtag: self.tensor.dtag().map(str::to_owned),
            layout,
            chunks,
        })
    }

    /// Picks a chunk row count from the size of one row.
    fn rows_per_chunk(&self, chunk_bytes: usize) -> Result<usize, StorageError> {
        let esize = self.tensor.dtype().size_bytes();
        let fixed: Option<Vec<usize>> = self.tensor.shape().dims()[1..]
            .iter()
            .map(|d| d.fixed())
            .collect();
        let row_bytes = match fixed {
            Some(dims) => dims.iter().product::<usize>() * esize,
            None => match self.tensor.read_rows(0..1)? {
                Block::Dense(array) => array.row_bytes(),
                Block::Ragged(rows) => rows.first().map_or(0, |r| r.size_bytes()),
            },
        };
        Ok((chunk_bytes / row_bytes.max(1)).max(1))
    }

    fn observe_dense(&self, observed: &mut Option<Vec<Dim>>, dims: &[usize]) -> Result<(), StorageError> {
        let dims: Vec<Dim> = dims.iter().map(|&d| Dim::Fixed(d)).collect();
        match observed {
            None => *observed = Some(dims),
            Some(seen) if *seen != dims => {
                return Err(TensorError::shape(format!(
                    "field '{}' has rows of shape {} and {}",
                    self.name,
                    Shape::new(seen.clone()),
                    Shape::new(dims)
                ))
                .into());
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Builds the stored shape: `num_rows`, then each per-row dimension as
    /// observed in the data. With no rows, unknown dimensions become 0.
    fn resolved_shape(&self, observed: Option<Vec<Dim>>) -> Result<Shape, StorageError> {
        let declared = &self.tensor.shape().dims()[1..];
        let trailing = match observed {
            Some(dims) => dims,
            None => declared
                .iter()
                .map(|d| match d {
                    Dim::Unknown => Dim::Fixed(0),
                    fixed => *fixed,
                })
                .collect(),
        };
        if trailing.len() != declared.len() {
            return Err(TensorError::shape(format!(
                "field '{}' declares rank {} but its rows have rank {}",
                self.name,
                declared.len() + 1,
                trailing.len() + 1
            ))
            .into());
        }
        for (&want, &got) in declared.iter().zip(&trailing) {
            if let (Dim::Fixed(w), Dim::Fixed(g)) = (want, got) {
                if w != g {
                    return Err(TensorError::shape(format!(
                        "field '{}' declares {} but holds rows of {}",
                        self.name,
                        self.tensor.shape(),
                        Shape::new(trailing.clone())
                    ))
                    .into());
                }
            }
        }
        let mut dims = Vec::with_capacity(trailing.len() + 1);
        dims.push(Dim::Fixed(self.num_rows));
        dims.extend(trailing);
        Ok(Shape::new(dims))
    }
}

/// Ragged rows keep a dimension fixed only where every row agrees.
fn observe_ragged(observed: &mut Option<Vec<Dim>>, dims: &[usize]) {
    match observed {
        None => *observed = Some(dims.iter().map(|&d| Dim::Fixed(d)).collect()),
        Some(seen) => {
            for (dim, &n) in seen.iter_mut().zip(dims) {
                if *dim != Dim::Fixed(n) {
                    *dim = Dim::Unknown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::ops::Range;
    use std::sync::Arc;
    use tensor_core::{Array, DType, RowSource};

    #[derive(Debug)]
    struct FailingSource;

    impl RowSource for FailingSource {
        fn num_rows(&self) -> Result<usize, TensorError> {
            Ok(2)
        }

        fn read_rows(&self, _rows: Range<usize>) -> Result<Block, TensorError> {
            Err(TensorError::Source {
                origin: "test".into(),
                detail: "read failed".into(),
            })
        }
    }

    fn fields() -> Vec<(String, Tensor)> {
        let values: Vec<i32> = (0..30).collect();
        vec![
            (
                "arr".to_string(),
                Tensor::from_array(Array::from_vec(&[10, 3], values).unwrap()).with_dtag("image"),
            ),
            (
                "lbl".to_string(),
                Tensor::from_array(Array::vector((0..10).collect::<Vec<i64>>())),
            ),
        ]
    }

    #[test]
    fn test_chunking_by_size() {
        let backend = MemoryBackend::new();
        let options = StoreOptions { chunk_bytes: 24 };
        let (manifest, report) = write_dataset(&backend, &fields(), &options).unwrap();

        // arr rows are 12 bytes → 2 rows per chunk; lbl rows are 8 bytes → 3.
        assert_eq!(manifest.fields[0].chunks.len(), 5);
        assert_eq!(manifest.fields[1].chunks.len(), 4);
        assert_eq!(report.chunks, 9);
        assert_eq!(manifest.fields[0].shape, vec![10, 3]);
        assert_eq!(manifest.fields[0].dtag.as_deref(), Some("image"));
        manifest.validate().unwrap();
    }

    #[test]
    fn test_rewrite_keeps_one_previous_generation() {
        let backend = MemoryBackend::new();
        let opts = StoreOptions::default();
        let (first, _) = write_dataset(&backend, &fields(), &opts).unwrap();
        assert_eq!(first.retained, None);

        let (second, _) = write_dataset(&backend, &fields(), &opts).unwrap();
        assert_eq!(second.retained.as_deref(), Some(first.data_dir.as_str()));
        assert!(backend.exists(&first.fields[0].chunks[0].file).unwrap());
        // manifest + one chunk per field, for two generations
        assert_eq!(backend.object_count(), 5);

        let (third, _) = write_dataset(&backend, &fields(), &opts).unwrap();
        assert_eq!(third.retained.as_deref(), Some(second.data_dir.as_str()));
        assert!(!backend.exists(&first.fields[0].chunks[0].file).unwrap());
        assert!(backend.exists(&second.fields[0].chunks[0].file).unwrap());
        assert!(backend.exists(&third.fields[0].chunks[0].file).unwrap());
        assert_eq!(backend.object_count(), 5);
    }

    #[test]
    fn test_failed_rewrite_keeps_committed_dataset() {
        let backend = MemoryBackend::new();
        let (committed, _) = write_dataset(&backend, &fields(), &StoreOptions::default()).unwrap();
        let before = backend.object_count();

        // The second field fails after the first one's chunks are written.
        let shape = Shape::from_signed(&[2]).unwrap();
        let bad = Tensor::deferred(shape, DType::Int32, Layout::Dense, Arc::new(FailingSource)).unwrap();
        let mixed = vec![
            ("ok".to_string(), Tensor::from_array(Array::vector(vec![1i64, 2]))),
            ("bad".to_string(), bad),
        ];
        assert!(write_dataset(&backend, &mixed, &StoreOptions { chunk_bytes: 8 }).is_err());

        assert_eq!(backend.object_count(), before);
        let manifest = Manifest::from_json(&backend.get(MANIFEST_FILE).unwrap()).unwrap();
        assert_eq!(manifest, committed);
    }

    #[test]
    fn test_length_mismatch_writes_nothing() {
        let backend = MemoryBackend::new();
        let mut bad = fields();
        bad.push(("short".into(), Tensor::from_array(Array::vector(vec![1u8]))));
        let err = write_dataset(&backend, &bad, &StoreOptions::default()).unwrap_err();
        assert!(matches!(err, StorageError::Tensor(TensorError::LengthMismatch { .. })));
        assert_eq!(backend.object_count(), 0);
    }

    #[test]
    fn test_zero_rows_resolve_unknown_dims() {
        let backend = MemoryBackend::new();
        let empty = Tensor::from_array(Array::zeros(&[0, 4], DType::Float32));
        let ragged = Tensor::from_ragged(DType::Int32, vec![]).unwrap();
        let fields = vec![("a".to_string(), empty), ("b".to_string(), ragged)];
        let (manifest, _) = write_dataset(&backend, &fields, &StoreOptions::default()).unwrap();
        assert_eq!(manifest.num_rows, 0);
        assert_eq!(manifest.fields[0].shape, vec![0, 4]);
        assert_eq!(manifest.fields[1].shape, vec![0, 0]);
        assert!(manifest.fields.iter().all(|f| f.chunks.is_empty()));
    }

    #[test]
    fn test_ragged_shape_keeps_unknown_dims() {
        let backend = MemoryBackend::new();
        let ragged = Tensor::from_ragged(
            DType::Int32,
            vec![Array::vector(vec![5i32, 6, 7, 8]), Array::vector(vec![7i32, 8, 9])],
        )
        .unwrap();
        let (manifest, _) =
            write_dataset(&backend, &[("r".to_string(), ragged)], &StoreOptions::default()).unwrap();
        assert_eq!(manifest.fields[0].layout, Layout::Ragged);
        assert_eq!(manifest.fields[0].shape, vec![2, -1]);
    }

    #[test]
    fn test_empty_field_list() {
        let backend = MemoryBackend::new();
        let (manifest, report) = write_dataset(&backend, &[], &StoreOptions::default()).unwrap();
        assert!(manifest.fields.is_empty());
        assert_eq!(report.rows, 0);
        assert!(backend.exists(MANIFEST_FILE).unwrap());
    }
}
