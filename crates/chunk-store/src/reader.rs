// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dataset load.
//!
//! Loading reads and validates the manifest, checks that every chunk it
//! names exists, and returns one storage-backed [`Tensor`] per field. No
//! chunk data is read until a tensor (or a view of it) is computed, and
//! then only the chunks overlapping the requested rows.

use crate::manifest::{ChunkEntry, FieldEntry, Manifest, MANIFEST_FILE};
use crate::{chunk, StorageBackend, StorageError};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tensor_core::{Array, Block, DType, Layout, RowSource, Tensor, TensorError};

/// A loaded dataset: its manifest and one lazy tensor per field.
#[derive(Debug, Clone)]
pub struct StoredDataset {
    pub manifest: Manifest,
    pub fields: Vec<(String, Tensor)>,
}

/// Reads and validates the committed manifest.
pub fn read_manifest(backend: &dyn StorageBackend) -> Result<Manifest, StorageError> {
    let blob = match backend.get(MANIFEST_FILE) {
        Ok(blob) => blob,
        Err(e) if e.is_not_found() => {
            return Err(StorageError::ManifestNotFound(backend.describe()));
        }
        Err(e) => return Err(e),
    };
    let manifest = Manifest::from_json(&blob)?;
    manifest.validate()?;
    Ok(manifest)
}

/// Opens the dataset committed at `backend`.
///
/// Fails without returning any field if the manifest is missing or
/// corrupt, or if any chunk it names is missing.
pub fn read_dataset(backend: Arc<dyn StorageBackend>) -> Result<StoredDataset, StorageError> {
    let manifest = read_manifest(backend.as_ref())?;

    for field in &manifest.fields {
        for chunk in &field.chunks {
            if !backend.exists(&chunk.file)? {
                return Err(StorageError::CorruptManifest(format!(
                    "chunk '{}' of field '{}' is missing",
                    chunk.file, field.name
                )));
            }
        }
    }

    let fields = manifest
        .fields
        .iter()
        .map(|entry| {
            let source = StoredField::new(Arc::clone(&backend), entry.clone(), manifest.num_rows)?;
            let tensor = Tensor::deferred(entry.shape()?, source.dtype, entry.layout, Arc::new(source))?
                .with_optional_dtag(entry.dtag.clone());
            Ok((entry.name.clone(), tensor))
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    tracing::info!(
        "loaded {} rows x {} fields from {} ({} chunks)",
        manifest.num_rows,
        manifest.fields.len(),
        backend.describe(),
        manifest.num_chunks(),
    );
    Ok(StoredDataset { manifest, fields })
}

/// Row source for one stored field.
pub struct StoredField {
    backend: Arc<dyn StorageBackend>,
    entry: FieldEntry,
    dtype: DType,
    num_rows: usize,
}

impl StoredField {
    fn new(
        backend: Arc<dyn StorageBackend>,
        entry: FieldEntry,
        num_rows: usize,
    ) -> Result<Self, StorageError> {
        let dtype = entry.dtype()?;
        Ok(Self {
            backend,
            entry,
            dtype,
            num_rows,
        })
    }

    fn read_chunk(&self, chunk: &ChunkEntry) -> Result<Block, StorageError> {
        let blob = self.backend.get(&chunk.file)?;
        let block = chunk::decode(&blob, &chunk.file, self.dtype, self.entry.layout)?;
        if block.num_rows() != chunk.num_rows {
            return Err(StorageError::CorruptManifest(format!(
                "chunk '{}' holds {} rows, manifest says {}",
                chunk.file,
                block.num_rows(),
                chunk.num_rows
            )));
        }
        tracing::debug!(field = %self.entry.name, file = %chunk.file, rows = chunk.num_rows, "read chunk");
        Ok(block)
    }

    fn empty_block(&self) -> Block {
        match self.entry.layout {
            Layout::Dense => {
                let mut dims: Vec<usize> =
                    self.entry.shape.iter().map(|&d| d.max(0) as usize).collect();
                dims[0] = 0;
                Block::Dense(Array::zeros(&dims, self.dtype))
            }
            Layout::Ragged => Block::Ragged(Vec::new()),
        }
    }

    fn source_error(&self, e: StorageError) -> TensorError {
        match e {
            StorageError::Tensor(inner) => inner,
            other => TensorError::Source {
                origin: format!("reading stored field '{}'", self.entry.name),
                detail: other.to_string(),
            },
        }
    }
}

impl RowSource for StoredField {
    fn num_rows(&self) -> Result<usize, TensorError> {
        Ok(self.num_rows)
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError> {
        if rows.start > rows.end || rows.end > self.num_rows {
            return Err(TensorError::IndexOutOfBounds {
                axis: 0,
                index: rows.end as isize,
                size: self.num_rows,
            });
        }
        if rows.is_empty() {
            return Ok(self.empty_block());
        }

        let first = self
            .entry
            .chunks
            .partition_point(|c| c.end_row() <= rows.start);
        let mut blocks = Vec::new();
        for chunk in self.entry.chunks[first..]
            .iter()
            .take_while(|c| c.start_row < rows.end)
        {
            let local = rows.start.max(chunk.start_row) - chunk.start_row
                ..rows.end.min(chunk.end_row()) - chunk.start_row;
            let block = self.read_chunk(chunk).map_err(|e| self.source_error(e))?;
            blocks.push(match block {
                Block::Dense(array) if local.len() == chunk.num_rows => Block::Dense(array),
                Block::Dense(array) => Block::Dense(array.rows(local)?),
                Block::Ragged(mut all) => Block::Ragged(all.drain(local).collect()),
            });
        }
        Block::concat(blocks)
    }
}

impl fmt::Debug for StoredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredField")
            .field("name", &self.entry.name)
            .field("location", &self.backend.describe())
            .field("chunks", &self.entry.chunks.len())
            .finish()
    }
}
