// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON dataset manifest.
//!
//! The manifest (`manifest.json`) is the commit record of a stored dataset.
//! It names the generation directory holding the chunk files and, per
//! field, the dtype, resolved shape, dtag, layout and chunk list.
//!
//! # Format
//! ```json
//! {
//!   "format_version": 1,
//!   "data_dir": "g18c2f0a1b3e4d5c6-0",
//!   "retained": "g18c2f09e7a1c3b2d-0",
//!   "num_rows": 55,
//!   "fields": [
//!     {
//!       "name": "arr",
//!       "dtype": "int32",
//!       "shape": [55, 5],
//!       "dtag": null,
//!       "layout": "dense",
//!       "chunks": [
//!         { "file": "g18c2f0a1b3e4d5c6-0/0/0.safetensors", "start_row": 0, "num_rows": 55 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::StorageError;
use std::collections::HashSet;
use tensor_core::{DType, Layout, Shape};

/// Manifest object name, relative to the dataset root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Top-level dataset manifest, deserialized from `manifest.json`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    /// Format version; only [`FORMAT_VERSION`] is accepted.
    pub format_version: u32,
    /// Generation directory containing every chunk this manifest commits.
    pub data_dir: String,
    /// Generation committed before this one. It is kept on disk so handles
    /// opened against it stay readable until the next store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained: Option<String>,
    /// Row count shared by all fields.
    pub num_rows: usize,
    /// Fields in insertion order.
    pub fields: Vec<FieldEntry>,
}

/// A single field entry in the manifest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldEntry {
    /// Field name.
    pub name: String,
    /// Element type as a numpy-style name (e.g. `"int32"`).
    pub dtype: String,
    /// Resolved shape. Only per-row dims of ragged fields may be `-1`.
    pub shape: Vec<i64>,
    /// Opaque semantic label.
    #[serde(default)]
    pub dtag: Option<String>,
    /// Row layout.
    #[serde(default)]
    pub layout: Layout,
    /// Chunk files covering rows `0..num_rows` in order.
    #[serde(default)]
    pub chunks: Vec<ChunkEntry>,
}

/// One chunk file holding a contiguous row range of a field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChunkEntry {
    /// Object key relative to the dataset root.
    pub file: String,
    /// First row held by the chunk.
    pub start_row: usize,
    /// Number of rows held by the chunk.
    pub num_rows: usize,
}

impl ChunkEntry {
    /// One past the last row held by the chunk.
    pub fn end_row(&self) -> usize {
        self.start_row + self.num_rows
    }
}

impl Manifest {
    /// Parses a manifest from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialises the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total number of chunk files.
    pub fn num_chunks(&self) -> usize {
        self.fields.iter().map(|f| f.chunks.len()).sum()
    }

    /// Validates that the manifest is internally consistent.
    ///
    /// Checks:
    /// - The format version is supported.
    /// - Field names are non-empty and unique.
    /// - Every dtype string is valid.
    /// - Every shape is resolved and leads with `num_rows`.
    /// - Every field's chunks cover `0..num_rows` contiguously and live in
    ///   `data_dir`.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(corrupt("field with empty name".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(corrupt(format!("duplicate field '{}'", field.name)));
            }
            field.dtype()?;
            self.validate_shape(field)?;
            self.validate_chunks(field)?;
        }
        Ok(())
    }

    fn validate_shape(&self, field: &FieldEntry) -> Result<(), StorageError> {
        let Some((&leading, rest)) = field.shape.split_first() else {
            return Err(corrupt(format!("field '{}' has rank 0", field.name)));
        };
        if leading < 0 || leading as usize != self.num_rows {
            return Err(corrupt(format!(
                "field '{}' has {leading} rows, manifest declares {}",
                field.name, self.num_rows
            )));
        }
        let min = match field.layout {
            Layout::Dense => 0,
            Layout::Ragged => -1,
        };
        if let Some(bad) = rest.iter().find(|&&d| d < min) {
            return Err(corrupt(format!(
                "field '{}' has unresolved dimension {bad} in {:?}",
                field.name, field.shape
            )));
        }
        Ok(())
    }

    fn validate_chunks(&self, field: &FieldEntry) -> Result<(), StorageError> {
        let mut next = 0;
        for chunk in &field.chunks {
            if chunk.start_row != next || chunk.num_rows == 0 {
                return Err(corrupt(format!(
                    "field '{}' chunk '{}' covers rows {}..{}, expected to start at {next}",
                    field.name,
                    chunk.file,
                    chunk.start_row,
                    chunk.end_row()
                )));
            }
            if !chunk.file.starts_with(&format!("{}/", self.data_dir)) {
                return Err(corrupt(format!(
                    "chunk '{}' lies outside data directory '{}'",
                    chunk.file, self.data_dir
                )));
            }
            next = chunk.end_row();
        }
        if next != self.num_rows {
            return Err(corrupt(format!(
                "chunks of field '{}' cover {next} of {} rows",
                field.name, self.num_rows
            )));
        }
        Ok(())
    }
}

impl FieldEntry {
    /// Parses the dtype string.
    pub fn dtype(&self) -> Result<DType, StorageError> {
        DType::parse(&self.dtype).ok_or_else(|| {
            corrupt(format!(
                "field '{}' has unsupported dtype '{}'",
                self.name, self.dtype
            ))
        })
    }

    /// Returns the stored shape.
    pub fn shape(&self) -> Result<Shape, StorageError> {
        Shape::from_signed(&self.shape).map_err(|e| corrupt(format!("field '{}': {e}", self.name)))
    }
}

fn corrupt(detail: String) -> StorageError {
    StorageError::CorruptManifest(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            format_version: FORMAT_VERSION,
            data_dir: "g1".into(),
            retained: None,
            num_rows: 5,
            fields: vec![FieldEntry {
                name: "arr".into(),
                dtype: "int32".into(),
                shape: vec![5, 3],
                dtag: Some("image".into()),
                layout: Layout::Dense,
                chunks: vec![
                    ChunkEntry {
                        file: "g1/0/0.safetensors".into(),
                        start_row: 0,
                        num_rows: 3,
                    },
                    ChunkEntry {
                        file: "g1/0/1.safetensors".into(),
                        start_row: 3,
                        num_rows: 2,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_valid_manifest() {
        let m = manifest();
        m.validate().unwrap();
        assert_eq!(m.num_chunks(), 2);
        assert_eq!(m.field("arr").unwrap().dtype().unwrap(), DType::Int32);
    }

    #[test]
    fn test_json_roundtrip() {
        let m = manifest();
        let parsed = Manifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn test_layout_and_dtag_default() {
        let json = br#"{
            "format_version": 1, "data_dir": "g1", "num_rows": 0,
            "fields": [{ "name": "x", "dtype": "float32", "shape": [0, 4] }]
        }"#;
        let m = Manifest::from_json(json).unwrap();
        m.validate().unwrap();
        assert_eq!(m.fields[0].layout, Layout::Dense);
        assert_eq!(m.fields[0].dtag, None);
        assert_eq!(m.retained, None);
    }

    #[test]
    fn test_rejects_gap_in_chunks() {
        let mut m = manifest();
        m.fields[0].chunks[1].start_row = 4;
        assert!(matches!(m.validate(), Err(StorageError::CorruptManifest(_))));
    }

    #[test]
    fn test_rejects_unresolved_dense_dim() {
        let mut m = manifest();
        m.fields[0].shape = vec![5, -1];
        assert!(matches!(m.validate(), Err(StorageError::CorruptManifest(_))));

        m.fields[0].layout = Layout::Ragged;
        m.validate().unwrap();
    }

    #[test]
    fn test_rejects_duplicate_and_bad_dtype() {
        let mut m = manifest();
        m.fields.push(m.fields[0].clone());
        assert!(m.validate().is_err());

        let mut m = manifest();
        m.fields[0].dtype = "complex128".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_rejects_row_count_mismatch_and_version() {
        let mut m = manifest();
        m.num_rows = 6;
        assert!(m.validate().is_err());

        let mut m = manifest();
        m.format_version = 99;
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Manifest::from_json(b"{ not json"),
            Err(StorageError::ManifestParse(_))
        ));
    }
}
