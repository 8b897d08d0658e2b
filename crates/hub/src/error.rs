// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for datasets.

use chunk_store::StorageError;
use tensor_core::TensorError;

/// Origin label carried by [`TensorError::Source`] when a generator call
/// fails during lazy materialisation.
pub(crate) const GENERATOR_ORIGIN: &str = "generator";

/// Errors raised by dataset construction, transforms, storage and export.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Data is inconsistent with a declared or required shape.
    #[error("shape error: {0}")]
    Shape(String),

    /// Fields or datasets disagree on their row count.
    #[error("length mismatch for '{field}': expected {expected} rows, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// A field name appears more than once.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// Datasets being concatenated do not share the same field names.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Generated output does not follow the declared schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// Persisting or loading failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// No field with this name exists.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The user callable of a generator failed.
    #[error("generator failed: {0}")]
    Generator(String),

    /// Any other tensor failure (indexing, dtype, ragged compute).
    #[error(transparent)]
    Tensor(TensorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<TensorError> for DatasetError {
    fn from(e: TensorError) -> Self {
        match e {
            TensorError::Shape { detail } => DatasetError::Shape(detail),
            TensorError::MissingField { field, input } => DatasetError::Schema(format!(
                "output for input {input} is missing declared field '{field}'"
            )),
            TensorError::LengthMismatch {
                name,
                expected,
                actual,
            } => DatasetError::LengthMismatch {
                field: name,
                expected,
                actual,
            },
            TensorError::Source { origin, detail } if origin == GENERATOR_ORIGIN => {
                DatasetError::Generator(detail)
            }
            other => DatasetError::Tensor(other),
        }
    }
}

impl From<StorageError> for DatasetError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Tensor(inner) => inner.into(),
            other => DatasetError::Storage(other),
        }
    }
}
