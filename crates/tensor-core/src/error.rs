// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::DType;

/// Errors that can occur during tensor construction, indexing and compute.
///
/// Errors are `Clone` because a lazily materialised source memoises its
/// outcome and hands the same result to every tensor that reads from it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    /// Array data is inconsistent with the declared or expected shape.
    #[error("shape error: {detail}")]
    Shape { detail: String },

    /// Two arrays or tensors disagree on their element type.
    #[error("dtype mismatch in {op}: expected {expected}, got {actual}")]
    DTypeMismatch {
        op: &'static str,
        expected: DType,
        actual: DType,
    },

    /// An index falls outside the bounds of its axis.
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds { axis: usize, index: isize, size: usize },

    /// More indices were supplied than the tensor has dimensions.
    #[error("too many indices: {given} given for a tensor of rank {rank}")]
    TooManyIndices { given: usize, rank: usize },

    /// The operation needs at least one dimension (e.g. `len` of a scalar).
    #[error("{op} requires a tensor with at least one dimension")]
    NotIndexable { op: &'static str },

    /// A slice specification is malformed (e.g. a zero step).
    #[error("invalid slice: {detail}")]
    InvalidSlice { detail: String },

    /// Several rows of a ragged tensor cannot form one rectangular array.
    #[error("cannot compute {rows} ragged rows as one array; use compute_rows()")]
    RaggedCompute { rows: usize },

    /// A generated row set lacks a declared field.
    #[error("generator output for input {input} is missing declared field '{field}'")]
    MissingField { field: String, input: usize },

    /// Row counts disagree where they must match.
    #[error("row count mismatch for '{name}': expected {expected}, got {actual}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A deferred row source failed to produce data.
    #[error("{origin} failed: {detail}")]
    Source { origin: String, detail: String },
}

impl TensorError {
    /// Shorthand for a [`TensorError::Shape`] with a formatted detail.
    pub fn shape(detail: impl Into<String>) -> Self {
        TensorError::Shape {
            detail: detail.into(),
        }
    }
}
