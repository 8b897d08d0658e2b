// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Deferred row producers.
//!
//! A [`RowSource`] backs a lazily populated [`crate::Tensor`]: storage-backed
//! dataset fields and generator outputs both implement it. Sources are asked
//! for row ranges only when a tensor (or a view of it) is computed.

use crate::{Array, TensorError};
use std::fmt;
use std::ops::Range;

/// How the rows of a tensor are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One rectangular array; every row has the same shape.
    #[default]
    Dense,
    /// One array per row; row shapes may differ.
    Ragged,
}

impl Layout {
    /// Returns a lowercase label for this layout.
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Dense => "dense",
            Layout::Ragged => "ragged",
        }
    }
}

/// A materialised range of rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Rows stacked into one array, leading dimension = row count.
    Dense(Array),
    /// One array per row.
    Ragged(Vec<Array>),
}

impl Block {
    /// Number of rows in the block.
    pub fn num_rows(&self) -> usize {
        match self {
            Block::Dense(a) => a.leading_dim().unwrap_or(0),
            Block::Ragged(rows) => rows.len(),
        }
    }

    /// The layout this block carries.
    pub fn layout(&self) -> Layout {
        match self {
            Block::Dense(_) => Layout::Dense,
            Block::Ragged(_) => Layout::Ragged,
        }
    }

    /// Concatenates blocks of the same layout in order.
    pub fn concat(blocks: Vec<Block>) -> Result<Block, TensorError> {
        let layout = blocks
            .first()
            .map(Block::layout)
            .ok_or_else(|| TensorError::shape("cannot concatenate zero blocks"))?;
        match layout {
            Layout::Dense => {
                let mut arrays = blocks
                    .into_iter()
                    .map(|b| match b {
                        Block::Dense(a) => Ok(a),
                        Block::Ragged(_) => Err(layout_mix()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if arrays.len() == 1 {
                    if let Some(only) = arrays.pop() {
                        return Ok(Block::Dense(only));
                    }
                }
                Array::concat_rows(&arrays).map(Block::Dense)
            }
            Layout::Ragged => {
                let mut rows = Vec::new();
                for b in blocks {
                    match b {
                        Block::Ragged(r) => rows.extend(r),
                        Block::Dense(_) => return Err(layout_mix()),
                    }
                }
                Ok(Block::Ragged(rows))
            }
        }
    }
}

fn layout_mix() -> TensorError {
    TensorError::shape("cannot concatenate dense and ragged rows")
}

/// Produces rows on demand for a deferred tensor.
///
/// Implementations must be deterministic: reading the same range twice
/// yields equal blocks.
pub trait RowSource: Send + Sync + fmt::Debug {
    /// Total number of rows. May trigger materialisation.
    fn num_rows(&self) -> Result<usize, TensorError>;

    /// Reads rows `rows.start..rows.end`.
    fn read_rows(&self, rows: Range<usize>) -> Result<Block, TensorError>;
}
