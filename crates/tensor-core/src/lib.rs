// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Lazy, shape-tracked tensors for dataset pipelines.
//!
//! This crate provides:
//! - [`Array`]: an owned, dense, row-major buffer with concrete dimensions.
//! - [`Tensor`]: a cheap handle that is either eager (wraps an `Array`),
//!   ragged (one array per row), a lazy concatenation, a deferred row
//!   source, or a view over one of those.
//! - [`Shape`] / [`Dim`]: shapes whose dimensions may be unknown (`-1`).
//! - [`DType`]: supported element types, named as in numpy.
//! - [`AxisIndex`] and the [`s!`] macro for integer and range indexing.
//! - [`RowSource`]: the seam through which storage and generators supply
//!   rows on demand.
//!
//! # Design Goals
//! - Indexing never copies; only `compute()` materialises.
//! - A view of a view reads exactly what the equivalent single view reads.
//! - Clean error types via `thiserror`.

mod array;
mod dtype;
mod error;
mod index;
mod shape;
mod source;
mod spec;
mod tensor;

pub use array::Array;
pub use dtype::{DType, Element};
pub use error::TensorError;
pub use index::{gather, resolve_chain, AxisIndex, AxisSel, SliceSpec, ViewSpec};
pub use shape::{strides, Dim, Shape};
pub use source::{Block, Layout, RowSource};
pub use spec::TensorSpec;
pub use tensor::{Tensor, TensorIter};
