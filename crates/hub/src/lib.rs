// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # hub
//!
//! Datasets of named lazy tensors.
//!
//! A [`Dataset`] is an ordered set of equally long [`tensor_core::Tensor`]s.
//! Datasets are built from tensors or from a [`Generator`], and can be
//! selected, sliced, merged, concatenated, stored and loaded:
//!
//! ```text
//! Generator ──generate──► Dataset ──select/slice/merge/concat──► Dataset
//!                            │                                     │
//!                            └───────store(url)──► chunk-store ◄───┘
//!                                                      │
//!                                 Dataset ◄──load(url)─┘
//! ```
//!
//! Nothing is computed until a tensor is materialised. Storing resolves
//! every unknown dimension and commits atomically; loading reads only the
//! chunks a computed view needs.
//!
//! # Loader Adapters
//! [`Dataset::to_pytorch`] and [`Dataset::to_tensorflow`] present the rows
//! as [`Sample`]s and collate them into [`Batch`]es. Ragged fields are
//! never stacked.

mod config;
mod dataset;
mod error;
mod export;
mod generate;

pub use config::HubConfig;
pub use dataset::{Dataset, DatasetIter, Row};
pub use error::DatasetError;
pub use export::{Batch, Batches, Column, Sample, Samples, TfDataset, TorchDataset};
pub use generate::{
    generate, generate_with, generated_shape, FieldMap, Generator, GeneratorError, Schema,
};

pub use chunk_store::{Registry, StorageBackend, StorageUrl};
