// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # chunk-store
//!
//! Durable storage for datasets of named tensors.
//!
//! A stored dataset is a directory-like location holding:
//! - `manifest.json`: field names, dtypes, resolved shapes, dtags and the
//!   chunk list (see [`Manifest`]).
//! - One generation directory of SafeTensors chunk files, each holding a
//!   contiguous row range of one field.
//!
//! Locations are local paths or `scheme://bucket/path` URLs dispatched
//! through a [`Registry`] of [`StorageBackend`]s. Stores are atomic: the
//! manifest is written last and is the only thing readers follow.

mod backend;
mod chunk;
mod error;
mod manifest;
mod reader;
mod registry;
mod report;
mod url;
mod writer;

pub use backend::{Blob, FsBackend, MemoryBackend, StorageBackend};
pub use chunk::{decode as decode_chunk, encode_dense, encode_ragged};
pub use error::StorageError;
pub use manifest::{ChunkEntry, FieldEntry, Manifest, FORMAT_VERSION, MANIFEST_FILE};
pub use reader::{read_dataset, read_manifest, StoredDataset, StoredField};
pub use registry::{BackendFactory, Registry};
pub use report::WriteReport;
pub use url::StorageUrl;
pub use writer::{write_dataset, StoreOptions, DEFAULT_CHUNK_BYTES};
