// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for dataset persistence.

use tensor_core::TensorError;

/// Errors that can occur when storing or loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An object could not be read, written or removed.
    #[error("storage I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// No manifest exists at the dataset location.
    #[error("no dataset manifest found at {0}")]
    ManifestNotFound(String),

    /// The manifest parsed but is internally inconsistent, or refers to
    /// chunk objects that do not exist.
    #[error("corrupt manifest: {0}")]
    CorruptManifest(String),

    /// A chunk file could not be encoded or decoded.
    #[error("chunk '{object}': {detail}")]
    SafeTensors { object: String, detail: String },

    /// No backend is registered for the URL scheme.
    #[error("no storage backend registered for scheme '{0}'")]
    UnsupportedScheme(String),

    /// The storage location could not be parsed.
    #[error("invalid storage url '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// Field data violated a tensor invariant while being written.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

impl StorageError {
    pub(crate) fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn chunk(object: &str, detail: impl std::fmt::Display) -> Self {
        StorageError::SafeTensors {
            object: object.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Returns `true` if the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
