// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dataset configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! chunk_bytes = 16777216
//! parallel_generate = true
//! num_threads = 4
//! ```

use crate::DatasetError;
use chunk_store::{StoreOptions, DEFAULT_CHUNK_BYTES};
use std::path::Path;

/// Configuration for generation and storage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HubConfig {
    /// Target size of one stored chunk in bytes.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    /// Whether generator calls run on a worker pool.
    #[serde(default = "default_true")]
    pub parallel_generate: bool,
    /// Number of worker threads (defaults to number of online CPU cores).
    #[serde(default)]
    pub num_threads: Option<usize>,
}

fn default_chunk_bytes() -> usize {
    DEFAULT_CHUNK_BYTES
}

fn default_true() -> bool {
    true
}

impl HubConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DatasetError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, DatasetError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| DatasetError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, DatasetError> {
        toml::to_string_pretty(self)
            .map_err(|e| DatasetError::Config(format!("TOML serialise error: {e}")))
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.chunk_bytes == 0 {
            return Err(DatasetError::Config("chunk_bytes must be positive".into()));
        }
        if self.num_threads == Some(0) {
            return Err(DatasetError::Config("num_threads must be positive".into()));
        }
        Ok(())
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// The part of this config the chunk writer needs.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            chunk_bytes: self.chunk_bytes,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            parallel_generate: true,
            num_threads: None,
        }
    }
}
