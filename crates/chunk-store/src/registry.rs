// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scheme → backend dispatch.
//!
//! Each store or load resolves its location once through a [`Registry`].
//! The process-wide registry knows `file` and `mem`; object-store clients
//! (e.g. `s3`) are plugged in with [`Registry::register`].

use crate::backend::{FsBackend, MemoryBackend, StorageBackend};
use crate::{StorageError, StorageUrl};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Builds a backend rooted at a parsed location.
pub type BackendFactory =
    dyn Fn(&StorageUrl) -> Result<Arc<dyn StorageBackend>, StorageError> + Send + Sync;

/// A map from URL scheme to backend factory.
pub struct Registry {
    factories: RwLock<HashMap<String, Arc<BackendFactory>>>,
}

impl Registry {
    /// An empty registry: every scheme is unsupported.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the `file` and `mem` schemes.
    ///
    /// `mem://bucket/path` URLs share one in-memory store per bucket for
    /// the lifetime of the registry.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register("file", |url| {
            let path = url.local_path().unwrap_or_default();
            Ok(Arc::new(FsBackend::new(path)) as Arc<dyn StorageBackend>)
        });

        let buckets: Mutex<HashMap<String, MemoryBackend>> = Mutex::new(HashMap::new());
        registry.register("mem", move |url| {
            let mut buckets = buckets.lock().unwrap_or_else(PoisonError::into_inner);
            let bucket = buckets.entry(url.bucket().to_string()).or_default();
            Ok(Arc::new(bucket.at(url.path())) as Arc<dyn StorageBackend>)
        });
        registry
    }

    /// The process-wide registry used by dataset store and load.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_defaults)
    }

    /// Registers (or replaces) the factory for `scheme`.
    pub fn register<F>(&self, scheme: &str, factory: F)
    where
        F: Fn(&StorageUrl) -> Result<Arc<dyn StorageBackend>, StorageError>
            + Send
            + Sync
            + 'static,
    {
        tracing::debug!(scheme, "registering storage backend");
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme.to_ascii_lowercase(), Arc::new(factory));
    }

    /// Removes the factory for `scheme`. Returns `true` if one was present.
    pub fn unregister(&self, scheme: &str) -> bool {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&scheme.to_ascii_lowercase())
            .is_some()
    }

    /// Returns `true` if a factory is registered for `scheme`.
    pub fn supports(&self, scheme: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&scheme.to_ascii_lowercase())
    }

    /// Builds the backend for a parsed location.
    pub fn resolve(&self, url: &StorageUrl) -> Result<Arc<dyn StorageBackend>, StorageError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url.scheme())
            .cloned()
            .ok_or_else(|| StorageError::UnsupportedScheme(url.scheme().to_string()))?;
        (*factory)(url)
    }

    /// Parses `location` and builds its backend.
    pub fn open(&self, location: &str) -> Result<Arc<dyn StorageBackend>, StorageError> {
        self.resolve(&StorageUrl::parse(location)?)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        schemes.sort();
        f.debug_struct("Registry").field("schemes", &schemes).finish()
    }
}
