// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Object storage backends.
//!
//! A [`StorageBackend`] is rooted at one dataset location and addresses
//! objects by `/`-separated keys relative to that root. Two backends ship
//! with the crate:
//!
//! 1. [`FsBackend`]: a local directory. Objects are written to a temporary
//!    file and renamed into place; reads are memory-mapped.
//! 2. [`MemoryBackend`]: a process-local object map, used for `mem://`
//!    URLs and as a stand-in for remote object stores in tests.

use crate::StorageError;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Bytes of one stored object.
pub enum Blob {
    /// A memory-mapped local file.
    Mapped(memmap2::Mmap),
    /// Bytes shared with an in-memory store.
    Shared(Arc<[u8]>),
    /// Owned bytes.
    Owned(Vec<u8>),
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Blob::Mapped(m) => &m[..],
            Blob::Shared(b) => &b[..],
            Blob::Owned(b) => &b[..],
        }
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.deref()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Blob::Mapped(_) => "mapped",
            Blob::Shared(_) => "shared",
            Blob::Owned(_) => "owned",
        };
        write!(f, "Blob({kind}, {} bytes)", self.len())
    }
}

/// Object storage rooted at one dataset location.
///
/// `put` must make an object visible atomically: readers see either the
/// previous object or the complete new one.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Stores `bytes` under `key`, replacing any existing object.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Reads the object at `key`.
    fn get(&self, key: &str) -> Result<Blob, StorageError>;

    /// Returns `true` if an object exists at `key`.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Removes every object whose key starts with `prefix/`, and `prefix`
    /// itself. Missing objects are not an error.
    fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;

    /// Human-readable location, for logs and error messages.
    fn describe(&self) -> String;
}

// ── Local filesystem ───────────────────────────────────────────

/// A dataset directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsBackend {
    /// Creates a backend rooted at `root`. The directory is created on the
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the dataset directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl StorageBackend for FsBackend {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key);
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent.display(), e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp, bytes).map_err(|e| StorageError::io(tmp.display(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            StorageError::io(path.display(), e)
        })
    }

    fn get(&self, key: &str) -> Result<Blob, StorageError> {
        let path = self.path(key);
        let file = std::fs::File::open(&path).map_err(|e| StorageError::io(path.display(), e))?;
        let len = file
            .metadata()
            .map_err(|e| StorageError::io(path.display(), e))?
            .len();
        if len == 0 {
            return Ok(Blob::Owned(Vec::new()));
        }
        // SAFETY: objects are only ever replaced by rename, never modified
        // in place, so the mapped file does not change under the reader.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| StorageError::io(path.display(), e))?;
        Ok(Blob::Mapped(mmap))
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path(key);
        path.try_exists()
            .map_err(|e| StorageError::io(path.display(), e))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let path = self.path(prefix);
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(StorageError::io(path.display(), e))
            }
            _ => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

// ── In-memory ──────────────────────────────────────────────────

type ObjectMap = BTreeMap<String, Arc<[u8]>>;

/// A process-local object store.
///
/// Clones share the same objects. [`MemoryBackend::at`] returns a view
/// rooted at a sub-prefix of the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<ObjectMap>>,
    prefix: String,
}

impl MemoryBackend {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a backend over the same store, rooted at `prefix`.
    pub fn at(&self, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            objects: Arc::clone(&self.objects),
            prefix: join_key(&self.prefix, prefix),
        }
    }

    /// Number of objects in the whole store.
    pub fn object_count(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn key(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}/{key}"),
    }
}

impl StorageBackend for MemoryBackend {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.key(key), Arc::from(bytes));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Blob, StorageError> {
        let key = self.key(key);
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|bytes| Blob::Shared(Arc::clone(bytes)))
            .ok_or_else(|| {
                StorageError::io(
                    format!("mem://{key}"),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                )
            })
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&self.key(key)))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let exact = self.key(prefix);
        let nested = format!("{exact}/");
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k, _| *k != exact && !k.starts_with(&nested));
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mem://{}", self.prefix)
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("prefix", &self.prefix)
            .field("objects", &self.object_count())
            .finish()
    }
}
