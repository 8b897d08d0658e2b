// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dataset locations.

use crate::StorageError;
use std::fmt;
use std::path::PathBuf;

/// A parsed dataset location.
///
/// ```text
/// ./data/ds            → file, path "./data/ds"
/// file:///tmp/ds       → file, path "/tmp/ds"
/// s3://bucket/path/ds  → s3,   bucket "bucket", path "path/ds"
/// mem://scratch/ds     → mem,  bucket "scratch", path "ds"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageUrl {
    scheme: String,
    bucket: String,
    path: String,
}

impl StorageUrl {
    /// Parses a URL of the form `scheme://bucket/path`, or a plain
    /// filesystem path.
    pub fn parse(url: &str) -> Result<Self, StorageError> {
        let invalid = |detail: &str| StorageError::InvalidUrl {
            url: url.to_string(),
            detail: detail.to_string(),
        };

        let Some((scheme, rest)) = url.split_once("://") else {
            if url.is_empty() {
                return Err(invalid("empty location"));
            }
            return Ok(Self {
                scheme: "file".into(),
                bucket: String::new(),
                path: url.to_string(),
            });
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(invalid("malformed scheme"));
        }

        if scheme == "file" {
            if rest.is_empty() {
                return Err(invalid("empty path"));
            }
            return Ok(Self {
                scheme,
                bucket: String::new(),
                path: rest.to_string(),
            });
        }

        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid("missing bucket"));
        }
        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            path: path.trim_matches('/').to_string(),
        })
    }

    /// Lowercase scheme (`file` for plain paths).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket name; empty for local paths.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Path within the bucket, or the filesystem path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The filesystem path, for `file` URLs.
    pub fn local_path(&self) -> Option<PathBuf> {
        (self.scheme == "file").then(|| PathBuf::from(&self.path))
    }
}

impl fmt::Display for StorageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme == "file" {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.path)
        }
    }
}
