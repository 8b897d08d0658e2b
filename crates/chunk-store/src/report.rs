// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Store statistics.

use std::time::Duration;

/// What a single store wrote.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WriteReport {
    /// Dataset location, as described by the backend.
    pub location: String,
    /// Rows per field.
    pub rows: usize,
    /// Number of fields.
    pub fields: usize,
    /// Number of chunk files written.
    pub chunks: usize,
    /// Bytes written, chunks plus manifest.
    pub bytes_written: u64,
    /// Wall-clock time of the whole store.
    pub elapsed: Duration,
}

impl WriteReport {
    /// Write throughput in MB/s.
    pub fn throughput_mb_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_written as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "stored {} rows x {} fields to {} ({} chunks, {:.2} MB) in {:.2?}",
            self.rows,
            self.fields,
            self.location,
            self.chunks,
            self.bytes_written as f64 / (1024.0 * 1024.0),
            self.elapsed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_throughput() {
        let report = WriteReport {
            location: "file:///tmp/ds".into(),
            rows: 55,
            fields: 2,
            chunks: 2,
            bytes_written: 2 * 1024 * 1024,
            elapsed: Duration::from_secs(2),
        };
        assert!((report.throughput_mb_s() - 1.0).abs() < 1e-9);
        let summary = report.summary();
        assert!(summary.contains("55 rows x 2 fields"));
        assert!(summary.contains("2 chunks"));
    }

    #[test]
    fn test_zero_elapsed() {
        assert_eq!(WriteReport::default().throughput_mb_s(), 0.0);
    }
}
