//! Binary time-series log store.
//!
//! Telemetry is persisted as day-partitioned, append-only files of
//! fixed-width records, one file per (sensor kind, node, UTC day). Writers
//! and readers share nothing but the filesystem:
//!
//! - [`LogWriter`]: exclusive owner of the current file for one
//!   (kind, node) stream; rotates at UTC day boundaries
//! - [`read_tail`]: bounded suffix read, O(requested bytes) regardless of
//!   total file size
//! - [`LogQuery`]: stateless time-window queries over the tail of the
//!   current day's file

mod query;
mod tail;
mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use query::{LogQuery, Point, QueryResponse, WindowQuery, MAX_SCAN_RECORDS};
pub use tail::read_tail;
pub use writer::{day_path, LogWriter};

/// Errors from the log store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create or open a log file or its parent directory.
    /// Fatal for the owning writer: telemetry must not be dropped silently.
    #[error("cannot open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An append or flush to an already-open file failed.
    #[error("write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a log file failed (a missing file is NOT an error; it reads
    /// as empty).
    #[error("read from {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
