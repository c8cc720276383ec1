//! Append-only day-partitioned log writer.
//!
//! Each `LogWriter` exclusively owns the current file for one
//! (sensor kind, node) stream. The file handle and its partition date are
//! instance state, never process globals; whichever task owns the writer
//! owns the file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use crate::codec::{Sample, SensorKind};
use crate::store::StoreError;

/// Path of the log file for one (kind, node, UTC day) partition.
///
/// `accel_node-3_20260823.bin` with a node id, `accel_20260823.bin` without.
pub fn day_path(data_dir: &Path, kind: SensorKind, node: Option<&str>, date: NaiveDate) -> PathBuf {
    let stamp = date.format("%Y%m%d");
    let name = match node {
        Some(node) => format!("{}_{}_{}.bin", kind.file_prefix(), node, stamp),
        None => format!("{}_{}.bin", kind.file_prefix(), stamp),
    };
    data_dir.join(name)
}

struct OpenDay {
    file: File,
    path: PathBuf,
    date: NaiveDate,
}

/// Single-owner append handle for one (sensor kind, node) stream.
///
/// The first append of a UTC day creates that day's file (and the data
/// directory); appends after a day boundary close the old handle and open
/// the next day's file. Files are only ever appended to.
pub struct LogWriter {
    data_dir: PathBuf,
    kind: SensorKind,
    node: Option<String>,
    current: Option<OpenDay>,
}

impl LogWriter {
    pub fn new(data_dir: impl Into<PathBuf>, kind: SensorKind, node: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            kind,
            node,
            current: None,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Append one record to today's partition (UTC calendar date).
    ///
    /// Open/create failures propagate: a writer that cannot persist must
    /// fail loudly rather than drop telemetry.
    pub fn append(&mut self, sample: &Sample) -> Result<(), StoreError> {
        self.append_on(sample, Utc::now().date_naive())
    }

    /// Append one record to an explicit day partition. `append` resolves the
    /// date from the wall clock; this entry point exists so rotation can be
    /// exercised without waiting for midnight.
    pub(crate) fn append_on(&mut self, sample: &Sample, date: NaiveDate) -> Result<(), StoreError> {
        let record = sample.encode();
        let day = self.open_day(date)?;

        // One write_all per record: readers never observe a torn record, and
        // File is unbuffered so the bytes are visible to other processes as
        // soon as this returns.
        day.file
            .write_all(&record)
            .map_err(|source| StoreError::Write {
                path: day.path.clone(),
                source,
            })?;
        Ok(())
    }

    /// Rotate to `date`'s file if it is not already open.
    fn open_day(&mut self, date: NaiveDate) -> Result<&mut OpenDay, StoreError> {
        let stale = match &self.current {
            Some(day) => day.date != date,
            None => true,
        };

        if stale {
            let path = day_path(&self.data_dir, self.kind, self.node.as_deref(), date);
            std::fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Open {
                path: self.data_dir.clone(),
                source,
            })?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| StoreError::Open {
                    path: path.clone(),
                    source,
                })?;

            if let Some(old) = &self.current {
                tracing::info!(
                    kind = self.kind.as_ref(),
                    node = self.node.as_deref().unwrap_or("-"),
                    from = %old.path.display(),
                    to = %path.display(),
                    "Rotated to new day file"
                );
            } else {
                tracing::debug!(path = %path.display(), "Opened day file");
            }

            self.current = Some(OpenDay { file, path, date });
        }

        Ok(self.current.as_mut().expect("day file just opened"))
    }
}
