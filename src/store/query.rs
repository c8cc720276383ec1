//! Stateless time-window queries.
//!
//! A query never scans a whole file: it tail-reads a bounded number of
//! records from the current UTC day's partition, decodes them, drops
//! everything older than `now - minutes`, projects one channel and keeps the
//! most recent `limit` points in ascending timestamp order.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::{Sample, SensorKind};
use crate::store::writer::day_path;
use crate::store::{read_tail, StoreError};

/// Upper bound on records decoded per query.
///
/// Heuristic, not a correctness guarantee: 500k records cover a full
/// 1440-minute window at up to ~5 Hz sustained per stream (and cost at most
/// ~10 MB of I/O for accelerometer records). Faster streams lose the oldest
/// end of very wide windows; the response flags that via `truncated`.
pub const MAX_SCAN_RECORDS: usize = 500_000;

/// Parameters for one window query. Range validation (`minutes`, `limit`)
/// belongs to the HTTP boundary, not here.
#[derive(Debug, Clone)]
pub struct WindowQuery {
    pub kind: SensorKind,
    pub node: Option<String>,
    /// Channel to project; `None` means the kind's default channel.
    /// An unrecognized name yields an empty point list, not an error.
    pub channel: Option<String>,
    /// Window width in minutes, ending at query time.
    pub minutes: u32,
    /// Maximum number of points returned (most recent kept).
    pub limit: usize,
}

/// One projected data point. `ts` serializes as an ISO-8601 UTC string.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

/// Result of a window query, shaped for the dashboard API.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub sensor: SensorKind,
    pub unit: &'static str,
    pub channel: String,
    /// True when the scan bound was exhausted before reaching the cutoff:
    /// the oldest end of the window may be missing.
    pub truncated: bool,
    pub points: Vec<Point>,
}

/// Read-only query handle over a data directory.
///
/// Holds no mutable state and no file handles; it is safe to clone into
/// concurrently running request handlers.
#[derive(Debug, Clone)]
pub struct LogQuery {
    data_dir: PathBuf,
}

impl LogQuery {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Query the most recent `minutes` of one channel, as of now.
    pub fn window(&self, q: &WindowQuery) -> Result<QueryResponse, StoreError> {
        self.window_at(q, Utc::now())
    }

    /// Query with an explicit "now" (used by tests for determinism).
    pub(crate) fn window_at(
        &self,
        q: &WindowQuery,
        now: DateTime<Utc>,
    ) -> Result<QueryResponse, StoreError> {
        self.window_scan(q, now, MAX_SCAN_RECORDS)
    }

    fn window_scan(
        &self,
        q: &WindowQuery,
        now: DateTime<Utc>,
        max_scan: usize,
    ) -> Result<QueryResponse, StoreError> {
        let channel = q
            .channel
            .clone()
            .unwrap_or_else(|| q.kind.default_channel().to_string());

        let record_size = q.kind.record_size();
        let path = day_path(&self.data_dir, q.kind, q.node.as_deref(), now.date_naive());
        let buf = read_tail(&path, record_size, max_scan)?;

        // decode_all discards a trailing partial record (file caught
        // mid-append) without complaint.
        let samples = Sample::decode_all(q.kind, &buf);
        let cutoff = epoch_seconds(now) - f64::from(q.minutes) * 60.0;

        // Scan bound exhausted while still inside the window: the oldest end
        // of the requested range may be missing.
        let truncated = buf.len() >= max_scan * record_size
            && samples.first().is_some_and(|s| s.ts() >= cutoff);

        if !q.kind.channels().contains(&channel.as_str()) {
            tracing::debug!(
                sensor = q.kind.as_ref(),
                channel = %channel,
                "Unknown channel requested, returning no points"
            );
        }

        let mut points: Vec<Point> = samples
            .iter()
            .filter(|s| s.ts() >= cutoff)
            .filter_map(|s| {
                s.channel(&channel).map(|value| Point {
                    ts: datetime_from_epoch(s.ts()),
                    value,
                })
            })
            .collect();

        // Keep the most recent `limit` points; order stays ascending.
        if points.len() > q.limit {
            points.drain(..points.len() - q.limit);
        }

        Ok(QueryResponse {
            sensor: q.kind,
            unit: q.kind.unit(),
            channel,
            truncated,
            points,
        })
    }
}

/// Wall-clock time as fractional epoch seconds, the clock basis records are
/// stored in.
fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

/// Stored `f64` epoch seconds back to a UTC datetime. Out-of-range values
/// (garbage bytes decoded as timestamps) clamp to the epoch.
fn datetime_from_epoch(ts: f64) -> DateTime<Utc> {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round() as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)).unwrap_or(DateTime::UNIX_EPOCH)
}
