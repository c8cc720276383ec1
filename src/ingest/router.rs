//! Ingestion router actor.
//!
//! Single-consumer pattern: one dedicated thread owns every `LogWriter` and
//! processes frames in arrival order via a bounded MPSC channel. Transport
//! tasks only ever `try_send`, so slow disk never blocks the accept loop;
//! a full queue is a counted drop, not a stall.
//!
//! One `LogWriter` per (sensor kind, node) pair lives in this thread and
//! nowhere else, which is what makes per-file appends single-writer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::codec::SensorKind;
use crate::ingest::frame::{DropReason, Frame};
use crate::store::{LogWriter, StoreError};

/// Commands consumed by the router thread.
#[derive(Debug)]
enum Command {
    /// One raw frame payload, exactly as received from the transport.
    Frame(Vec<u8>),
    /// Graceful shutdown.
    Shutdown,
}

// =============================================================================
// Counters
// =============================================================================

/// Shared ingestion counters. Cloning shares the underlying counters.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    frames_received: AtomicU64,
    records_appended: AtomicU64,
    frames_dropped: AtomicU64,
    kinds_dropped: AtomicU64,
    queue_full: AtomicU64,
}

/// Point-in-time copy of the counters, served by `/api/stats`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct IngestStatsSnapshot {
    pub frames_received: u64,
    pub records_appended: u64,
    /// Whole frames dropped (bad JSON, missing timestamp, malformed topic).
    pub frames_dropped: u64,
    /// Per-kind payloads dropped out of otherwise valid frames.
    pub kinds_dropped: u64,
    /// Frames dropped because the bounded ingest queue was full.
    pub queue_full: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            frames_received: self.inner.frames_received.load(Ordering::Relaxed),
            records_appended: self.inner.records_appended.load(Ordering::Relaxed),
            frames_dropped: self.inner.frames_dropped.load(Ordering::Relaxed),
            kinds_dropped: self.inner.kinds_dropped.load(Ordering::Relaxed),
            queue_full: self.inner.queue_full.load(Ordering::Relaxed),
        }
    }

    fn count_received(&self) {
        self.inner.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    fn count_appended(&self) {
        self.inner.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    fn count_frame_drop(&self) {
        self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn count_kind_drop(&self) {
        self.inner.kinds_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn count_queue_full(&self) {
        self.inner.queue_full.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cheap cloneable handle for submitting frames to the router thread.
#[derive(Clone)]
pub struct IngestHandle {
    tx: SyncSender<Command>,
    stats: IngestStats,
}

impl std::fmt::Debug for IngestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestHandle").finish_non_exhaustive()
    }
}

impl IngestHandle {
    /// Submit one raw frame. Non-blocking; a full queue counts the frame as
    /// dropped.
    pub fn submit(&self, payload: Vec<u8>) {
        if self.tx.try_send(Command::Frame(payload)).is_err() {
            tracing::warn!(
                reason = DropReason::QueueFull.as_ref(),
                "Ingest queue full, dropping frame"
            );
            self.stats.count_queue_full();
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Request shutdown. The router drains queued frames first.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

// =============================================================================
// Router
// =============================================================================

/// Demultiplexes inbound frames into per-(kind, node) log writers.
pub struct IngestRouter {
    data_dir: PathBuf,
    writers: HashMap<(SensorKind, Option<String>), LogWriter>,
    stats: IngestStats,
}

impl IngestRouter {
    pub(crate) fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            writers: HashMap::new(),
            stats: IngestStats::default(),
        }
    }

    /// Spawn the router thread.
    ///
    /// Returns the thread handle and an `IngestHandle` for submitting
    /// frames. If a writer fails (disk gone, directory unwritable) the
    /// thread exits with an error log rather than accepting telemetry it
    /// cannot persist.
    pub fn spawn(
        data_dir: impl Into<PathBuf>,
        channel_capacity: usize,
    ) -> (JoinHandle<()>, IngestHandle) {
        let (tx, rx) = mpsc::sync_channel(channel_capacity);
        let mut router = IngestRouter::new(data_dir);
        let handle = IngestHandle {
            tx,
            stats: router.stats.clone(),
        };

        let join = thread::spawn(move || router.run(rx));
        (join, handle)
    }

    fn run(&mut self, rx: Receiver<Command>) {
        tracing::info!(data_dir = %self.data_dir.display(), "Ingest router started");

        while let Ok(cmd) = rx.recv() {
            match cmd {
                Command::Frame(payload) => {
                    if let Err(e) = self.route(&payload) {
                        tracing::error!(error = %e, "Log writer failed, stopping ingestion");
                        return;
                    }
                }
                Command::Shutdown => break,
            }
        }

        tracing::info!("Ingest router stopped");
    }

    /// Route one raw frame: parse, then append each present kind to its
    /// writer. Malformed input is counted and logged; only writer I/O
    /// failures propagate.
    pub(crate) fn route(&mut self, payload: &[u8]) -> Result<(), StoreError> {
        self.stats.count_received();

        let frame = match Frame::parse(payload) {
            Ok(frame) => frame,
            Err(reason) => {
                self.stats.count_frame_drop();
                tracing::warn!(reason = reason.as_ref(), "Dropped inbound frame");
                return Ok(());
            }
        };

        for kind in &frame.bad_kinds {
            self.stats.count_kind_drop();
            tracing::warn!(
                kind = kind.as_ref(),
                reason = DropReason::BadKindPayload.as_ref(),
                "Dropped kind payload from frame"
            );
        }

        for sample in &frame.samples {
            let key = (sample.kind(), frame.node.clone());
            let writer = self.writers.entry(key).or_insert_with(|| {
                LogWriter::new(&self.data_dir, sample.kind(), frame.node.clone())
            });
            writer.append(sample)?;
            self.stats.count_appended();
        }

        Ok(())
    }

    #[cfg(test)]
    fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::day_path;
    use chrono::Utc;
    use tempfile::tempdir;

    fn today_file(dir: &std::path::Path, kind: SensorKind, node: Option<&str>) -> Vec<u8> {
        let path = day_path(dir, kind, node, Utc::now().date_naive());
        std::fs::read(path).unwrap_or_default()
    }

    #[test]
    fn test_multi_kind_frame_routes_to_two_files() {
        let dir = tempdir().unwrap();
        let mut router = IngestRouter::new(dir.path());

        router
            .route(br#"{"t":1000.0,"a":[0.1,0.2,0.98],"T":21.5}"#)
            .unwrap();

        assert_eq!(
            today_file(dir.path(), SensorKind::Accelerometer, None).len(),
            20
        );
        assert_eq!(today_file(dir.path(), SensorKind::Temperature, None).len(), 12);
        assert!(today_file(dir.path(), SensorKind::Inclinometer, None).is_empty());

        let snap = router.stats().snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.records_appended, 2);
        assert_eq!(snap.frames_dropped, 0);
    }

    #[test]
    fn test_bad_accel_still_appends_temperature() {
        let dir = tempdir().unwrap();
        let mut router = IngestRouter::new(dir.path());

        router.route(br#"{"t":1000.0,"a":[0.1],"T":21.5}"#).unwrap();

        assert!(today_file(dir.path(), SensorKind::Accelerometer, None).is_empty());
        assert_eq!(today_file(dir.path(), SensorKind::Temperature, None).len(), 12);

        let snap = router.stats().snapshot();
        assert_eq!(snap.kinds_dropped, 1);
        assert_eq!(snap.records_appended, 1);
    }

    #[test]
    fn test_node_topic_routes_to_node_files() {
        let dir = tempdir().unwrap();
        let mut router = IngestRouter::new(dir.path());

        router
            .route(br#"{"topic":"shm/node-2","t":1.0,"i":[0.5,-0.5]}"#)
            .unwrap();

        assert_eq!(
            today_file(dir.path(), SensorKind::Inclinometer, Some("node-2")).len(),
            16
        );
        assert!(today_file(dir.path(), SensorKind::Inclinometer, None).is_empty());
    }

    #[test]
    fn test_malformed_frames_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let mut router = IngestRouter::new(dir.path());

        router.route(b"not json at all").unwrap();
        router.route(br#"{"a":[1.0,2.0,3.0]}"#).unwrap(); // no timestamp
        router.route(br#"{"topic":"a/b/c","t":1.0,"T":2.0}"#).unwrap();

        let snap = router.stats().snapshot();
        assert_eq!(snap.frames_received, 3);
        assert_eq!(snap.frames_dropped, 3);
        assert_eq!(snap.records_appended, 0);
    }

    #[test]
    fn test_writer_failure_propagates() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let mut router = IngestRouter::new(&blocker);
        let err = router.route(br#"{"t":1.0,"T":20.0}"#).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn test_spawned_router_lifecycle() {
        let dir = tempdir().unwrap();
        let (join, handle) = IngestRouter::spawn(dir.path(), 64);

        handle.submit(br#"{"t":1.0,"T":20.0}"#.to_vec());
        handle.shutdown();
        join.join().unwrap();

        assert_eq!(today_file(dir.path(), SensorKind::Temperature, None).len(), 12);
        assert_eq!(handle.stats().snapshot().records_appended, 1);
    }
}
