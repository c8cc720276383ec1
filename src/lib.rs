//! Pylon - Structural Telemetry Log Engine
//!
//! Append-only binary time-series storage for structural-health telemetry
//! (accelerometer, inclinometer, temperature streams), plus the ingestion
//! and query plumbing around it.
//!
//! # Architecture
//!
//! - **Codec**: fixed-width little-endian record encoding per sensor kind
//! - **Store**: day-partitioned append-only log files, bounded tail reads,
//!   stateless time-window queries
//! - **Ingest**: TCP line-JSON listener feeding a single-writer router
//!   thread through a bounded queue
//! - **Server**: Axum HTTP API for window queries, ingest counters and
//!   dashboard settings

pub mod codec;
pub mod config;
pub mod ingest;
pub mod server;
pub mod settings;
pub mod store;

pub use codec::{Sample, SensorKind};
pub use ingest::{IngestHandle, IngestRouter, IngestStats};
pub use settings::{Settings, SettingsStore};
pub use store::{LogQuery, LogWriter, Point, QueryResponse, StoreError, WindowQuery};
