//! Telemetry ingestion.
//!
//! Flow: transport connection → [`run_listener`] (one line, one frame) →
//! bounded MPSC queue → [`IngestRouter`] thread → per-(kind, node)
//! [`crate::store::LogWriter`]. Every frame that does not make it to disk
//! is counted in [`IngestStats`] with its reason logged.

mod frame;
mod listener;
mod router;

pub use frame::{parse_node_id, DropReason, Frame};
pub(crate) use frame::is_safe_node_id;
pub use listener::run_listener;
pub use router::{IngestHandle, IngestRouter, IngestStats, IngestStatsSnapshot};
