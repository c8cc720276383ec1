//! Canonical inbound telemetry frame.
//!
//! One JSON object per frame:
//!
//! ```json
//! {"topic": "shm/node-3", "t": 1700000000.25,
//!  "a": [0.1, 0.2, 0.98], "i": [1.2, -0.4], "T": 21.5}
//! ```
//!
//! - `t` — epoch-seconds timestamp, required
//! - `topic` — optional `<prefix>/<node>` addressing; absent means the
//!   node-less global stream
//! - `a` / `i` / `T` — per-kind payloads, each optional and routed
//!   independently; `null` means "sensor had no valid reading" and is
//!   treated as absent (field nodes emit `null` rather than omitting keys)
//!
//! Anything deviating from this shape is a counted drop, never a crash and
//! never a silent discard. A malformed per-kind payload drops only that
//! kind's contribution; the rest of the frame still routes.

use serde_json::Value;
use strum_macros::{AsRefStr, Display};

use crate::codec::{Sample, SensorKind};

/// Why an inbound frame (or one kind within it) was not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    /// Payload is not a JSON object.
    MalformedPayload,
    /// `t` missing, non-numeric or non-finite; nothing can be stored
    /// without a timestamp.
    MissingTimestamp,
    /// `topic` present but not exactly `<prefix>/<node>`, or the node
    /// segment is not a safe file-name component.
    MalformedTopic,
    /// A per-kind field had the wrong arity or type; only that kind is
    /// dropped.
    BadKindPayload,
    /// The bounded ingest queue was full.
    QueueFull,
}

/// A parsed frame: node identity plus zero or more samples sharing one
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub node: Option<String>,
    pub samples: Vec<Sample>,
    /// Kinds the frame nominally targeted but whose payloads were unusable.
    pub bad_kinds: Vec<SensorKind>,
}

impl Frame {
    /// Parse one frame. A returned error means the whole frame is dropped
    /// for that reason; per-kind problems land in `bad_kinds` instead.
    pub fn parse(payload: &[u8]) -> Result<Frame, DropReason> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|_| DropReason::MalformedPayload)?;
        let obj = value.as_object().ok_or(DropReason::MalformedPayload)?;

        let ts = obj
            .get("t")
            .and_then(Value::as_f64)
            .filter(|t| t.is_finite())
            .ok_or(DropReason::MissingTimestamp)?;

        let node = match obj.get("topic") {
            None | Some(Value::Null) => None,
            Some(Value::String(topic)) => Some(parse_node_id(topic)?),
            Some(_) => return Err(DropReason::MalformedTopic),
        };

        let mut samples = Vec::new();
        let mut bad_kinds = Vec::new();

        match present(obj.get("a")) {
            FieldState::Absent => {}
            FieldState::Present(v) => match float_array::<3>(v) {
                Some([ax, ay, az]) => samples.push(Sample::Accelerometer { ts, ax, ay, az }),
                None => bad_kinds.push(SensorKind::Accelerometer),
            },
        }

        match present(obj.get("i")) {
            FieldState::Absent => {}
            FieldState::Present(v) => match float_array::<2>(v) {
                Some([pitch, roll]) => samples.push(Sample::Inclinometer { ts, pitch, roll }),
                None => bad_kinds.push(SensorKind::Inclinometer),
            },
        }

        match present(obj.get("T")) {
            FieldState::Absent => {}
            FieldState::Present(v) => match v.as_f64().filter(|t| t.is_finite()) {
                Some(value) => samples.push(Sample::Temperature {
                    ts,
                    value: value as f32,
                }),
                None => bad_kinds.push(SensorKind::Temperature),
            },
        }

        Ok(Frame {
            node,
            samples,
            bad_kinds,
        })
    }
}

enum FieldState<'a> {
    Absent,
    Present(&'a Value),
}

/// `null` payloads mean "no valid reading this cycle" and count as absent.
fn present(v: Option<&Value>) -> FieldState<'_> {
    match v {
        None | Some(Value::Null) => FieldState::Absent,
        Some(v) => FieldState::Present(v),
    }
}

/// Exactly N finite numbers, or nothing.
fn float_array<const N: usize>(v: &Value) -> Option<[f32; N]> {
    let arr = v.as_array()?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0f32; N];
    for (slot, item) in out.iter_mut().zip(arr) {
        let f = item.as_f64().filter(|f| f.is_finite())?;
        *slot = f as f32;
    }
    Some(out)
}

/// Extract the node identity from a `<prefix>/<node>` topic.
///
/// Exactly two non-empty segments are expected, and the node segment must be
/// usable as a file-name component (`[A-Za-z0-9_-]+`); node ids end up in
/// log file paths, so nothing else gets through.
pub fn parse_node_id(topic: &str) -> Result<String, DropReason> {
    let mut parts = topic.split('/');
    let (prefix, node) = match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(node), None) => (prefix, node),
        _ => return Err(DropReason::MalformedTopic),
    };

    if prefix.is_empty() || node.is_empty() || !is_safe_node_id(node) {
        return Err(DropReason::MalformedTopic);
    }
    Ok(node.to_string())
}

pub(crate) fn is_safe_node_id(node: &str) -> bool {
    node.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
