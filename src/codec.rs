//! Fixed-width binary record codec.
//!
//! Every sensor kind has a constant record layout: an 8-byte `f64` epoch
//! timestamp followed by one `f32` per measured channel, all little-endian,
//! no padding. Constant record size is what makes tail-bounded reads valid:
//! the last K records of a file are exactly its last `K * record_size` bytes.
//!
//! | kind          | fields                        | size |
//! |---------------|-------------------------------|------|
//! | accelerometer | ts:f64, ax:f32, ay:f32, az:f32| 20   |
//! | inclinometer  | ts:f64, pitch:f32, roll:f32   | 16   |
//! | temperature   | ts:f64, value:f32             | 12   |

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Sensor kinds recorded by the logger.
///
/// String forms (`"accelerometer"`, ...) are used in the HTTP API; the short
/// prefixes (`accel`, `inclin`, `temp`) are used in file names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SensorKind {
    Accelerometer,
    Inclinometer,
    Temperature,
}

impl SensorKind {
    /// All kinds, in file-prefix order.
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Accelerometer,
        SensorKind::Inclinometer,
        SensorKind::Temperature,
    ];

    /// Encoded record size in bytes.
    pub const fn record_size(self) -> usize {
        match self {
            SensorKind::Accelerometer => 20,
            SensorKind::Inclinometer => 16,
            SensorKind::Temperature => 12,
        }
    }

    /// Short prefix used in day-partitioned file names.
    pub const fn file_prefix(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "accel",
            SensorKind::Inclinometer => "inclin",
            SensorKind::Temperature => "temp",
        }
    }

    /// Measurement unit reported in query responses.
    pub const fn unit(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "g",
            SensorKind::Inclinometer => "deg",
            SensorKind::Temperature => "degC",
        }
    }

    /// Channel names, in record field order.
    pub const fn channels(self) -> &'static [&'static str] {
        match self {
            SensorKind::Accelerometer => &["x", "y", "z"],
            SensorKind::Inclinometer => &["pitch", "roll"],
            SensorKind::Temperature => &["value"],
        }
    }

    /// Channel used when a query does not name one.
    pub const fn default_channel(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "x",
            SensorKind::Inclinometer => "pitch",
            SensorKind::Temperature => "value",
        }
    }
}

/// One decoded sensor reading.
///
/// Timestamps are `f64` seconds since the Unix epoch, UTC. Values are stored
/// at `f32` precision; encoding a `Sample` and decoding it back is exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Accelerometer { ts: f64, ax: f32, ay: f32, az: f32 },
    Inclinometer { ts: f64, pitch: f32, roll: f32 },
    Temperature { ts: f64, value: f32 },
}

impl Sample {
    pub fn kind(&self) -> SensorKind {
        match self {
            Sample::Accelerometer { .. } => SensorKind::Accelerometer,
            Sample::Inclinometer { .. } => SensorKind::Inclinometer,
            Sample::Temperature { .. } => SensorKind::Temperature,
        }
    }

    /// Epoch-seconds timestamp of this reading.
    pub fn ts(&self) -> f64 {
        match *self {
            Sample::Accelerometer { ts, .. }
            | Sample::Inclinometer { ts, .. }
            | Sample::Temperature { ts, .. } => ts,
        }
    }

    /// Project one named channel. Unknown names yield `None`; callers treat
    /// that as an empty result rather than an error.
    pub fn channel(&self, name: &str) -> Option<f64> {
        let v = match (*self, name) {
            (Sample::Accelerometer { ax, .. }, "x") => ax,
            (Sample::Accelerometer { ay, .. }, "y") => ay,
            (Sample::Accelerometer { az, .. }, "z") => az,
            (Sample::Inclinometer { pitch, .. }, "pitch") => pitch,
            (Sample::Inclinometer { roll, .. }, "roll") => roll,
            (Sample::Temperature { value, .. }, "value") => value,
            _ => return None,
        };
        Some(f64::from(v))
    }

    /// Encode into the fixed-width little-endian record for this kind.
    ///
    /// Never fails; the returned buffer is exactly `kind().record_size()`
    /// bytes long.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.kind().record_size());
        buf.extend_from_slice(&self.ts().to_le_bytes());
        match *self {
            Sample::Accelerometer { ax, ay, az, .. } => {
                buf.extend_from_slice(&ax.to_le_bytes());
                buf.extend_from_slice(&ay.to_le_bytes());
                buf.extend_from_slice(&az.to_le_bytes());
            }
            Sample::Inclinometer { pitch, roll, .. } => {
                buf.extend_from_slice(&pitch.to_le_bytes());
                buf.extend_from_slice(&roll.to_le_bytes());
            }
            Sample::Temperature { value, .. } => {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        buf
    }

    /// Decode every full record in `buf`, in file order.
    ///
    /// A trailing partial record (file caught mid-append, or a buffer cut at
    /// an arbitrary byte offset) is silently discarded.
    pub fn decode_all(kind: SensorKind, buf: &[u8]) -> Vec<Sample> {
        buf.chunks_exact(kind.record_size())
            .map(|rec| Sample::decode_record(kind, rec))
            .collect()
    }

    /// Decode one record. `rec` must be exactly `kind.record_size()` bytes;
    /// `decode_all` guarantees this via `chunks_exact`.
    fn decode_record(kind: SensorKind, rec: &[u8]) -> Sample {
        let ts = f64::from_le_bytes(rec[0..8].try_into().expect("record stride"));
        match kind {
            SensorKind::Accelerometer => Sample::Accelerometer {
                ts,
                ax: read_f32(rec, 8),
                ay: read_f32(rec, 12),
                az: read_f32(rec, 16),
            },
            SensorKind::Inclinometer => Sample::Inclinometer {
                ts,
                pitch: read_f32(rec, 8),
                roll: read_f32(rec, 12),
            },
            SensorKind::Temperature => Sample::Temperature {
                ts,
                value: read_f32(rec, 8),
            },
        }
    }
}

fn read_f32(rec: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(rec[at..at + 4].try_into().expect("record stride"))
}
