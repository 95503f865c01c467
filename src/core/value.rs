// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decoded value types.
//!
//! Provides a unified value representation for primitive message fields
//! decoded from the ros1msg wire format. All variants are serde-serializable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A ROS timestamp: unsigned seconds and nanoseconds since the Unix epoch.
///
/// This is the exact wire representation; both halves are little-endian
/// `u32` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagTime {
    /// Seconds since the Unix epoch
    pub sec: u32,
    /// Nanoseconds within the second
    pub nsec: u32,
}

impl BagTime {
    /// Create a timestamp from seconds and nanoseconds.
    pub fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// Total nanoseconds since the Unix epoch.
    pub fn as_nanos(&self) -> u64 {
        (self.sec as u64) * 1_000_000_000 + self.nsec as u64
    }

    /// Milliseconds since the Unix epoch, truncating sub-millisecond digits.
    pub fn as_millis(&self) -> u64 {
        (self.sec as u64) * 1000 + (self.nsec as u64) / 1_000_000
    }

    /// Seconds since the Unix epoch as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 / 1e9
    }

    /// Whether this is the zero timestamp.
    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }
}

impl PartialOrd for BagTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BagTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.sec, self.nsec).cmp(&(other.sec, other.nsec))
    }
}

impl fmt::Display for BagTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// A ROS duration: signed seconds and nanoseconds.
///
/// Serialized as two little-endian `i32` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagDuration {
    /// Whole seconds (may be negative)
    pub sec: i32,
    /// Nanoseconds (may be negative)
    pub nsec: i32,
}

impl BagDuration {
    /// Create a duration from seconds and nanoseconds.
    pub fn new(sec: i32, nsec: i32) -> Self {
        Self { sec, nsec }
    }

    /// The duration in seconds as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 / 1e9
    }
}

impl fmt::Display for BagDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}

/// A decoded primitive field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),

    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),

    Float32(f32),
    Float64(f64),

    /// UTF-8 string (length-prefixed on the wire)
    String(String),

    Time(BagTime),
    Duration(BagDuration),
}

impl FieldValue {
    /// Check if this value is a numeric type (integers or floats).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldValue::Int8(_)
                | FieldValue::Int16(_)
                | FieldValue::Int32(_)
                | FieldValue::Int64(_)
                | FieldValue::UInt8(_)
                | FieldValue::UInt16(_)
                | FieldValue::UInt32(_)
                | FieldValue::UInt64(_)
                | FieldValue::Float32(_)
                | FieldValue::Float64(_)
        )
    }

    /// Try to convert this value to f64 (for numeric values only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int8(v) => Some(*v as f64),
            FieldValue::Int16(v) => Some(*v as f64),
            FieldValue::Int32(v) => Some(*v as f64),
            FieldValue::Int64(v) => Some(*v as f64),
            FieldValue::UInt8(v) => Some(*v as f64),
            FieldValue::UInt16(v) => Some(*v as f64),
            FieldValue::UInt32(v) => Some(*v as f64),
            FieldValue::UInt64(v) => Some(*v as f64),
            FieldValue::Float32(v) => Some(*v as f64),
            FieldValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert this value to i64. Returns `None` for non-integers
    /// and for `u64` values above `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int8(v) => Some(*v as i64),
            FieldValue::Int16(v) => Some(*v as i64),
            FieldValue::Int32(v) => Some(*v as i64),
            FieldValue::Int64(v) => Some(*v),
            FieldValue::UInt8(v) => Some(*v as i64),
            FieldValue::UInt16(v) => Some(*v as i64),
            FieldValue::UInt32(v) => Some(*v as i64),
            FieldValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to convert this value to u64 (non-negative integers only).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            FieldValue::Int8(v) => u64::try_from(*v).ok(),
            FieldValue::Int16(v) => u64::try_from(*v).ok(),
            FieldValue::Int32(v) => u64::try_from(*v).ok(),
            FieldValue::Int64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get the inner boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the inner string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the inner timestamp.
    pub fn as_time(&self) -> Option<BagTime> {
        match self {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to get the inner duration.
    pub fn as_duration(&self) -> Option<BagDuration> {
        match self {
            FieldValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int8(_) => "int8",
            FieldValue::Int16(_) => "int16",
            FieldValue::Int32(_) => "int32",
            FieldValue::Int64(_) => "int64",
            FieldValue::UInt8(_) => "uint8",
            FieldValue::UInt16(_) => "uint16",
            FieldValue::UInt32(_) => "uint32",
            FieldValue::UInt64(_) => "uint64",
            FieldValue::Float32(_) => "float32",
            FieldValue::Float64(_) => "float64",
            FieldValue::String(_) => "string",
            FieldValue::Time(_) => "time",
            FieldValue::Duration(_) => "duration",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::Int16(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Float32(v) => write!(f, "{v}"),
            FieldValue::Float64(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "\"{v}\""),
            FieldValue::Time(v) => write!(f, "{v}"),
            FieldValue::Duration(v) => write!(f, "{v}"),
        }
    }
}
