// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for bagcodec.
//!
//! Every failure the decoder can report is a variant of [`BagError`]:
//! - File-level problems (bad magic, missing index)
//! - Framing and header corruption
//! - Schema parsing and resolution failures
//! - Decode-time failures (truncated payloads, uninitialized fields)

use std::fmt;

/// Errors that can occur while reading and decoding a bag file.
#[derive(Debug, Clone)]
pub enum BagError {
    /// The file does not start with the bag magic.
    NotABag {
        /// What was found in place of the magic
        found: String,
    },

    /// The bag header's `index_pos` is zero; the file was not closed
    /// cleanly and must be reindexed before it can be read.
    Unindexed,

    /// Structural corruption: oversized header, bad op code, framing
    /// that does not add up.
    Corrupt {
        /// File or buffer offset where the problem was detected
        offset: u64,
        /// What went wrong
        reason: String,
    },

    /// The stream ended before a read could be satisfied.
    Truncated {
        /// Offset of the attempted read
        offset: u64,
        /// Bytes requested
        requested: usize,
        /// Bytes available
        available: usize,
    },

    /// A message definition could not be parsed.
    InvalidDefinition {
        /// Why the definition was rejected
        reason: String,
    },

    /// A schema refers to a nested message type that is not present in
    /// its registry.
    UnknownMessage {
        /// The type name that could not be resolved
        type_name: String,
    },

    /// A header accessor asked for a key that is not present.
    UnknownField {
        /// The missing key
        name: String,
        /// The keys that are present, comma separated
        available: String,
    },

    /// A decoded field was queried before any message was decoded into it.
    UninitializedField {
        /// The field that was queried
        name: String,
    },

    /// A numeric index exceeded the per-topic message count.
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// The number of messages available
        len: usize,
    },

    /// The underlying codec stream failed or produced the wrong number
    /// of bytes.
    DecompressionFailure {
        /// Compression token ("bz2", "lz4", ...)
        codec: String,
        /// What went wrong
        reason: String,
    },

    /// I/O error from the operating system.
    Io(String),
}

impl BagError {
    /// Create a magic-mismatch error.
    pub fn not_a_bag(found: impl Into<String>) -> Self {
        BagError::NotABag {
            found: found.into(),
        }
    }

    /// Create a corruption error at a known offset.
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        BagError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a short-read error.
    pub fn truncated(offset: u64, requested: usize, available: usize) -> Self {
        BagError::Truncated {
            offset,
            requested,
            available,
        }
    }

    /// Create an invalid-definition error.
    pub fn invalid_definition(reason: impl Into<String>) -> Self {
        BagError::InvalidDefinition {
            reason: reason.into(),
        }
    }

    /// Create an unknown-message error.
    pub fn unknown_message(type_name: impl Into<String>) -> Self {
        BagError::UnknownMessage {
            type_name: type_name.into(),
        }
    }

    /// Create an unknown-field error listing the keys that were present.
    pub fn unknown_field(name: impl Into<String>, available: impl Into<String>) -> Self {
        BagError::UnknownField {
            name: name.into(),
            available: available.into(),
        }
    }

    /// Create an uninitialized-field error.
    pub fn uninitialized(name: impl Into<String>) -> Self {
        BagError::UninitializedField { name: name.into() }
    }

    /// Create an index-out-of-range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        BagError::IndexOutOfRange { index, len }
    }

    /// Create a decompression error.
    pub fn decompression(codec: impl Into<String>, reason: impl Into<String>) -> Self {
        BagError::DecompressionFailure {
            codec: codec.into(),
            reason: reason.into(),
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            BagError::NotABag { found } => vec![("found", found.clone())],
            BagError::Unindexed => vec![],
            BagError::Corrupt { offset, reason } => {
                vec![("offset", offset.to_string()), ("reason", reason.clone())]
            }
            BagError::Truncated {
                offset,
                requested,
                available,
            } => vec![
                ("offset", offset.to_string()),
                ("requested", requested.to_string()),
                ("available", available.to_string()),
            ],
            BagError::InvalidDefinition { reason } => vec![("reason", reason.clone())],
            BagError::UnknownMessage { type_name } => vec![("type", type_name.clone())],
            BagError::UnknownField { name, available } => {
                vec![("field", name.clone()), ("available", available.clone())]
            }
            BagError::UninitializedField { name } => vec![("field", name.clone())],
            BagError::IndexOutOfRange { index, len } => {
                vec![("index", index.to_string()), ("len", len.to_string())]
            }
            BagError::DecompressionFailure { codec, reason } => {
                vec![("codec", codec.clone()), ("reason", reason.clone())]
            }
            BagError::Io(msg) => vec![("message", msg.clone())],
        }
    }
}

impl fmt::Display for BagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagError::NotABag { found } => {
                write!(f, "Not a bag file: expected \"#ROSBAG V2.0\", found {found}")
            }
            BagError::Unindexed => {
                write!(f, "Bag file has no index (index_pos is 0); it must be reindexed")
            }
            BagError::Corrupt { offset, reason } => {
                write!(f, "Corrupt record at offset {offset}: {reason}")
            }
            BagError::Truncated {
                offset,
                requested,
                available,
            } => write!(
                f,
                "Truncated stream at offset {offset}: requested {requested} bytes, only {available} available"
            ),
            BagError::InvalidDefinition { reason } => {
                write!(f, "Invalid message definition: {reason}")
            }
            BagError::UnknownMessage { type_name } => {
                write!(f, "Unknown message type: '{type_name}'")
            }
            BagError::UnknownField { name, available } => {
                write!(f, "Unknown field: {name}; valid fields are: {available}")
            }
            BagError::UninitializedField { name } => {
                write!(f, "Field '{name}' was read before any message was decoded")
            }
            BagError::IndexOutOfRange { index, len } => {
                write!(f, "Message index {index} is out of range (0..{len})")
            }
            BagError::DecompressionFailure { codec, reason } => {
                write!(f, "{codec} decompression failed: {reason}")
            }
            BagError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BagError {}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        BagError::Io(err.to_string())
    }
}

/// Result type for bagcodec operations.
pub type Result<T> = std::result::Result<T, BagError>;
