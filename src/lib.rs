// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # bagcodec
//!
//! Read-only decoder for ROS1 bag files (format version 2.0).
//!
//! A bag file is a sequence of framed records: a bag header, compressed
//! chunks of serialized messages, connection declarations carrying
//! embedded textual schemas, and index records. This crate exposes both
//! a structural view (records, connections, topics, counts, time range)
//! and message-by-message decoding with typed field extraction.
//!
//! ## Architecture
//!
//! - `io/` - byte sources, record framing, header maps, chunk
//!   decompression (none / bz2 / lz4 frame)
//! - `schema/` - the embedded message-definition grammar, forward
//!   reference resolution, and canonical md5 computation
//! - `decode/` - schema-driven decoder trees and the per-connection
//!   message iterator
//! - `bag/` - the first-pass structural scan and the [`BagFile`] surface
//!
//! ## Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bagcodec::{BagFile, Visit};
//!
//! let bag = BagFile::open("flight.bag")?;
//! println!("{} messages over {:.1}s", bag.message_count()?, bag.duration_seconds());
//!
//! bag.for_messages_on_topic("/gps/fix", |conn, message| {
//!     let lat = message.field("latitude").unwrap().value().unwrap();
//!     println!("{}: {lat}", conn.topic);
//!     Visit::Continue
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Decoded messages are owned by their iterator and overwritten on every
//! pull; extract what you need inside the visitor.

pub mod bag;
pub mod core;
pub mod decode;
pub mod io;
pub mod schema;

pub use bag::{
    BagFile, BagHeaderInfo, ChunkConnection, ChunkInfo, ChunkRecord, Connection, IndexData,
    IndexEntry, MessageIndex, TopicInfo, Visit, BAG_MAGIC,
};
pub use core::{BagDuration, BagError, BagTime, FieldValue, Result};
pub use decode::{ArrayField, Field, MessageDecoder, MessageIterator};
pub use io::{ByteSource, Record, RecordHeader, RecordKind};
pub use schema::{FieldKind, FieldSpec, Schema, SchemaField, SchemaRegistry};

/// A decoded message. Alias for the reusable decoder tree, which holds
/// the decoded values of the most recent message.
pub type Message = MessageDecoder;
