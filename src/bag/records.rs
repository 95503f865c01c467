// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Structural record types populated by the first-pass scan.

use tracing::warn;

use crate::core::{BagError, BagTime, Result};
use crate::decode::cursor::PayloadCursor;
use crate::decode::decoder::{build_for_top_type, MessageDecoder};
use crate::io::record::Record;
use crate::io::source::ByteSource;
use crate::schema::{parse_registry, SchemaRegistry};

/// The bag header record: file-level counts and the index position.
#[derive(Debug, Clone)]
pub struct BagHeaderInfo {
    /// Number of chunk records the writer claims to have emitted
    pub chunk_count: i32,
    /// Number of unique connections the writer claims to have emitted
    pub conn_count: i32,
    /// Offset of the first record of the index section
    pub index_pos: u64,
}

impl BagHeaderInfo {
    pub(crate) fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            chunk_count: record.header().i32("chunk_count")?,
            conn_count: record.header().i32("conn_count")?,
            index_pos: record.header().i64("index_pos")? as u64,
        })
    }
}

/// A chunk record's location and compression metadata. The payload is
/// left on disk until a reader asks for it.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Offset of the chunk record within the file
    pub offset: u64,
    /// Compression token: "none", "bz2", or "lz4"
    pub compression: String,
    /// Decompressed payload size in bytes
    pub uncompressed_size: u32,
    /// Compressed (on-disk) payload size in bytes
    pub compressed_size: u32,
}

impl ChunkRecord {
    pub(crate) fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            offset: record.offset(),
            compression: record.header().string("compression")?,
            uncompressed_size: record.header().i32("size")? as u32,
            compressed_size: record.data_len(),
        })
    }
}

/// One connection's contribution to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConnection {
    /// Connection id
    pub conn_id: i32,
    /// Number of messages that connection stored in the chunk
    pub message_count: u32,
}

/// A chunk info record: which connections wrote to a chunk, how many
/// messages each contributed, and the chunk's time bounds.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    /// Record format version
    pub version: i32,
    /// Offset of the chunk record this info describes
    pub chunk_pos: u64,
    /// Earliest message time in the chunk
    pub start_time: BagTime,
    /// Latest message time in the chunk
    pub end_time: BagTime,
    /// Per-connection message counts
    pub connections: Vec<ChunkConnection>,
}

impl ChunkInfo {
    pub(crate) fn from_record(record: &Record, source: &ByteSource) -> Result<Self> {
        let header = record.header();
        let count = header.i32("count")?;
        let data = record.data(source)?;
        let mut cursor = PayloadCursor::new(data);

        let mut connections = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let conn_id = cursor.read_i32()?;
            let message_count = cursor.read_u32()?;
            connections.push(ChunkConnection {
                conn_id,
                message_count,
            });
        }

        Ok(Self {
            version: header.i32("ver")?,
            chunk_pos: header.i64("chunk_pos")? as u64,
            start_time: header.time("start_time")?,
            end_time: header.time("end_time")?,
            connections,
        })
    }

    /// Whether the chunk holds messages for the given connection.
    pub fn has_connection(&self, conn_id: i32) -> bool {
        self.connections.iter().any(|c| c.conn_id == conn_id)
    }

    /// The message count this chunk holds for the given connection.
    pub fn count_for(&self, conn_id: i32) -> u64 {
        self.connections
            .iter()
            .filter(|c| c.conn_id == conn_id)
            .map(|c| c.message_count as u64)
            .sum()
    }

    /// Total messages across all connections in the chunk.
    pub fn message_count(&self) -> u64 {
        self.connections.iter().map(|c| c.message_count as u64).sum()
    }
}

/// One entry of an index data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Receipt time of the message
    pub time: BagTime,
    /// Offset of the message record within its decompressed chunk
    pub offset: u32,
}

/// An index data record: message offsets for one connection within one
/// chunk. Index records are an optimization some writers omit; the
/// per-topic message index is always rebuildable from the chunks.
#[derive(Debug, Clone)]
pub struct IndexData {
    /// Record format version
    pub version: i32,
    /// Connection the entries belong to
    pub conn_id: i32,
    /// Offset of the chunk record the entries point into
    pub chunk_pos: u64,
    /// Message entries
    pub entries: Vec<IndexEntry>,
}

impl IndexData {
    pub(crate) fn from_record(record: &Record, source: &ByteSource, chunk_pos: u64) -> Result<Self> {
        let header = record.header();
        let count = header.i32("count")?;
        let data = record.data(source)?;
        let mut cursor = PayloadCursor::new(data);

        let mut entries = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let time = cursor.read_time()?;
            let offset = cursor.read_u32()?;
            entries.push(IndexEntry { time, offset });
        }

        Ok(Self {
            version: header.i32("ver")?,
            conn_id: header.i32("conn")?,
            chunk_pos,
            entries,
        })
    }
}

/// A connection: one logical stream of same-typed messages on a topic.
///
/// Each connection owns the schema registry built from its embedded
/// message definition; the registry's top type is the connection's type.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Connection id, unique within a file
    pub id: i32,
    /// Topic the connection publishes on
    pub topic: String,
    /// Message type, `package/Name`
    pub message_type: String,
    /// Advertised md5 of the message type
    pub md5sum: String,
    /// The embedded textual schema, with dependencies
    pub message_definition: String,
    /// Name of the publishing node, when recorded
    pub caller_id: Option<String>,
    /// Whether the publisher latched the topic, when recorded
    pub latching: Option<bool>,
    registry: SchemaRegistry,
}

impl Connection {
    /// Parse a connection record. The record's data region is itself a
    /// header map carrying `type`, `md5sum`, `message_definition` and the
    /// optional `callerid`/`latching` fields.
    ///
    /// A definition that fails to parse is logged and leaves the
    /// connection with an empty registry; building a decoder for it will
    /// fail and iteration will skip the connection.
    pub(crate) fn from_record(record: &Record, source: &ByteSource) -> Result<Self> {
        let id = record.header().i32("conn")?;
        let topic = record.header().string("topic")?;

        let data = record.data(source)?;
        let inner = crate::io::header::RecordHeader::parse(data, record.data_offset())?;

        let message_type = inner.string("type")?;
        let md5sum = inner.string("md5sum")?;
        let message_definition = inner.string("message_definition")?;
        let caller_id = inner.string("callerid").ok();
        let latching = inner
            .string("latching")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let registry = match parse_registry(&message_type, &message_definition) {
            Ok(registry) => registry,
            Err(err) => {
                warn!(
                    conn = id,
                    topic = %topic,
                    error = %err,
                    "failed to parse message definition for connection"
                );
                SchemaRegistry::new(&message_type)
            }
        };

        Ok(Self {
            id,
            topic,
            message_type,
            md5sum,
            message_definition,
            caller_id,
            latching,
            registry,
        })
    }

    /// The connection's schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Build a fresh decoder tree for the connection's message type.
    pub fn decoder(&self) -> Result<MessageDecoder> {
        build_for_top_type(&self.registry)
    }
}

/// Summary of one topic: aggregated over its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    /// Topic name, e.g. `/pointcloud2`
    pub name: String,
    /// Message type published on the topic
    pub message_type: String,
    /// md5 of the message type
    pub md5sum: String,
    /// Number of messages recorded on the topic
    pub message_count: u64,
    /// Number of connections that published on the topic
    pub connection_count: u64,
}

/// Convert an index-out-of-bounds on per-topic lookups into the typed
/// error callers match on.
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        Err(BagError::index_out_of_range(index, len))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_header(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in fields {
            out.extend_from_slice(&((name.len() + 1 + value.len()) as u32).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(b'=');
            out.extend_from_slice(value);
        }
        out
    }

    fn encode_record(fields: &[(&str, Vec<u8>)], data: &[u8]) -> Vec<u8> {
        let header = encode_header(fields);
        let mut out = Vec::new();
        out.extend_from_slice(&(header.len() as u32).to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn time_bytes(sec: u32, nsec: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&sec.to_le_bytes());
        out.extend_from_slice(&nsec.to_le_bytes());
        out
    }

    #[test]
    fn test_chunk_info_parsing() {
        let mut data = Vec::new();
        for (conn, count) in [(0i32, 5u32), (1, 7)] {
            data.extend_from_slice(&conn.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
        }
        let bytes = encode_record(
            &[
                ("op", vec![0x06]),
                ("ver", 1i32.to_le_bytes().to_vec()),
                ("chunk_pos", 4096i64.to_le_bytes().to_vec()),
                ("start_time", time_bytes(100, 0)),
                ("end_time", time_bytes(200, 0)),
                ("count", 2i32.to_le_bytes().to_vec()),
            ],
            &data,
        );

        let mut source = ByteSource::from_vec(bytes);
        let record = Record::read(&mut source).unwrap();
        let info = ChunkInfo::from_record(&record, &source).unwrap();

        assert_eq!(info.chunk_pos, 4096);
        assert_eq!(info.connections.len(), 2);
        assert!(info.has_connection(1));
        assert!(!info.has_connection(9));
        assert_eq!(info.count_for(0), 5);
        assert_eq!(info.message_count(), 12);
    }

    #[test]
    fn test_index_data_parsing() {
        let mut data = Vec::new();
        data.extend(time_bytes(100, 50));
        data.extend_from_slice(&64u32.to_le_bytes());

        let bytes = encode_record(
            &[
                ("op", vec![0x04]),
                ("ver", 1i32.to_le_bytes().to_vec()),
                ("conn", 3i32.to_le_bytes().to_vec()),
                ("count", 1i32.to_le_bytes().to_vec()),
            ],
            &data,
        );

        let mut source = ByteSource::from_vec(bytes);
        let record = Record::read(&mut source).unwrap();
        let index = IndexData::from_record(&record, &source, 4096).unwrap();

        assert_eq!(index.conn_id, 3);
        assert_eq!(index.chunk_pos, 4096);
        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].time, BagTime::new(100, 50));
        assert_eq!(index.entries[0].offset, 64);
    }

    #[test]
    fn test_connection_parsing() {
        let inner = encode_header(&[
            ("type", b"std_msgs/UInt8".to_vec()),
            ("md5sum", b"7c8164229e7d2c17eb95e9231617fdee".to_vec()),
            ("message_definition", b"uint8 data".to_vec()),
            ("callerid", b"/talker".to_vec()),
            ("latching", b"1".to_vec()),
        ]);
        let bytes = encode_record(
            &[
                ("op", vec![0x07]),
                ("conn", 0i32.to_le_bytes().to_vec()),
                ("topic", b"/data".to_vec()),
            ],
            &inner,
        );

        let mut source = ByteSource::from_vec(bytes);
        let record = Record::read(&mut source).unwrap();
        let conn = Connection::from_record(&record, &source).unwrap();

        assert_eq!(conn.id, 0);
        assert_eq!(conn.topic, "/data");
        assert_eq!(conn.message_type, "std_msgs/UInt8");
        assert_eq!(conn.caller_id.as_deref(), Some("/talker"));
        assert_eq!(conn.latching, Some(true));
        assert_eq!(conn.registry().len(), 1);
        assert!(conn.decoder().is_ok());
    }

    #[test]
    fn test_connection_with_bad_definition_has_empty_registry() {
        let inner = encode_header(&[
            ("type", b"std_msgs/UInt8".to_vec()),
            ("md5sum", b"0".repeat(32)),
            ("message_definition", b"!!! not parseable".to_vec()),
        ]);
        let bytes = encode_record(
            &[
                ("op", vec![0x07]),
                ("conn", 0i32.to_le_bytes().to_vec()),
                ("topic", b"/data".to_vec()),
            ],
            &inner,
        );

        let mut source = ByteSource::from_vec(bytes);
        let record = Record::read(&mut source).unwrap();
        let conn = Connection::from_record(&record, &source).unwrap();

        assert!(conn.registry().is_empty());
        assert!(conn.decoder().is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(check_index(2, 3).is_ok());
        assert!(matches!(
            check_index(3, 3).unwrap_err(),
            BagError::IndexOutOfRange { index: 3, len: 3 }
        ));
    }
}
