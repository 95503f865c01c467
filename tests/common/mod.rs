// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests: an in-memory bag fixture
//! builder producing byte-exact v2.0 files.

#![allow(dead_code)]

use std::io::Write;

use bagcodec::schema::parse_registry;

/// A connection to declare in a fixture bag.
#[derive(Debug, Clone)]
pub struct FixtureConnection {
    pub id: i32,
    pub topic: String,
    pub message_type: String,
    pub definition: String,
    /// Advertised md5; `None` computes the canonical sum from the
    /// definition, falling back to zeros when it does not parse.
    pub md5sum: Option<String>,
    pub caller_id: Option<String>,
    pub latching: Option<bool>,
}

impl FixtureConnection {
    pub fn new(id: i32, topic: &str, message_type: &str, definition: &str) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
            definition: definition.to_string(),
            md5sum: None,
            caller_id: Some("/test_publisher".to_string()),
            latching: None,
        }
    }

    fn advertised_md5(&self) -> String {
        if let Some(md5) = &self.md5sum {
            return md5.clone();
        }
        parse_registry(&self.message_type, &self.definition)
            .ok()
            .and_then(|registry| registry.top().ok())
            .map(|schema| schema.md5.clone())
            .unwrap_or_else(|| "0".repeat(32))
    }
}

/// One message to store in a fixture bag.
#[derive(Debug, Clone)]
pub struct FixtureMessage {
    pub conn_id: i32,
    pub sec: u32,
    pub nsec: u32,
    pub payload: Vec<u8>,
}

impl FixtureMessage {
    pub fn new(conn_id: i32, sec: u32, payload: Vec<u8>) -> Self {
        Self {
            conn_id,
            sec,
            nsec: 0,
            payload,
        }
    }
}

/// Builds complete v2.0 bag files in memory.
pub struct BagBuilder {
    connections: Vec<FixtureConnection>,
    /// Each entry becomes one chunk
    chunks: Vec<Vec<FixtureMessage>>,
    compression: &'static str,
    with_index_data: bool,
}

const OP_MESSAGE_DATA: u8 = 0x02;
const OP_BAG_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

impl BagBuilder {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            chunks: Vec::new(),
            compression: "none",
            with_index_data: false,
        }
    }

    pub fn compression(mut self, compression: &'static str) -> Self {
        self.compression = compression;
        self
    }

    /// Also emit INDEX_DATA records after each chunk.
    pub fn with_index_data(mut self) -> Self {
        self.with_index_data = true;
        self
    }

    pub fn connection(mut self, conn: FixtureConnection) -> Self {
        self.connections.push(conn);
        self
    }

    /// Add a chunk holding the given messages.
    pub fn chunk(mut self, messages: Vec<FixtureMessage>) -> Self {
        self.chunks.push(messages);
        self
    }

    /// Serialize the bag.
    pub fn build(self) -> Vec<u8> {
        // The bag header record has fixed-width fields, so its size is
        // known before the index position is.
        let bag_header_len = record_len(&[
            ("op", 1),
            ("chunk_count", 4),
            ("conn_count", 4),
            ("index_pos", 8),
        ]);

        // Chunks section, tracking each chunk's absolute position and
        // its per-connection counts, times, and message offsets.
        let chunks_base = 13 + bag_header_len;
        let mut chunks_section: Vec<u8> = Vec::new();
        let mut chunk_summaries = Vec::new();

        for messages in &self.chunks {
            let chunk_pos = chunks_base + chunks_section.len() as u64;

            let mut inner: Vec<u8> = Vec::new();
            let mut offsets: Vec<(i32, u32, u32, u32)> = Vec::new(); // conn, sec, nsec, offset
            for msg in messages {
                offsets.push((msg.conn_id, msg.sec, msg.nsec, inner.len() as u32));
                let mut time = Vec::new();
                time.extend_from_slice(&msg.sec.to_le_bytes());
                time.extend_from_slice(&msg.nsec.to_le_bytes());
                write_record(
                    &mut inner,
                    &[
                        ("op", vec![OP_MESSAGE_DATA]),
                        ("conn", msg.conn_id.to_le_bytes().to_vec()),
                        ("time", time),
                    ],
                    &msg.payload,
                );
            }

            let uncompressed_size = inner.len() as u32;
            let stored = compress(self.compression, &inner);
            write_record(
                &mut chunks_section,
                &[
                    ("op", vec![OP_CHUNK]),
                    ("compression", self.compression.as_bytes().to_vec()),
                    ("size", uncompressed_size.to_le_bytes().to_vec()),
                ],
                &stored,
            );

            if self.with_index_data {
                let mut conn_ids: Vec<i32> = offsets.iter().map(|o| o.0).collect();
                conn_ids.sort_unstable();
                conn_ids.dedup();
                for conn_id in conn_ids {
                    let entries: Vec<&(i32, u32, u32, u32)> =
                        offsets.iter().filter(|o| o.0 == conn_id).collect();
                    let mut data = Vec::new();
                    for (_, sec, nsec, offset) in entries.iter() {
                        data.extend_from_slice(&sec.to_le_bytes());
                        data.extend_from_slice(&nsec.to_le_bytes());
                        data.extend_from_slice(&offset.to_le_bytes());
                    }
                    write_record(
                        &mut chunks_section,
                        &[
                            ("op", vec![OP_INDEX_DATA]),
                            ("ver", 1i32.to_le_bytes().to_vec()),
                            ("conn", conn_id.to_le_bytes().to_vec()),
                            ("count", (entries.len() as i32).to_le_bytes().to_vec()),
                        ],
                        &data,
                    );
                }
            }

            chunk_summaries.push((chunk_pos, messages.clone()));
        }

        // Index section: connection records then chunk infos.
        let mut index_section: Vec<u8> = Vec::new();
        for conn in &self.connections {
            let mut inner = Vec::new();
            write_field(&mut inner, "topic", conn.topic.as_bytes());
            write_field(&mut inner, "type", conn.message_type.as_bytes());
            write_field(&mut inner, "md5sum", conn.advertised_md5().as_bytes());
            write_field(
                &mut inner,
                "message_definition",
                conn.definition.as_bytes(),
            );
            if let Some(caller_id) = &conn.caller_id {
                write_field(&mut inner, "callerid", caller_id.as_bytes());
            }
            if let Some(latching) = conn.latching {
                write_field(&mut inner, "latching", if latching { b"1" } else { b"0" });
            }
            write_record(
                &mut index_section,
                &[
                    ("op", vec![OP_CONNECTION]),
                    ("conn", conn.id.to_le_bytes().to_vec()),
                    ("topic", conn.topic.as_bytes().to_vec()),
                ],
                &inner,
            );
        }

        for (chunk_pos, messages) in &chunk_summaries {
            let start = messages
                .iter()
                .map(|m| (m.sec, m.nsec))
                .min()
                .unwrap_or((0, 0));
            let end = messages
                .iter()
                .map(|m| (m.sec, m.nsec))
                .max()
                .unwrap_or((0, 0));

            let mut counts: Vec<(i32, u32)> = Vec::new();
            for msg in messages {
                match counts.iter_mut().find(|(id, _)| *id == msg.conn_id) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((msg.conn_id, 1)),
                }
            }

            let mut data = Vec::new();
            for (conn_id, count) in &counts {
                data.extend_from_slice(&conn_id.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
            }
            let mut start_bytes = Vec::new();
            start_bytes.extend_from_slice(&start.0.to_le_bytes());
            start_bytes.extend_from_slice(&start.1.to_le_bytes());
            let mut end_bytes = Vec::new();
            end_bytes.extend_from_slice(&end.0.to_le_bytes());
            end_bytes.extend_from_slice(&end.1.to_le_bytes());

            write_record(
                &mut index_section,
                &[
                    ("op", vec![OP_CHUNK_INFO]),
                    ("ver", 1i32.to_le_bytes().to_vec()),
                    ("chunk_pos", (*chunk_pos as i64).to_le_bytes().to_vec()),
                    ("start_time", start_bytes),
                    ("end_time", end_bytes),
                    ("count", (counts.len() as i32).to_le_bytes().to_vec()),
                ],
                &data,
            );
        }

        let index_pos = chunks_base + chunks_section.len() as u64;

        let mut out = Vec::new();
        out.extend_from_slice(b"#ROSBAG V2.0\n");
        write_record(
            &mut out,
            &[
                ("op", vec![OP_BAG_HEADER]),
                (
                    "chunk_count",
                    (self.chunks.len() as i32).to_le_bytes().to_vec(),
                ),
                (
                    "conn_count",
                    (self.connections.len() as i32).to_le_bytes().to_vec(),
                ),
                ("index_pos", (index_pos as i64).to_le_bytes().to_vec()),
            ],
            &[],
        );
        debug_assert_eq!(out.len() as u64, chunks_base);
        out.extend_from_slice(&chunks_section);
        out.extend_from_slice(&index_section);
        out
    }
}

pub fn write_field(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(&((name.len() + 1 + value.len()) as u32).to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value);
}

pub fn write_record(out: &mut Vec<u8>, fields: &[(&str, Vec<u8>)], data: &[u8]) {
    let mut header = Vec::new();
    for (name, value) in fields {
        write_field(&mut header, name, value);
    }
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

/// The encoded size of a record whose field value widths are known.
fn record_len(fields: &[(&str, usize)]) -> u64 {
    let header: usize = fields
        .iter()
        .map(|(name, width)| 4 + name.len() + 1 + width)
        .sum();
    (4 + header + 4) as u64
}

fn compress(compression: &str, data: &[u8]) -> Vec<u8> {
    match compression {
        "none" => data.to_vec(),
        "bz2" => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(data).expect("bz2 encode");
            encoder.finish().expect("bz2 finish")
        }
        "lz4" => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
            encoder.write_all(data).expect("lz4 encode");
            encoder.finish().expect("lz4 finish")
        }
        other => panic!("unsupported fixture compression: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Payload serialization helpers (ros1msg wire format)
// ---------------------------------------------------------------------------

/// Serialize a length-prefixed string.
pub fn ser_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Serialize a `std_msgs` Header: seq, stamp, frame_id.
pub fn ser_header(out: &mut Vec<u8>, seq: u32, sec: u32, nsec: u32, frame_id: &str) {
    out.extend_from_slice(&seq.to_le_bytes());
    out.extend_from_slice(&sec.to_le_bytes());
    out.extend_from_slice(&nsec.to_le_bytes());
    ser_string(out, frame_id);
}

// ---------------------------------------------------------------------------
// Message definitions used by fixtures
// ---------------------------------------------------------------------------

pub const SEPARATOR: &str =
    "================================================================================";

pub const HEADER_DEFINITION: &str = "\
uint32 seq
time stamp
string frame_id";

/// `std_msgs/XMultiArray` definition for the given element type, with
/// its nested layout dependencies in the order a real publisher emits.
pub fn multi_array_definition(element: &str) -> String {
    format!(
        "\
std_msgs/MultiArrayLayout layout
{element}[] data
{SEPARATOR}
MSG: std_msgs/MultiArrayLayout
std_msgs/MultiArrayDimension[] dim
uint32 data_offset
{SEPARATOR}
MSG: std_msgs/MultiArrayDimension
string label
uint32 size
uint32 stride"
    )
}

/// Serialize an empty `std_msgs/MultiArrayLayout` (no dimensions).
pub fn ser_empty_layout(out: &mut Vec<u8>) {
    out.extend_from_slice(&0u32.to_le_bytes()); // dim: 0 elements
    out.extend_from_slice(&0u32.to_le_bytes()); // data_offset
}

/// The `sensor_msgs/PointCloud2` definition with its dependencies,
/// ordered the way connection headers print them: the top type first,
/// dependencies after.
pub fn pointcloud2_definition() -> String {
    format!(
        "\
# This message holds a collection of N-dimensional points.
Header header

# 2D structure of the point cloud.
uint32 height
uint32 width

# Describes the channels and their layout.
PointField[] fields

bool    is_bigendian
uint32  point_step
uint32  row_step
uint8[] data

bool is_dense
{SEPARATOR}
MSG: std_msgs/Header
{HEADER_DEFINITION}
{SEPARATOR}
MSG: sensor_msgs/PointField
uint8 INT8    = 1
uint8 UINT8   = 2
uint8 INT16   = 3
uint8 UINT16  = 4
uint8 INT32   = 5
uint8 UINT32  = 6
uint8 FLOAT32 = 7
uint8 FLOAT64 = 8

string name
uint32 offset
uint8  datatype
uint32 count"
    )
}

/// Serialize one `sensor_msgs/PointField`.
pub fn ser_point_field(out: &mut Vec<u8>, name: &str, offset: u32, datatype: u8, count: u32) {
    ser_string(out, name);
    out.extend_from_slice(&offset.to_le_bytes());
    out.push(datatype);
    out.extend_from_slice(&count.to_le_bytes());
}
