// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record header parsing.
//!
//! A record header is a sequence of `<len: u32><name>=<value>` entries.
//! Values are raw bytes; typed accessors decode on demand. The mandatory
//! `op` key (a single byte) classifies the record.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{BagError, BagTime, Result};

/// Sanity cap on a single header field; anything larger signals corruption.
pub const MAX_FIELD_LEN: u32 = 100_000;

/// Record variants, discriminated by the `op` header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// 0x03 - file-level header with counts and the index position
    BagHeader,
    /// 0x05 - compressed container of message data records
    Chunk,
    /// 0x07 - topic/type declaration with the embedded schema
    Connection,
    /// 0x02 - one serialized message
    MessageData,
    /// 0x04 - per-connection message offsets for one chunk
    IndexData,
    /// 0x06 - per-chunk connection counts and time bounds
    ChunkInfo,
    /// No `op` field (legacy zero-length headers)
    Unknown,
}

impl RecordKind {
    fn from_op(op: u8, offset: u64) -> Result<Self> {
        match op {
            0x02 => Ok(RecordKind::MessageData),
            0x03 => Ok(RecordKind::BagHeader),
            0x04 => Ok(RecordKind::IndexData),
            0x05 => Ok(RecordKind::Chunk),
            0x06 => Ok(RecordKind::ChunkInfo),
            0x07 => Ok(RecordKind::Connection),
            other => Err(BagError::corrupt(
                offset,
                format!("unknown op code in header: 0x{other:02x}"),
            )),
        }
    }
}

/// A parsed record header: a field map plus the record classification.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    fields: HashMap<String, Vec<u8>>,
    kind: RecordKind,
}

impl RecordHeader {
    /// An empty header, classified `Unknown`. Produced for legacy
    /// zero-length header records.
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
            kind: RecordKind::Unknown,
        }
    }

    /// Parse a buffer of concatenated header fields.
    ///
    /// `base_offset` is the buffer's position in the enclosing stream and
    /// is only used to report error locations.
    pub fn parse(buf: &[u8], base_offset: u64) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut kind = RecordKind::Unknown;
        let mut pos = 0usize;

        while pos < buf.len() {
            if pos + 4 > buf.len() {
                return Err(BagError::truncated(
                    base_offset + pos as u64,
                    4,
                    buf.len() - pos,
                ));
            }
            let field_len = LittleEndian::read_u32(&buf[pos..pos + 4]);
            pos += 4;

            if field_len > MAX_FIELD_LEN {
                return Err(BagError::corrupt(
                    base_offset + pos as u64,
                    format!("header field is unreasonably large ({field_len} bytes); bag file may need to be reindexed"),
                ));
            }
            let field_len = field_len as usize;
            if pos + field_len > buf.len() {
                return Err(BagError::truncated(
                    base_offset + pos as u64,
                    field_len,
                    buf.len() - pos,
                ));
            }

            let entry = &buf[pos..pos + field_len];
            pos += field_len;

            // The separator is the first '=' scanning left to right.
            let sep = entry.iter().position(|&b| b == b'=').ok_or_else(|| {
                BagError::corrupt(base_offset + pos as u64, "no '=' separator in header field")
            })?;
            let name = String::from_utf8_lossy(&entry[..sep]).into_owned();
            let value = entry[sep + 1..].to_vec();

            if name == "op" {
                let first = *value.first().ok_or_else(|| {
                    BagError::corrupt(base_offset + pos as u64, "empty op field")
                })?;
                kind = RecordKind::from_op(first, base_offset)?;
            }
            fields.insert(name, value);
        }

        Ok(Self { fields, kind })
    }

    /// The record classification derived from the `op` byte.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Whether the header carries the given key.
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&[u8]> {
        self.fields.get(name).map(|v| v.as_slice()).ok_or_else(|| {
            let mut available: Vec<&str> = self.fields.keys().map(|k| k.as_str()).collect();
            available.sort_unstable();
            BagError::unknown_field(name, available.join(","))
        })
    }

    fn get_exact(&self, name: &str, len: usize) -> Result<&[u8]> {
        let value = self.get(name)?;
        if value.len() < len {
            return Err(BagError::corrupt(
                0,
                format!(
                    "header field '{name}' is {} bytes, expected {len}",
                    value.len()
                ),
            ));
        }
        Ok(value)
    }

    /// The raw bytes of a field.
    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        self.get(name)
    }

    /// The first byte of a field's value.
    pub fn first_byte(&self, name: &str) -> Result<u8> {
        Ok(self.get_exact(name, 1)?[0])
    }

    /// A field decoded as a little-endian `i32`.
    pub fn i32(&self, name: &str) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.get_exact(name, 4)?))
    }

    /// A field decoded as a little-endian `i64`.
    pub fn i64(&self, name: &str) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.get_exact(name, 8)?))
    }

    /// A field decoded as a ROS time: `(sec: u32, nsec: u32)`.
    pub fn time(&self, name: &str) -> Result<BagTime> {
        let value = self.get_exact(name, 8)?;
        Ok(BagTime::new(
            LittleEndian::read_u32(&value[0..4]),
            LittleEndian::read_u32(&value[4..8]),
        ))
    }

    /// A field decoded as a UTF-8 string (lossy).
    pub fn string(&self, name: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(self.get(name)?).into_owned())
    }
}
