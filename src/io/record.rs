// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record framing.
//!
//! Every record is `<header_len: u32><header><data_len: u32><data>`.
//! Reading a record parses the header and notes where the data region
//! lives; the data itself is not touched until a caller asks for it.

use tracing::warn;

use crate::core::{BagError, Result};
use crate::io::header::{RecordHeader, RecordKind};
use crate::io::source::ByteSource;

/// Sanity cap on a record header; anything larger signals corruption.
pub const MAX_HEADER_LEN: i32 = 100_000;

/// A framed record: parsed header plus the location of its data region.
#[derive(Debug, Clone)]
pub struct Record {
    header: RecordHeader,
    /// Offset of the record itself (the header length word)
    offset: u64,
    /// Offset of the data region within the source
    data_offset: u64,
    /// Length of the data region in bytes
    data_len: u32,
}

impl Record {
    /// Read one record at the source's current position. The cursor is
    /// left just past the record's data region; the data is not read.
    ///
    /// A zero header length is a legacy marker occasionally left behind by
    /// interrupted writers; it is skipped with a warning and yields a
    /// record of kind [`RecordKind::Unknown`] with no data.
    pub fn read(source: &mut ByteSource) -> Result<Self> {
        let offset = source.position();
        let header_len = source.read_i32_le()?;

        if header_len == 0 {
            warn!(offset, "zero-length record header; skipping legacy marker");
            source.skip(4)?;
            return Ok(Self {
                header: RecordHeader::empty(),
                offset,
                data_offset: source.position(),
                data_len: 0,
            });
        }
        if header_len < 0 || header_len > MAX_HEADER_LEN {
            return Err(BagError::corrupt(
                offset,
                format!("header is unreasonably large ({header_len} bytes); bag file may need to be reindexed"),
            ));
        }

        let header_offset = source.position();
        let header_bytes = source.take(header_len as usize)?;
        let header = RecordHeader::parse(header_bytes, header_offset)?;

        let data_len = source.read_u32_le()?;
        let data_offset = source.position();
        source.skip(data_len as u64)?;

        Ok(Self {
            header,
            offset,
            data_offset,
            data_len,
        })
    }

    /// Seek to `offset` and read one record there. Used for random access
    /// from `chunk_pos` fields and index entries.
    pub fn at(source: &mut ByteSource, offset: u64) -> Result<Self> {
        source.set_position(offset)?;
        Self::read(source)
    }

    /// The record's header.
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// The record classification.
    pub fn kind(&self) -> RecordKind {
        self.header.kind()
    }

    /// Offset of the record within its source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset of the data region within its source.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Length of the data region in bytes.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Borrow the record's data region. May be called repeatedly; the
    /// bytes come straight from the source without copying.
    pub fn data<'a>(&self, source: &'a ByteSource) -> Result<&'a [u8]> {
        source.slice_at(self.data_offset, self.data_len as usize)
    }
}
