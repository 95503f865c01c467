// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunk payload materialization.
//!
//! A CHUNK record's data is a concatenation of embedded records,
//! optionally compressed. The header's `compression` field selects the
//! codec and `size` declares the decompressed length, which is verified.

use std::io::Read;

use bzip2::read::BzDecoder;
use lz4_flex::frame::FrameDecoder;
use tracing::warn;

use crate::core::{BagError, Result};
use crate::io::record::Record;
use crate::io::source::ByteSource;

/// Identity compression token.
pub const COMPRESSION_NONE: &str = "none";
/// bzip2 stream compression token.
pub const COMPRESSION_BZ2: &str = "bz2";
/// LZ4 frame compression token.
pub const COMPRESSION_LZ4: &str = "lz4";

/// Materialize a chunk's payload, decompressing if necessary.
///
/// An unrecognized compression token is reported with a warning and the
/// raw bytes are returned opaque; callers must not rely on their layout.
pub fn materialize(record: &Record, source: &ByteSource) -> Result<Vec<u8>> {
    let compression = record.header().string("compression")?;
    let data = record.data(source)?;

    match compression.as_str() {
        COMPRESSION_NONE => Ok(data.to_vec()),
        COMPRESSION_BZ2 => {
            let expected = record.header().i32("size")? as usize;
            decompress(COMPRESSION_BZ2, BzDecoder::new(data), expected)
        }
        COMPRESSION_LZ4 => {
            let expected = record.header().i32("size")? as usize;
            decompress(COMPRESSION_LZ4, FrameDecoder::new(data), expected)
        }
        other => {
            warn!(compression = other, "unknown chunk compression format");
            Ok(data.to_vec())
        }
    }
}

/// Drain a decoder and verify the decompressed length matches the
/// chunk header's declaration.
fn decompress<R: Read>(codec: &str, mut decoder: R, expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| BagError::decompression(codec, e.to_string()))?;
    if out.len() != expected {
        return Err(BagError::decompression(
            codec,
            format!("decompressed {} bytes but expected {expected}", out.len()),
        ));
    }
    Ok(out)
}
