// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Seekable byte sources.
//!
//! A [`ByteSource`] abstracts over a memory-mapped file and an owned
//! in-memory buffer. The underlying bytes are shared and immutable; the
//! cursor position is per-handle, so cloning a source yields an
//! independent reader over the same data. A source is never shared
//! between readers directly because it carries a position.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::core::{BagError, Result};

/// Backing storage for a byte source.
enum SourceBuf {
    /// Memory-mapped file contents
    Mapped(memmap2::Mmap),
    /// Owned buffer (decompressed chunks, in-memory bags, tests)
    Owned(Vec<u8>),
}

impl SourceBuf {
    fn bytes(&self) -> &[u8] {
        match self {
            SourceBuf::Mapped(map) => map,
            SourceBuf::Owned(vec) => vec,
        }
    }
}

/// A seekable reader over a file or an in-memory buffer.
pub struct ByteSource {
    buf: Arc<SourceBuf>,
    pos: u64,
}

impl Clone for ByteSource {
    /// Cloning shares the underlying bytes but gives the new handle its
    /// own position, reset to the start.
    fn clone(&self) -> Self {
        Self {
            buf: Arc::clone(&self.buf),
            pos: 0,
        }
    }
}

impl ByteSource {
    /// Memory-map a file read-only. Empty files cannot be mapped and
    /// fall back to an empty buffer.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        // Safety: the mapping is read-only and the file handle outlives it.
        let map = unsafe { memmap2::Mmap::map(&file) }?;
        Ok(Self {
            buf: Arc::new(SourceBuf::Mapped(map)),
            pos: 0,
        })
    }

    /// Wrap an owned buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            buf: Arc::new(SourceBuf::Owned(data)),
            pos: 0,
        }
    }

    /// Total length of the underlying data in bytes.
    pub fn len(&self) -> u64 {
        self.buf.bytes().len() as u64
    }

    /// Whether the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.bytes().is_empty()
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute position.
    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(BagError::corrupt(
                pos,
                format!("seek past end of source (len {})", self.len()),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance the cursor without reading.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.set_position(self.pos + count)
    }

    /// Borrow `len` bytes at an absolute offset without moving the cursor.
    pub fn slice_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| BagError::corrupt(offset, "slice length overflow"))?;
        if end > self.len() {
            return Err(BagError::truncated(
                offset,
                len,
                self.len().saturating_sub(offset) as usize,
            ));
        }
        Ok(&self.buf.bytes()[offset as usize..end as usize])
    }

    /// Consume `len` bytes from the cursor, returning a borrowed slice.
    pub fn take(&mut self, len: usize) -> Result<&[u8]> {
        let offset = self.pos;
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| BagError::corrupt(offset, "read length overflow"))?;
        if end > self.len() {
            return Err(BagError::truncated(offset, len, self.remaining() as usize));
        }
        self.pos = end;
        Ok(&self.buf.bytes()[offset as usize..end as usize])
    }

    /// Read a little-endian `u32` at the cursor.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Read a little-endian `i32` at the cursor.
    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }
}

impl Read for ByteSource {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let bytes = self.buf.bytes();
        let start = self.pos.min(bytes.len() as u64) as usize;
        let count = out.len().min(bytes.len() - start);
        out[..count].copy_from_slice(&bytes[start..start + count]);
        self.pos += count as u64;
        Ok(count)
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(delta) => self.len() as i64 + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_reads() {
        let mut src = ByteSource::from_vec(vec![1, 2, 3, 4, 5]);
        assert_eq!(src.len(), 5);
        assert_eq!(ByteSource::take(&mut src, 2).unwrap(), &[1, 2]);
        assert_eq!(src.position(), 2);
        assert_eq!(src.remaining(), 3);
    }

    #[test]
    fn test_read_u32_le() {
        let mut src = ByteSource::from_vec(vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(src.read_u32_le().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_truncated_take() {
        let mut src = ByteSource::from_vec(vec![1, 2]);
        let err = ByteSource::take(&mut src, 4).unwrap_err();
        assert!(matches!(
            err,
            BagError::Truncated {
                requested: 4,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_seek_past_end_is_corrupt() {
        let mut src = ByteSource::from_vec(vec![0; 8]);
        assert!(src.set_position(8).is_ok());
        assert!(src.set_position(9).is_err());
    }

    #[test]
    fn test_slice_at() {
        let src = ByteSource::from_vec(vec![10, 20, 30, 40]);
        assert_eq!(src.slice_at(1, 2).unwrap(), &[20, 30]);
        assert!(src.slice_at(3, 2).is_err());
        // The cursor is unaffected by slice_at.
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn test_clone_has_independent_position() {
        let mut a = ByteSource::from_vec(vec![1, 2, 3, 4]);
        ByteSource::take(&mut a, 3).unwrap();
        let mut b = a.clone();
        assert_eq!(b.position(), 0);
        assert_eq!(ByteSource::take(&mut b, 1).unwrap(), &[1]);
        assert_eq!(a.position(), 3);
    }

    #[test]
    fn test_std_read_impl() {
        use std::io::Read;
        let mut src = ByteSource::from_vec(vec![7; 10]);
        let mut buf = [0u8; 4];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [7; 4]);
        assert_eq!(src.position(), 4);
    }

    #[test]
    fn test_open_file() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"#ROSBAG V2.0\n").unwrap();
        tmp.flush().unwrap();
        let mut src = ByteSource::open(tmp.path()).unwrap();
        assert_eq!(src.len(), 13);
        assert_eq!(ByteSource::take(&mut src, 7).unwrap(), b"#ROSBAG");
    }
}
