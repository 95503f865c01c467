// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message iteration.
//!
//! A [`MessageIterator`] walks the chunks belonging to an ordered list
//! of connections and yields one decoded message per pull. For each
//! connection it scans the chunk-info records in file order, loads and
//! decompresses each matching chunk, and scans the embedded records for
//! message data on that connection.
//!
//! One decoder tree is built per connection and reused for every message
//! on it: the message handed out by [`advance`] is borrowed from the
//! iterator and is overwritten by the next pull, so callers must extract
//! what they need before advancing.
//!
//! A chunk that fails to load or decode is skipped with a warning; a
//! connection whose decoder cannot be built is skipped with a warning.
//! Exhaustion is not an error.
//!
//! [`advance`]: MessageIterator::advance

use tracing::warn;

use crate::bag::records::{ChunkInfo, Connection};
use crate::core::{BagError, Result};
use crate::decode::decoder::MessageDecoder;
use crate::io::chunk;
use crate::io::record::Record;
use crate::io::source::ByteSource;
use crate::io::RecordKind;

/// Lazily yields `(connection, message)` pairs from a bag's chunks.
pub struct MessageIterator<'a> {
    source: ByteSource,
    chunk_infos: &'a [ChunkInfo],
    connections: Vec<&'a Connection>,
    next_conn: usize,
    current: Option<CurrentConn<'a>>,
}

struct CurrentConn<'a> {
    conn: &'a Connection,
    decoder: MessageDecoder,
    /// Index of the next chunk-info record to consider
    next_chunk: usize,
    /// Decompressed records of the chunk currently being scanned
    buffer: Option<ByteSource>,
}

impl<'a> MessageIterator<'a> {
    /// Create an iterator over the given connections.
    ///
    /// `source` must be a private handle; the iterator moves its
    /// position on every pull.
    pub fn new(
        connections: Vec<&'a Connection>,
        chunk_infos: &'a [ChunkInfo],
        source: ByteSource,
    ) -> Self {
        Self {
            source,
            chunk_infos,
            connections,
            next_conn: 0,
            current: None,
        }
    }

    /// Decode and return the next message, or `None` when every
    /// connection is exhausted.
    ///
    /// The returned decoder is borrowed from the iterator and is reused
    /// by the next call.
    pub fn advance(&mut self) -> Result<Option<(&'a Connection, &MessageDecoder)>> {
        loop {
            if self.current.is_none() && !self.open_next_connection() {
                return Ok(None);
            }

            let state = self.current.as_mut().expect("connection is open");

            if state.buffer.is_none() {
                match next_chunk_for(state, self.chunk_infos, &mut self.source) {
                    ChunkStep::Loaded(buffer) => state.buffer = Some(buffer),
                    ChunkStep::Skip => continue,
                    ChunkStep::NoMoreChunks => {
                        self.current = None;
                        continue;
                    }
                }
            }

            match scan_chunk(state) {
                Ok(true) => {
                    let state = self.current.as_ref().expect("connection is open");
                    return Ok(Some((state.conn, &state.decoder)));
                }
                Ok(false) => {
                    // Chunk exhausted without a match; move to the next one.
                    let state = self.current.as_mut().expect("connection is open");
                    state.buffer = None;
                }
                Err(err) => {
                    let state = self.current.as_mut().expect("connection is open");
                    warn!(
                        conn = state.conn.id,
                        topic = %state.conn.topic,
                        error = %err,
                        "error decoding chunk; skipping it"
                    );
                    state.buffer = None;
                }
            }
        }
    }

    /// Advance to the next connection that yields a decoder. Returns
    /// false when no connections remain.
    fn open_next_connection(&mut self) -> bool {
        while self.next_conn < self.connections.len() {
            let conn = self.connections[self.next_conn];
            self.next_conn += 1;

            match conn.decoder() {
                Ok(decoder) => {
                    self.current = Some(CurrentConn {
                        conn,
                        decoder,
                        next_chunk: 0,
                        buffer: None,
                    });
                    return true;
                }
                Err(err) => {
                    warn!(
                        conn = conn.id,
                        topic = %conn.topic,
                        error = %err,
                        "unable to build decoder; skipping connection"
                    );
                }
            }
        }
        false
    }
}

enum ChunkStep {
    Loaded(ByteSource),
    Skip,
    NoMoreChunks,
}

/// Find and load the next chunk holding messages for the current
/// connection.
fn next_chunk_for(
    state: &mut CurrentConn<'_>,
    chunk_infos: &[ChunkInfo],
    source: &mut ByteSource,
) -> ChunkStep {
    while state.next_chunk < chunk_infos.len() {
        let info = &chunk_infos[state.next_chunk];
        state.next_chunk += 1;

        if !info.has_connection(state.conn.id) {
            continue;
        }
        match load_chunk(source, info.chunk_pos) {
            Ok(payload) => return ChunkStep::Loaded(ByteSource::from_vec(payload)),
            Err(err) => {
                warn!(
                    chunk_pos = info.chunk_pos,
                    error = %err,
                    "error reading data chunk; skipping it"
                );
                return ChunkStep::Skip;
            }
        }
    }
    ChunkStep::NoMoreChunks
}

/// Seek to a chunk record and materialize its decompressed payload.
pub(crate) fn load_chunk(source: &mut ByteSource, chunk_pos: u64) -> Result<Vec<u8>> {
    let record = Record::at(source, chunk_pos)?;
    if record.kind() != RecordKind::Chunk {
        return Err(BagError::corrupt(
            chunk_pos,
            format!("expected a chunk record, found {:?}", record.kind()),
        ));
    }
    chunk::materialize(&record, source)
}

/// Scan the current chunk buffer for the next matching message and
/// decode it in place. Returns `Ok(true)` when a message was decoded and
/// `Ok(false)` when the buffer is exhausted.
fn scan_chunk(state: &mut CurrentConn<'_>) -> Result<bool> {
    let CurrentConn {
        conn,
        decoder,
        buffer,
        ..
    } = state;
    let buffer = buffer.as_mut().expect("chunk buffer is loaded");

    while buffer.remaining() > 0 {
        let record = Record::read(buffer)?;
        if record.kind() != RecordKind::MessageData {
            continue;
        }
        if record.header().i32("conn")? != conn.id {
            continue;
        }

        let data = record.data(buffer)?;
        decoder.reset();
        decoder.decode(data)?;
        return Ok(true);
    }
    Ok(false)
}
