// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Structural bag fingerprinting.
//!
//! The fingerprint is an md5 over the bag's record structure, not its
//! chunk payloads: byte-for-byte hashing of multi-gigabyte bags is slow,
//! and reindexing or chunk reordering changes the raw bytes without
//! changing the content. Hashing the structural metadata in a fixed
//! order identifies a bag about as reliably while reading almost
//! nothing.
//!
//! Two bags hash identically iff their structural metadata is identical;
//! the update order below is part of the contract.

use crate::bag::records::{BagHeaderInfo, ChunkInfo, ChunkRecord, Connection, IndexData};
use crate::core::BagTime;

/// Compute the structural fingerprint as lowercase hex.
pub(crate) fn unique_identifier(
    header: &BagHeaderInfo,
    chunks: &[ChunkRecord],
    connections: &[Connection],
    messages: &[(i32, BagTime)],
    indexes: &[IndexData],
    chunk_infos: &[ChunkInfo],
) -> String {
    let mut ctx = md5::Context::new();

    ctx.consume(header.chunk_count.to_le_bytes());
    ctx.consume(header.conn_count.to_le_bytes());
    ctx.consume(header.index_pos.to_le_bytes());

    for chunk in chunks {
        ctx.consume(chunk.compression.as_bytes());
        ctx.consume(chunk.uncompressed_size.to_le_bytes());
    }

    for conn in connections {
        if let Some(caller_id) = &conn.caller_id {
            ctx.consume(caller_id.as_bytes());
        }
        ctx.consume(conn.id.to_le_bytes());
        ctx.consume(conn.md5sum.as_bytes());
        ctx.consume(conn.topic.as_bytes());
        ctx.consume(conn.message_definition.as_bytes());
    }

    for (conn_id, time) in messages {
        ctx.consume(conn_id.to_le_bytes());
        ctx.consume(time.as_millis().to_le_bytes());
    }

    for index in indexes {
        ctx.consume(index.conn_id.to_le_bytes());
        ctx.consume((index.entries.len() as u32).to_le_bytes());
        for entry in &index.entries {
            ctx.consume(entry.time.as_millis().to_le_bytes());
            ctx.consume(entry.offset.to_le_bytes());
        }
    }

    for info in chunk_infos {
        ctx.consume(info.chunk_pos.to_le_bytes());
        ctx.consume((info.connections.len() as u32).to_le_bytes());
        ctx.consume(info.start_time.as_millis().to_le_bytes());
        ctx.consume(info.end_time.as_millis().to_le_bytes());
        for conn in &info.connections {
            ctx.consume(conn.conn_id.to_le_bytes());
            ctx.consume(conn.message_count.to_le_bytes());
        }
    }

    format!("{:x}", ctx.compute())
}
