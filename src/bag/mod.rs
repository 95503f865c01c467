// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The bag file layer: structural scan, record types, fingerprinting,
//! and the public reading surface.

pub mod file;
pub mod fingerprint;
pub mod records;

pub use file::{BagFile, MessageIndex, Visit, BAG_MAGIC};
pub use records::{
    BagHeaderInfo, ChunkConnection, ChunkInfo, ChunkRecord, Connection, IndexData, IndexEntry,
    TopicInfo,
};
