// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The bag file handle: first-pass structural scan and the reading API.
//!
//! Opening a bag validates the magic, streams every top-level record
//! (leaving chunk payloads on disk), builds the structural index, and
//! parses each connection's embedded schema. After construction the
//! handle is immutable and may be shared across threads; every message
//! read clones a private byte-source handle with its own position.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::bag::fingerprint;
use crate::bag::records::{
    check_index, BagHeaderInfo, ChunkInfo, ChunkRecord, Connection, IndexData, TopicInfo,
};
use crate::core::{BagError, BagTime, Result};
use crate::decode::decoder::MessageDecoder;
use crate::decode::iter::{load_chunk, MessageIterator};
use crate::io::chunk::COMPRESSION_NONE;
use crate::io::record::Record;
use crate::io::source::ByteSource;
use crate::io::RecordKind;

/// The 13-byte file magic.
pub const BAG_MAGIC: &[u8; 13] = b"#ROSBAG V2.0\n";

/// Flow control returned by message visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep iterating
    Continue,
    /// Stop immediately
    Stop,
}

/// Position of one message: which chunk it lives in and where the
/// message record starts inside the decompressed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIndex {
    /// Offset of the chunk record within the file
    pub chunk_pos: u64,
    /// Offset of the message record within the decompressed chunk
    pub intra_chunk_offset: u64,
    /// Connection the message belongs to
    pub conn_id: i32,
    /// Receipt time from the message record header
    pub time: BagTime,
}

/// An open, scanned bag file.
pub struct BagFile {
    source: ByteSource,
    path: Option<PathBuf>,
    header: BagHeaderInfo,
    chunks: Vec<ChunkRecord>,
    connections: Vec<Connection>,
    chunk_infos: Vec<ChunkInfo>,
    indexes: Vec<IndexData>,
    /// Message-data records found outside any chunk, `(conn, time)`
    loose_messages: Vec<(i32, BagTime)>,
    start_time: Option<BagTime>,
    end_time: Option<BagTime>,
    count_mismatch: bool,
    topic_indexes: Mutex<HashMap<String, Arc<Vec<MessageIndex>>>>,
}

impl BagFile {
    /// Open and scan a bag file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = ByteSource::open(path.as_ref())?;
        Self::scan(source, Some(path.as_ref().to_path_buf()))
    }

    /// Scan a bag held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::scan(ByteSource::from_vec(data), None)
    }

    fn scan(mut source: ByteSource, path: Option<PathBuf>) -> Result<Self> {
        let total_len = source.len();
        let magic = source
            .take(BAG_MAGIC.len())
            .map_err(|_| BagError::not_a_bag(format!("a {total_len}-byte file")))?;
        if magic != BAG_MAGIC {
            return Err(BagError::not_a_bag(format!(
                "{:?}",
                String::from_utf8_lossy(magic)
            )));
        }

        let mut header: Option<BagHeaderInfo> = None;
        let mut chunks: Vec<ChunkRecord> = Vec::new();
        let mut connections: Vec<Connection> = Vec::new();
        let mut chunk_infos: Vec<ChunkInfo> = Vec::new();
        let mut indexes: Vec<IndexData> = Vec::new();
        let mut loose_messages: Vec<(i32, BagTime)> = Vec::new();
        let mut seen_connections: HashSet<i32> = HashSet::new();
        let mut last_chunk_pos: Option<u64> = None;

        while source.remaining() > 0 {
            let record = Record::read(&mut source)?;
            match record.kind() {
                RecordKind::BagHeader => {
                    let info = BagHeaderInfo::from_record(&record)?;
                    if info.index_pos == 0 {
                        return Err(BagError::Unindexed);
                    }
                    if info.index_pos > source.len() {
                        return Err(BagError::corrupt(
                            record.offset(),
                            format!(
                                "index_pos {} is beyond the end of the file ({})",
                                info.index_pos,
                                source.len()
                            ),
                        ));
                    }
                    header = Some(info);
                }
                RecordKind::Chunk => {
                    chunks.push(ChunkRecord::from_record(&record)?);
                    last_chunk_pos = Some(record.offset());
                }
                RecordKind::IndexData => {
                    let chunk_pos = last_chunk_pos.ok_or_else(|| {
                        BagError::corrupt(
                            record.offset(),
                            "index data record with no preceding chunk",
                        )
                    })?;
                    indexes.push(IndexData::from_record(&record, &source, chunk_pos)?);
                }
                RecordKind::Connection => {
                    let conn = Connection::from_record(&record, &source)?;
                    // Connections are repeated in the index section; the
                    // first occurrence wins.
                    if seen_connections.insert(conn.id) {
                        connections.push(conn);
                    }
                }
                RecordKind::ChunkInfo => {
                    chunk_infos.push(ChunkInfo::from_record(&record, &source)?);
                }
                RecordKind::MessageData => {
                    loose_messages
                        .push((record.header().i32("conn")?, record.header().time("time")?));
                }
                RecordKind::Unknown => {}
            }
        }

        let header = header
            .ok_or_else(|| BagError::corrupt(BAG_MAGIC.len() as u64, "no bag header record"))?;

        let mut start_time: Option<BagTime> = None;
        let mut end_time: Option<BagTime> = None;
        {
            let mut observe = |time: BagTime| {
                start_time = Some(start_time.map_or(time, |t| t.min(time)));
                end_time = Some(end_time.map_or(time, |t| t.max(time)));
            };
            for info in &chunk_infos {
                observe(info.start_time);
                observe(info.end_time);
            }
            for index in &indexes {
                for entry in &index.entries {
                    observe(entry.time);
                }
            }
        }

        let count_mismatch = header.chunk_count as usize != chunks.len()
            || header.chunk_count as usize != chunk_infos.len()
            || header.conn_count as usize != connections.len();
        if count_mismatch {
            warn!(
                declared_chunks = header.chunk_count,
                chunks = chunks.len(),
                chunk_infos = chunk_infos.len(),
                declared_connections = header.conn_count,
                connections = connections.len(),
                "bag header counts do not match the records found; file may be incomplete"
            );
        }

        Ok(Self {
            source,
            path,
            header,
            chunks,
            connections,
            chunk_infos,
            indexes,
            loose_messages,
            start_time,
            end_time,
            count_mismatch,
            topic_indexes: Mutex::new(HashMap::new()),
        })
    }

    /// The path the bag was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The bag format version. Always `"2.0"`.
    pub fn version(&self) -> &'static str {
        "2.0"
    }

    /// The bag header record's counts and index position.
    pub fn bag_header(&self) -> &BagHeaderInfo {
        &self.header
    }

    /// All connections, in the order they were first seen.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Find a connection by id.
    pub fn connection_by_id(&self, id: i32) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// All chunk records (offsets and compression metadata).
    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    /// All chunk info records.
    pub fn chunk_infos(&self) -> &[ChunkInfo] {
        &self.chunk_infos
    }

    /// All index data records.
    pub fn indexes(&self) -> &[IndexData] {
        &self.indexes
    }

    /// Whether any index data records are present.
    pub fn is_indexed(&self) -> bool {
        !self.indexes.is_empty()
    }

    /// Whether the bag header's counts disagreed with the records found.
    /// Callers may promote this to an error for files that must be
    /// complete.
    pub fn count_mismatch(&self) -> bool {
        self.count_mismatch
    }

    /// The earliest time observed in any chunk info or index record.
    pub fn start_time(&self) -> Option<BagTime> {
        self.start_time
    }

    /// The latest time observed in any chunk info or index record.
    pub fn end_time(&self) -> Option<BagTime> {
        self.end_time
    }

    /// The time the bag spans in seconds, or 0.0 when unknown.
    pub fn duration_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end.as_secs_f64() - start.as_secs_f64()).max(0.0),
            _ => 0.0,
        }
    }

    /// Count the messages in the bag: from index records when present,
    /// else from chunk info counts, else by scanning every chunk.
    pub fn message_count(&self) -> Result<u64> {
        if self.is_indexed() {
            return Ok(self.indexes.iter().map(|i| i.entries.len() as u64).sum());
        }
        if !self.chunk_infos.is_empty() {
            return Ok(self.chunk_infos.iter().map(|c| c.message_count()).sum());
        }

        // Last resort for unindexed-but-readable files: walk the chunks.
        let mut source = self.source.clone();
        let mut count = self.loose_messages.len() as u64;
        for chunk in &self.chunks {
            let payload = load_chunk(&mut source, chunk.offset)?;
            let mut buffer = ByteSource::from_vec(payload);
            while buffer.remaining() > 0 {
                let record = Record::read(&mut buffer)?;
                if record.kind() == RecordKind::MessageData {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// The most common compression among the bag's chunks, `"none"` when
    /// the bag has no compressed chunks.
    pub fn compression_type(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for chunk in &self.chunks {
            *counts.entry(chunk.compression.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| COMPRESSION_NONE.to_string())
    }

    /// Every message type in the bag mapped to the set of md5 sums
    /// advertised for it. A type usually has a single sum, but nothing
    /// stops different connections from disagreeing.
    pub fn message_types(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut types: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for conn in &self.connections {
            types
                .entry(conn.message_type.clone())
                .or_default()
                .insert(conn.md5sum.clone());
        }
        types
    }

    /// All topics in the bag, sorted by name, with message and
    /// connection counts aggregated over the topic's connections.
    pub fn topics(&self) -> Vec<TopicInfo> {
        let mut by_name: BTreeMap<&str, TopicInfo> = BTreeMap::new();
        for conn in &self.connections {
            let message_count: u64 = self
                .chunk_infos
                .iter()
                .map(|info| info.count_for(conn.id))
                .sum();
            let entry = by_name.entry(conn.topic.as_str()).or_insert_with(|| TopicInfo {
                name: conn.topic.clone(),
                message_type: conn.message_type.clone(),
                md5sum: conn.md5sum.clone(),
                message_count: 0,
                connection_count: 0,
            });
            entry.message_count += message_count;
            entry.connection_count += 1;
        }
        by_name.into_values().collect()
    }

    /// The structural fingerprint of the bag; see [`fingerprint`].
    pub fn unique_identifier(&self) -> String {
        fingerprint::unique_identifier(
            &self.header,
            &self.chunks,
            &self.connections,
            &self.loose_messages,
            &self.indexes,
            &self.chunk_infos,
        )
    }

    /// Create a message iterator over an explicit list of connections.
    pub fn iter_messages<'a>(&'a self, connections: Vec<&'a Connection>) -> MessageIterator<'a> {
        MessageIterator::new(connections, &self.chunk_infos, self.source.clone())
    }

    fn connections_on_topic(&self, topic: &str) -> Vec<&Connection> {
        self.connections.iter().filter(|c| c.topic == topic).collect()
    }

    fn connections_of_type(&self, message_type: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.message_type == message_type)
            .collect()
    }

    fn visit(
        &self,
        connections: Vec<&Connection>,
        mut visitor: impl FnMut(&Connection, &MessageDecoder) -> Visit,
    ) -> Result<()> {
        let mut iter = self.iter_messages(connections);
        while let Some((conn, message)) = iter.advance()? {
            if visitor(conn, message) == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Visit every message published on the given topic. Messages are
    /// visited in per-connection chunk order, not chronological order.
    pub fn for_messages_on_topic(
        &self,
        topic: &str,
        visitor: impl FnMut(&Connection, &MessageDecoder) -> Visit,
    ) -> Result<()> {
        self.visit(self.connections_on_topic(topic), visitor)
    }

    /// Visit every message of the given type, regardless of topic.
    pub fn for_messages_of_type(
        &self,
        message_type: &str,
        visitor: impl FnMut(&Connection, &MessageDecoder) -> Visit,
    ) -> Result<()> {
        self.visit(self.connections_of_type(message_type), visitor)
    }

    /// Visit the messages of the first topic found carrying the given
    /// type.
    pub fn for_first_topic_with_messages_of_type(
        &self,
        message_type: &str,
        visitor: impl FnMut(&Connection, &MessageDecoder) -> Visit,
    ) -> Result<()> {
        let Some(first) = self
            .connections
            .iter()
            .find(|c| c.message_type == message_type)
        else {
            return Ok(());
        };
        let topic = first.topic.clone();
        self.for_messages_on_topic(&topic, visitor)
    }

    /// Visit every message on one connection.
    pub fn for_messages_on_connection(
        &self,
        conn: &Connection,
        visitor: impl FnMut(&Connection, &MessageDecoder) -> Visit,
    ) -> Result<()> {
        let Some(conn) = self.connection_by_id(conn.id) else {
            return Ok(());
        };
        self.visit(vec![conn], visitor)
    }

    fn first_message(&self, connections: Vec<&Connection>) -> Result<Option<MessageDecoder>> {
        let mut iter = self.iter_messages(connections);
        Ok(iter.advance()?.map(|(_, message)| message.clone()))
    }

    /// The first message of the given type found in the bag, if any.
    /// Note "first" means first in file order on the first matching
    /// connection, not chronologically first.
    pub fn first_message_of_type(&self, message_type: &str) -> Result<Option<MessageDecoder>> {
        self.first_message(self.connections_of_type(message_type))
    }

    /// The first message on the given topic, if any.
    pub fn first_message_on_topic(&self, topic: &str) -> Result<Option<MessageDecoder>> {
        self.first_message(self.connections_on_topic(topic))
    }

    /// The first message on one connection, if any.
    pub fn first_message_on_connection(
        &self,
        conn: &Connection,
    ) -> Result<Option<MessageDecoder>> {
        match self.connection_by_id(conn.id) {
            Some(conn) => self.first_message(vec![conn]),
            None => Ok(None),
        }
    }

    /// Build (or fetch the cached) message index for a topic: the file
    /// position of every message, in file order.
    ///
    /// Index data records are not consulted: they are frequently absent
    /// or partial, so the index is rebuilt from chunk info records and a
    /// scan of each matching chunk.
    pub fn topic_message_index(&self, topic: &str) -> Result<Arc<Vec<MessageIndex>>> {
        if let Some(cached) = self.lock_topic_indexes()?.get(topic) {
            return Ok(Arc::clone(cached));
        }

        let conn_ids: HashSet<i32> = self
            .connections_on_topic(topic)
            .iter()
            .map(|c| c.id)
            .collect();

        let mut entries: Vec<MessageIndex> = Vec::new();
        let mut source = self.source.clone();
        for info in &self.chunk_infos {
            if !conn_ids.iter().any(|&id| info.has_connection(id)) {
                continue;
            }
            let payload = load_chunk(&mut source, info.chunk_pos)?;
            let mut buffer = ByteSource::from_vec(payload);
            while buffer.remaining() > 0 {
                let record = Record::read(&mut buffer)?;
                if record.kind() != RecordKind::MessageData {
                    continue;
                }
                let conn_id = record.header().i32("conn")?;
                if !conn_ids.contains(&conn_id) {
                    continue;
                }
                entries.push(MessageIndex {
                    chunk_pos: info.chunk_pos,
                    intra_chunk_offset: record.offset(),
                    conn_id,
                    time: record.header().time("time")?,
                });
            }
        }
        entries.sort_by_key(|e| (e.chunk_pos, e.intra_chunk_offset));

        let entries = Arc::new(entries);
        self.lock_topic_indexes()?
            .insert(topic.to_string(), Arc::clone(&entries));
        Ok(entries)
    }

    fn lock_topic_indexes(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<MessageIndex>>>>> {
        self.topic_indexes
            .lock()
            .map_err(|_| BagError::Io("topic index cache lock poisoned".to_string()))
    }

    /// Decode the `index`-th message on a topic, in file order.
    pub fn message_on_topic_at_index(&self, topic: &str, index: usize) -> Result<MessageDecoder> {
        let entries = self.topic_message_index(topic)?;
        check_index(index, entries.len())?;
        let entry = entries[index];

        let conn = self.connection_by_id(entry.conn_id).ok_or_else(|| {
            BagError::corrupt(
                entry.chunk_pos,
                format!("message references unknown connection {}", entry.conn_id),
            )
        })?;

        let mut source = self.source.clone();
        let payload = load_chunk(&mut source, entry.chunk_pos)?;
        let mut buffer = ByteSource::from_vec(payload);
        let record = Record::at(&mut buffer, entry.intra_chunk_offset)?;
        let data = record.data(&buffer)?;

        let mut decoder = conn.decoder()?;
        decoder.decode(data)?;
        Ok(decoder)
    }
}

impl std::fmt::Debug for BagFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagFile")
            .field("path", &self.path)
            .field("chunks", &self.chunks.len())
            .field("connections", &self.connections.len())
            .field("chunk_infos", &self.chunk_infos.len())
            .field("indexes", &self.indexes.len())
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .finish()
    }
}
