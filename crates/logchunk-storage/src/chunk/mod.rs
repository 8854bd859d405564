//! Chunk Container Format
//!
//! This module implements the in-memory compressed chunk for one log stream:
//! a head buffer of recent uncompressed entries plus an ordered list of
//! immutable compressed blocks, with a self-describing binary serialization.
//!
//! ## Chunk Byte Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header                                                      │
//! │ - Magic: 0x012EE56A (BE32)                                  │
//! │ - Format version: 1 or 2 (1 byte)                           │
//! │ - Encoding tag (1 byte, V2 only; V1 is always gzip)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Block 1 payload (compressed)                                │
//! │ - CRC32-Castagnoli of the payload (BE32)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ ...                                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Metadata section (starts at metas_offset)                   │
//! │ - Block count (uvarint)                                     │
//! │ - Per block: entry count (uvarint), min/max timestamp       │
//! │   (varint ns), payload offset (uvarint), payload length     │
//! │   (uvarint)                                                 │
//! │ - CRC32-Castagnoli of the metadata bytes (BE32)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │ metas_offset (BE64, final 8 bytes)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A decompressed block payload is a concatenation of
//! `varint(timestamp) uvarint(line_len) line_bytes` frames.
//!
//! ## Corruption Handling
//!
//! - Bad magic, unknown version, unknown encoding, or a metadata CRC
//!   mismatch fail the whole parse
//! - A single block failing its CRC is dropped with a warning and parsing
//!   continues; the rest of the chunk stays queryable
//!
//! ## Write Path
//!
//! `append` adds to the head; once the head's line bytes reach `block_size`
//! it is compressed and cut into a block. `to_bytes` forces a final cut and
//! emits the layout above. Appends must stay in timestamp order, both within
//! the head and across a cut.
//!
//! ## Thread Safety
//!
//! A chunk is not internally synchronized. Mutation (`append`, `cut`,
//! `close`, `to_bytes`) requires `&mut self`, so the borrow checker already
//! enforces the single-writer rule; shared reads of a sealed chunk are fine.

mod block;
mod head;
mod iterator;

pub use block::{Block, EncBlock};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::warn;

use logchunk_core::{DecBuf, EncBuf, Entry};

use crate::compression::{Encoding, WriterPool};
use crate::error::{Error, Result};
use crate::iter::{
    Direction, EntryIterator, NonOverlappingIterator, NonOverlappingSampleIterator,
    ReversedEntryIterator, SampleIterator, TimeRangedIterator, TimeRangedSampleIterator,
};
use crate::pipeline::{Labels, Pipeline, SampleExtractor};
use crate::stats::QueryContext;

use head::HeadBlock;

/// Magic number opening every serialized chunk
pub const CHUNK_MAGIC: u32 = 0x012E_E56A;

/// Format V1: gzip only, no encoding byte in the header
pub(crate) const CHUNK_FORMAT_V1: u8 = 1;

/// Format V2: encoding byte follows the version byte
pub(crate) const CHUNK_FORMAT_V2: u8 = 2;

/// Block-count cap applied by `space_for` when no target size is configured
pub const BLOCKS_PER_CHUNK: usize = 10;

/// An in-memory compressed chunk of one log stream
#[derive(Debug)]
pub struct MemChunk {
    /// Uncompressed line bytes per block
    block_size: usize,
    /// Target chunk size in compressed bytes; 0 disables the size heuristic
    target_size: usize,

    /// The finished blocks
    blocks: Vec<Block>,
    /// Compressed size of all cut blocks
    cut_block_size: usize,

    /// Current in-memory block being appended to
    head: HeadBlock,

    format: u8,
    encoding: Encoding,
}

impl MemChunk {
    /// A new, empty chunk in the current (V2) format
    pub fn new(encoding: Encoding, block_size: usize, target_size: usize) -> Self {
        Self {
            block_size,
            target_size,
            blocks: Vec::new(),
            cut_block_size: 0,
            head: HeadBlock::default(),
            format: CHUNK_FORMAT_V2,
            encoding,
        }
    }

    /// Parse a serialized chunk. The returned chunk is sealed: its head is
    /// empty and blocks are served from zero-copy slices of `b`.
    pub fn from_bytes(b: Bytes, block_size: usize, target_size: usize) -> Result<Self> {
        let mut db = DecBuf::new(&b);
        let magic = db.be32();
        let format = db.byte();
        if let Some(e) = db.err() {
            return Err(Error::HeaderCorrupt(e));
        }
        if magic != CHUNK_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let encoding = match format {
            CHUNK_FORMAT_V1 => Encoding::Gzip,
            CHUNK_FORMAT_V2 => {
                let tag = db.byte();
                if let Some(e) = db.err() {
                    return Err(Error::HeaderCorrupt(e));
                }
                Encoding::try_from(tag)?
            }
            _ => return Err(Error::InvalidVersion(format)),
        };

        // Trailer: BE32 metadata checksum, then BE64 metadata offset.
        if b.len() < 12 {
            return Err(Error::HeaderCorrupt(logchunk_core::Error::UnexpectedEof));
        }
        let trailer_start = b.len() - 8;
        let crc_start = b.len() - 12;
        let metas_offset = DecBuf::new(&b[trailer_start..]).be64() as usize;
        if metas_offset > crc_start {
            return Err(Error::HeaderCorrupt(logchunk_core::Error::UnexpectedEof));
        }

        let expected_crc = DecBuf::new(&b[crc_start..trailer_start]).be32();
        let mut db = DecBuf::new(&b[metas_offset..crc_start]);
        if expected_crc != db.crc32c() {
            return Err(Error::InvalidChecksum);
        }

        let num = db.uvarint() as usize;
        if let Some(e) = db.err() {
            return Err(Error::BlockMetaCorrupt(e));
        }

        let mut blocks = Vec::with_capacity(num.min(BLOCKS_PER_CHUNK * 16));
        let mut cut_block_size = 0;
        for _ in 0..num {
            let num_entries = db.uvarint() as usize;
            let mint = db.varint64();
            let maxt = db.varint64();
            let offset = db.uvarint() as usize;
            let len = db.uvarint() as usize;
            if let Some(e) = db.err() {
                return Err(Error::BlockMetaCorrupt(e));
            }

            let end = offset
                .checked_add(len)
                .filter(|end| end.checked_add(4).is_some_and(|crc_end| crc_end <= b.len()))
                .ok_or(Error::BlockMetaCorrupt(logchunk_core::Error::UnexpectedEof))?;

            let payload = b.slice(offset..end);
            let expected = DecBuf::new(&b[end..end + 4]).be32();
            if expected != crc32c::crc32c(&payload) {
                warn!(
                    offset,
                    length = len,
                    "block checksum mismatch, skipping block"
                );
                continue;
            }

            cut_block_size += len;
            blocks.push(Block {
                b: payload,
                num_entries,
                mint,
                maxt,
                offset,
                uncompressed_size: 0,
            });
        }

        Ok(Self {
            block_size,
            target_size,
            blocks,
            cut_block_size,
            head: HeadBlock::default(),
            format,
            encoding,
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of entries across blocks and head
    pub fn size(&self) -> usize {
        self.blocks.iter().map(|b| b.num_entries).sum::<usize>() + self.head.len()
    }

    /// Append an entry. Fails with `OutOfOrder` if the entry is older than
    /// anything already in the chunk; the chunk is left unchanged.
    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        let ts = entry.timestamp;

        // With an empty head the only ordering reference is the last cut
        // block.
        if self.head.is_empty() {
            if let Some(last) = self.blocks.last() {
                if last.maxt > ts {
                    return Err(Error::OutOfOrder);
                }
            }
        }

        self.head.append(ts, entry.line.clone())?;

        if self.head.size() >= self.block_size {
            return self.cut();
        }
        Ok(())
    }

    /// Compress the head into a new block and reset it. No-op when the head
    /// is empty.
    pub fn cut(&mut self) -> Result<()> {
        if self.head.is_empty() {
            return Ok(());
        }

        let b = self.head.serialize(WriterPool::for_encoding(self.encoding))?;
        self.cut_block_size += b.len();

        self.blocks.push(Block {
            num_entries: self.head.len(),
            mint: self.head.mint(),
            maxt: self.head.maxt(),
            uncompressed_size: self.head.size(),
            offset: 0,
            b: Bytes::from(b),
        });

        self.head.reset();
        Ok(())
    }

    /// Seal the chunk by cutting any pending head entries
    pub fn close(&mut self) -> Result<()> {
        self.cut()
    }

    /// Whether the chunk has room for one more entry.
    ///
    /// With a target size this compares uncompressed line bytes against the
    /// compressed target, which is deliberately pessimistic: the chunk stays
    /// under target. Without one, it falls back to a fixed block count.
    pub fn space_for(&self, entry: &Entry) -> bool {
        if self.target_size > 0 {
            let new_head_size = self.head.size() + entry.line.len();
            return self.cut_block_size + new_head_size < self.target_size;
        }
        self.blocks.len() < BLOCKS_PER_CHUNK
    }

    /// Line bytes across blocks and head, before compression
    pub fn uncompressed_size(&self) -> usize {
        let mut size = 0;
        if !self.head.is_empty() {
            size += self.head.size();
        }
        for b in &self.blocks {
            size += b.uncompressed_size;
        }
        size
    }

    /// Compressed bytes of cut blocks, plus the head's uncompressed bytes
    /// since the head has no compressed representation yet
    pub fn compressed_size(&self) -> usize {
        let mut size = 0;
        if !self.head.is_empty() {
            size += self.head.size();
        }
        size + self.cut_block_size
    }

    /// Fill fraction relative to the target size, or to the fixed block
    /// budget when no target is configured
    pub fn utilization(&self) -> f64 {
        if self.target_size != 0 {
            return self.compressed_size() as f64 / self.target_size as f64;
        }
        self.uncompressed_size() as f64 / (BLOCKS_PER_CHUNK * self.block_size) as f64
    }

    /// Earliest and latest instants covered by the chunk
    pub fn bounds(&self) -> (SystemTime, SystemTime) {
        let mut from = None;
        let mut to = None;

        if let (Some(first), Some(last)) = (self.blocks.first(), self.blocks.last()) {
            from = Some(first.mint);
            to = Some(last.maxt);
        }
        if !self.head.is_empty() {
            from = Some(from.map_or(self.head.mint(), |f: i64| f.min(self.head.mint())));
            to = Some(to.map_or(self.head.maxt(), |t: i64| t.max(self.head.maxt())));
        }

        (
            ns_to_time(from.unwrap_or(0)),
            ns_to_time(to.unwrap_or(0)),
        )
    }

    /// Views of the blocks whose time range intersects `[mint, maxt]`
    pub fn blocks_in(&self, mint: i64, maxt: i64) -> Vec<EncBlock> {
        self.blocks
            .iter()
            .filter(|b| maxt >= b.mint && b.maxt >= mint)
            .map(|b| EncBlock::new(self.encoding, b.clone()))
            .collect()
    }

    /// Entry iterator over `[mint, maxt]` (nanoseconds, both ends inclusive)
    /// in the requested direction. The head, if non-empty, is snapshotted at
    /// this call.
    pub fn iterator<'a>(
        &self,
        ctx: &QueryContext,
        mint: i64,
        maxt: i64,
        direction: Direction,
        labels: &Labels,
        pipeline: &'a dyn Pipeline,
    ) -> Result<Box<dyn EntryIterator + 'a>> {
        let mut its: Vec<Box<dyn EntryIterator + 'a>> = Vec::with_capacity(self.blocks.len() + 1);

        for b in &self.blocks {
            if maxt < b.mint || b.maxt < mint {
                continue;
            }
            its.push(EncBlock::new(self.encoding, b.clone()).iterator(ctx, labels, pipeline));
        }

        if !self.head.is_empty() {
            // Sub-iterators are composed ascending; a backward query reverses
            // each of them uniformly below.
            its.push(
                self.head
                    .iterator(ctx, Direction::Forward, mint, maxt, labels, pipeline),
            );
        }

        if direction == Direction::Forward {
            return Ok(Box::new(TimeRangedIterator::new(
                Box::new(NonOverlappingIterator::new(ctx.clone(), its)),
                mint,
                maxt,
            )));
        }

        let mut reversed: Vec<Box<dyn EntryIterator + 'a>> = Vec::with_capacity(its.len());
        for it in its {
            reversed.push(Box::new(ReversedEntryIterator::new(Box::new(
                TimeRangedIterator::new(it, mint, maxt),
            ))?));
        }
        reversed.reverse();

        Ok(Box::new(NonOverlappingIterator::new(ctx.clone(), reversed)))
    }

    /// Sample iterator over `[mint, maxt]` (nanoseconds, both ends inclusive)
    pub fn sample_iterator<'a>(
        &self,
        ctx: &QueryContext,
        mint: i64,
        maxt: i64,
        labels: &Labels,
        extractor: &'a dyn SampleExtractor,
    ) -> Box<dyn SampleIterator + 'a> {
        let mut its: Vec<Box<dyn SampleIterator + 'a>> = Vec::with_capacity(self.blocks.len() + 1);

        for b in &self.blocks {
            if maxt < b.mint || b.maxt < mint {
                continue;
            }
            its.push(
                EncBlock::new(self.encoding, b.clone()).sample_iterator(ctx, labels, extractor),
            );
        }

        if !self.head.is_empty() {
            its.push(self.head.sample_iterator(ctx, mint, maxt, labels, extractor));
        }

        Box::new(TimeRangedSampleIterator::new(
            Box::new(NonOverlappingSampleIterator::new(ctx.clone(), its)),
            mint,
            maxt,
        ))
    }

    /// Serialize the chunk, forcing a final cut first. The chunk is sealed
    /// afterwards and block offsets reflect the emitted layout.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.cut()?;

        let mut out: Vec<u8> = Vec::with_capacity(self.cut_block_size + 64);
        let mut eb = EncBuf::with_capacity(1 << 10);

        // Header: magic + version (+ encoding for V2).
        eb.put_be32(CHUNK_MAGIC);
        eb.put_byte(self.format);
        if self.format == CHUNK_FORMAT_V2 {
            eb.put_byte(self.encoding.tag());
        }
        out.extend_from_slice(eb.get());

        // Block payloads, each followed by its checksum.
        for b in &mut self.blocks {
            b.offset = out.len();
            eb.reset();
            eb.put_bytes(&b.b);
            eb.put_crc32c();
            out.extend_from_slice(eb.get());
        }

        // Metadata section with its own checksum.
        let metas_offset = out.len() as u64;
        eb.reset();
        eb.put_uvarint(self.blocks.len() as u64);
        for b in &self.blocks {
            eb.put_uvarint(b.num_entries as u64);
            eb.put_varint(b.mint);
            eb.put_varint(b.maxt);
            eb.put_uvarint(b.offset as u64);
            eb.put_uvarint(b.b.len() as u64);
        }
        eb.put_crc32c();
        out.extend_from_slice(eb.get());

        // Trailing pointer back to the metadata.
        eb.reset();
        eb.put_be64(metas_offset);
        out.extend_from_slice(eb.get());

        Ok(out)
    }
}

fn ns_to_time(ns: i64) -> SystemTime {
    if ns >= 0 {
        UNIX_EPOCH + Duration::from_nanos(ns as u64)
    } else {
        UNIX_EPOCH - Duration::from_nanos(ns.unsigned_abs())
    }
}
