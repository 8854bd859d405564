//! Immutable Compressed Block
//!
//! A block is pure data: a compressed payload plus the metadata the chunk
//! persists for it. Blocks are only constructed by `MemChunk::cut` and
//! `MemChunk::from_bytes`.
//!
//! `EncBlock` binds a block to its chunk's encoding on demand, so a block
//! view handed to a caller can open its own decoding iterator without the
//! encoding ever being stored per block.

use bytes::Bytes;

use crate::compression::{Encoding, ReaderPool};
use crate::iter::{EntryIterator, NoopIterator, SampleIterator};
use crate::pipeline::{Labels, Pipeline, SampleExtractor};
use crate::stats::QueryContext;

use super::iterator::{EntryBufferedIterator, SampleBufferedIterator};

#[derive(Debug, Clone)]
pub struct Block {
    /// Compressed payload
    pub(crate) b: Bytes,
    pub(crate) num_entries: usize,
    pub(crate) mint: i64,
    pub(crate) maxt: i64,
    /// Byte offset of the payload in the serialized chunk; meaningful only
    /// after serialization or parse
    pub(crate) offset: usize,
    /// Line bytes before compression; known only for blocks cut in-process
    pub(crate) uncompressed_size: usize,
}

impl Block {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entries(&self) -> usize {
        self.num_entries
    }

    pub fn min_time(&self) -> i64 {
        self.mint
    }

    pub fn max_time(&self) -> i64 {
        self.maxt
    }

    pub fn compressed_len(&self) -> usize {
        self.b.len()
    }
}

/// A block bound to its chunk's encoding
#[derive(Debug, Clone)]
pub struct EncBlock {
    encoding: Encoding,
    block: Block,
}

impl EncBlock {
    pub(crate) fn new(encoding: Encoding, block: Block) -> Self {
        Self { encoding, block }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn offset(&self) -> usize {
        self.block.offset
    }

    pub fn entries(&self) -> usize {
        self.block.num_entries
    }

    pub fn min_time(&self) -> i64 {
        self.block.mint
    }

    pub fn max_time(&self) -> i64 {
        self.block.maxt
    }

    /// Streaming iterator over this block's entries
    pub fn iterator<'a>(
        &self,
        ctx: &QueryContext,
        labels: &Labels,
        pipeline: &'a dyn Pipeline,
    ) -> Box<dyn EntryIterator + 'a> {
        if self.block.b.is_empty() {
            return Box::new(NoopIterator);
        }
        Box::new(EntryBufferedIterator::new(
            ctx.clone(),
            ReaderPool::for_encoding(self.encoding),
            self.block.b.clone(),
            labels,
            pipeline,
        ))
    }

    /// Streaming sample iterator over this block's entries
    pub fn sample_iterator<'a>(
        &self,
        ctx: &QueryContext,
        labels: &Labels,
        extractor: &'a dyn SampleExtractor,
    ) -> Box<dyn SampleIterator + 'a> {
        if self.block.b.is_empty() {
            return Box::new(NoopIterator);
        }
        Box::new(SampleBufferedIterator::new(
            ctx.clone(),
            ReaderPool::for_encoding(self.encoding),
            self.block.b.clone(),
            labels,
            extractor,
        ))
    }
}
