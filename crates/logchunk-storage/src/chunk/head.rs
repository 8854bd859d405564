//! Head Buffer - the Uncompressed Staging Area
//!
//! Newly appended entries land here until the accumulated line bytes reach
//! the chunk's block size, at which point the chunk serializes the head
//! through a pooled compressing writer and cuts a new immutable block.
//!
//! Unlike blocks, the head can mutate between a query arriving and its
//! iterator being driven, so the head iterator snapshots: it runs the
//! pipeline over every entry up front, groups the survivors by parsed-label
//! hash into per-label streams, and hands those to a merge iterator. `maxt`
//! deliberately survives `reset()` as the high-water mark the chunk uses to
//! keep appends ordered across a cut.

use std::collections::HashMap;
use std::io::Write;

use bytes::Bytes;

use logchunk_core::{varint, Entry};

use crate::compression::WriterPool;
use crate::error::{Error, Result};
use crate::iter::{
    Direction, EntryIterator, MultiSeriesIterator, NoopIterator, Sample, SampleIterator, Series,
    Stream, StreamsIterator,
};
use crate::pipeline::{Labels, Pipeline, SampleExtractor};
use crate::pool::staging_pool;
use crate::stats::QueryContext;

use super::iterator::xxh64;

#[derive(Debug, Default)]
pub(crate) struct HeadBlock {
    entries: Vec<Entry>,
    /// Sum of line bytes, excluding varint overhead
    size: usize,
    mint: i64,
    maxt: i64,
}

impl HeadBlock {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn mint(&self) -> i64 {
        self.mint
    }

    pub(crate) fn maxt(&self) -> i64 {
        self.maxt
    }

    /// Append an entry. Equal timestamps are accepted; going backwards is
    /// `OutOfOrder` and leaves the head unchanged.
    pub(crate) fn append(&mut self, ts: i64, line: Bytes) -> Result<()> {
        if !self.is_empty() && self.maxt > ts {
            return Err(Error::OutOfOrder);
        }

        if self.is_empty() {
            self.mint = ts;
        }
        self.maxt = ts;
        self.size += line.len();
        self.entries.push(Entry::new(ts, line));

        Ok(())
    }

    /// Encode every entry into a pooled staging buffer and stream it through
    /// a compressing writer; returns the compressed payload.
    pub(crate) fn serialize(&self, pool: &WriterPool) -> Result<Vec<u8>> {
        let mut staging = staging_pool().get();
        for entry in &self.entries {
            varint::encode_varint(&mut staging, entry.timestamp);
            varint::encode_varint_u64(&mut staging, entry.line.len() as u64);
            staging.extend_from_slice(&entry.line);
        }

        let mut writer = pool.get_writer();
        let result = match writer.write_all(&staging) {
            Ok(()) => writer.finish(),
            Err(e) => {
                pool.put_writer(writer);
                Err(Error::from(e))
            }
        };

        // The staging buffer goes back on every exit path.
        staging_pool().put(staging);
        result
    }

    /// Clear entries after a cut, retaining capacity. `maxt` is kept as the
    /// high-water mark for ordering checks on later appends.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.mint = 0;
        self.size = 0;
    }

    /// Snapshot iterator over the head. Materializes eagerly because the head
    /// may be appended to after this call returns.
    pub(crate) fn iterator(
        &self,
        ctx: &QueryContext,
        direction: Direction,
        mint: i64,
        maxt: i64,
        labels: &Labels,
        pipeline: &dyn Pipeline,
    ) -> Box<dyn EntryIterator> {
        if self.is_empty() || maxt < self.mint || self.maxt < mint {
            return Box::new(NoopIterator);
        }

        let stats = ctx.stats();
        stats.add_head_chunk_lines(self.entries.len() as i64);

        let mut streams: Vec<Stream> = Vec::new();
        let mut index: HashMap<u64, usize> = HashMap::new();
        for entry in &self.entries {
            stats.add_head_chunk_bytes(entry.line.len() as i64);
            let Some((line, parsed)) = pipeline.process(&entry.line, labels) else {
                continue;
            };
            let key = parsed.hash();
            let idx = *index.entry(key).or_insert_with(|| {
                streams.push(Stream::new(parsed.to_string()));
                streams.len() - 1
            });
            streams[idx]
                .entries
                .push(Entry::new(entry.timestamp, Bytes::copy_from_slice(&line)));
        }

        if streams.is_empty() {
            return Box::new(NoopIterator);
        }
        Box::new(StreamsIterator::new(streams, direction))
    }

    /// Snapshot sample iterator over the head
    pub(crate) fn sample_iterator(
        &self,
        ctx: &QueryContext,
        mint: i64,
        maxt: i64,
        labels: &Labels,
        extractor: &dyn SampleExtractor,
    ) -> Box<dyn SampleIterator> {
        if self.is_empty() || maxt < self.mint || self.maxt < mint {
            return Box::new(NoopIterator);
        }

        let stats = ctx.stats();
        stats.add_head_chunk_lines(self.entries.len() as i64);

        let mut series: Vec<Series> = Vec::new();
        let mut index: HashMap<u64, usize> = HashMap::new();
        for entry in &self.entries {
            stats.add_head_chunk_bytes(entry.line.len() as i64);
            let Some((value, parsed)) = extractor.process(&entry.line, labels) else {
                continue;
            };
            let key = parsed.hash();
            let idx = *index.entry(key).or_insert_with(|| {
                series.push(Series::new(parsed.to_string()));
                series.len() - 1
            });
            series[idx].samples.push(Sample {
                timestamp: entry.timestamp,
                value,
                hash: xxh64(&entry.line),
            });
        }

        if series.is_empty() {
            return Box::new(NoopIterator);
        }
        Box::new(MultiSeriesIterator::new(series))
    }
}
