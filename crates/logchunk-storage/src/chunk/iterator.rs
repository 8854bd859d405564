//! Streaming Block Decode
//!
//! `BufferedIterator` walks one block's compressed payload entry by entry:
//!
//! 1. lazily opens a pooled decompressing reader on the first `next()`
//! 2. reads `varint(timestamp)` - clean end-of-stream here terminates
//! 3. reads `uvarint(line_len)`, rejecting lengths at or beyond the per-line
//!    cap
//! 4. leases a line buffer from the size-classed pool (trading up only when a
//!    longer line arrives) and fills it with exactly `line_len` bytes
//!
//! In steady state a `next()` call performs no allocation: the line buffer is
//! reused across entries. `close()` returns the reader and the line buffer to
//! their pools exactly once and is safe to call repeatedly.
//!
//! The public-facing wrappers (`EntryBufferedIterator`,
//! `SampleBufferedIterator`) run the caller's pipeline/extractor over each
//! decoded line, skipping entries the pipeline drops, and copy the processed
//! line out of pool-owned memory before yielding it.

use std::hash::Hasher;
use std::io::{BufReader, Read};

use bytes::Bytes;
use twox_hash::XxHash64;

use logchunk_core::{varint, Entry, MAX_LINE_LENGTH};

use crate::compression::{CompressionReader, ReaderPool};
use crate::error::{Error, Result};
use crate::iter::{EntryIterator, Sample, SampleIterator};
use crate::pipeline::{Labels, Pipeline, SampleExtractor};
use crate::pool::line_pool;
use crate::stats::QueryContext;

/// Read buffer in front of the decompressor
const BUF_READER_CAPACITY: usize = 4096;

/// xxhash64 with seed 0, the sample hash of a raw line
pub(crate) fn xxh64(b: &[u8]) -> u64 {
    let mut h = XxHash64::with_seed(0);
    h.write(b);
    h.finish()
}

/// Corrupt-stream errors from the decompressor surface as `Decompression`;
/// anything else (short reads, truncation) is plain io.
fn decode_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::InvalidData => Error::Decompression(e.to_string()),
        _ => Error::Io(e.to_string()),
    }
}

/// Cursor over one block's compressed payload
pub(crate) struct BufferedIterator {
    ctx: QueryContext,
    pool: &'static ReaderPool,
    data: Option<Bytes>,
    reader: Option<BufReader<CompressionReader>>,
    buf: Option<Vec<u8>>,
    line_len: usize,
    ts: i64,
    err: Option<Error>,
    closed: bool,
}

impl BufferedIterator {
    pub(crate) fn new(ctx: QueryContext, pool: &'static ReaderPool, data: Bytes) -> Self {
        ctx.stats().add_compressed_bytes(data.len() as i64);
        Self {
            ctx,
            pool,
            data: Some(data),
            reader: None,
            buf: None,
            line_len: 0,
            ts: 0,
            err: None,
            closed: false,
        }
    }

    pub(crate) fn next(&mut self) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        if self.ctx.is_cancelled() {
            self.err = Some(Error::Cancelled);
            self.release();
            return false;
        }
        if self.reader.is_none() {
            // Deferred so an iterator that is never advanced costs nothing.
            let data = self.data.take().unwrap_or_default();
            self.reader = Some(BufReader::with_capacity(
                BUF_READER_CAPACITY,
                self.pool.get_reader(data),
            ));
        }

        match self.move_next() {
            Ok(true) => {
                self.ctx
                    .stats()
                    .add_decompressed_bytes((self.line_len + 2 * varint::MAX_VARINT_LEN) as i64);
                self.ctx.stats().add_decompressed_lines(1);
                true
            }
            Ok(false) => {
                self.release();
                false
            }
            Err(e) => {
                self.err = Some(e);
                self.release();
                false
            }
        }
    }

    fn move_next(&mut self) -> Result<bool> {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(false),
        };

        let ts = match varint::try_read_varint(reader).map_err(decode_error)? {
            Some(ts) => ts,
            None => return Ok(false),
        };

        let line_len = varint::read_uvarint(reader).map_err(decode_error)? as usize;
        if line_len >= MAX_LINE_LENGTH {
            return Err(Error::LineTooLong {
                length: line_len,
                limit: MAX_LINE_LENGTH,
            });
        }

        // Trade the buffer up when a longer line arrives; otherwise reuse.
        let needs_larger = match &self.buf {
            Some(buf) => buf.len() < line_len,
            None => true,
        };
        if needs_larger {
            if let Some(old) = self.buf.take() {
                line_pool().put(old);
            }
            self.buf = Some(line_pool().get(line_len));
        }

        let buf = self
            .buf
            .as_mut()
            .ok_or_else(|| Error::Io("line buffer unavailable".to_string()))?;
        reader.read_exact(&mut buf[..line_len]).map_err(decode_error)?;

        self.ts = ts;
        self.line_len = line_len;
        Ok(true)
    }

    pub(crate) fn timestamp(&self) -> i64 {
        self.ts
    }

    pub(crate) fn line(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..self.line_len],
            None => &[],
        }
    }

    pub(crate) fn error(&self) -> Option<Error> {
        self.err.clone()
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(reader) = self.reader.take() {
            self.pool.put_reader(reader.into_inner());
        }
        if let Some(buf) = self.buf.take() {
            line_pool().put(buf);
        }
        self.data = None;
        self.line_len = 0;
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        self.release();
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Block iterator that drives a pipeline over each decoded entry
pub(crate) struct EntryBufferedIterator<'a> {
    inner: BufferedIterator,
    pipeline: &'a dyn Pipeline,
    base_labels: Labels,
    curr: Entry,
    curr_labels: String,
}

impl<'a> EntryBufferedIterator<'a> {
    pub(crate) fn new(
        ctx: QueryContext,
        pool: &'static ReaderPool,
        data: Bytes,
        labels: &Labels,
        pipeline: &'a dyn Pipeline,
    ) -> Self {
        Self {
            inner: BufferedIterator::new(ctx, pool, data),
            pipeline,
            base_labels: labels.clone(),
            curr: Entry::new(0, Bytes::new()),
            curr_labels: String::new(),
        }
    }
}

impl EntryIterator for EntryBufferedIterator<'_> {
    fn next(&mut self) -> bool {
        while self.inner.next() {
            let ts = self.inner.timestamp();
            let Some((line, parsed)) = self.pipeline.process(self.inner.line(), &self.base_labels)
            else {
                continue;
            };
            self.curr = Entry::new(ts, Bytes::copy_from_slice(&line));
            self.curr_labels = parsed.to_string();
            return true;
        }
        false
    }

    fn entry(&self) -> Entry {
        self.curr.clone()
    }

    fn labels(&self) -> String {
        self.curr_labels.clone()
    }

    fn error(&self) -> Option<Error> {
        self.inner.error()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Block iterator that drives a sample extractor over each decoded entry
pub(crate) struct SampleBufferedIterator<'a> {
    inner: BufferedIterator,
    extractor: &'a dyn SampleExtractor,
    base_labels: Labels,
    curr: Sample,
    curr_labels: String,
}

impl<'a> SampleBufferedIterator<'a> {
    pub(crate) fn new(
        ctx: QueryContext,
        pool: &'static ReaderPool,
        data: Bytes,
        labels: &Labels,
        extractor: &'a dyn SampleExtractor,
    ) -> Self {
        Self {
            inner: BufferedIterator::new(ctx, pool, data),
            extractor,
            base_labels: labels.clone(),
            curr: Sample::default(),
            curr_labels: String::new(),
        }
    }
}

impl SampleIterator for SampleBufferedIterator<'_> {
    fn next(&mut self) -> bool {
        while self.inner.next() {
            let raw = self.inner.line();
            let Some((value, parsed)) = self.extractor.process(raw, &self.base_labels) else {
                continue;
            };
            self.curr = Sample {
                timestamp: self.inner.timestamp(),
                value,
                hash: xxh64(raw),
            };
            self.curr_labels = parsed.to_string();
            return true;
        }
        false
    }

    fn sample(&self) -> Sample {
        self.curr
    }

    fn labels(&self) -> String {
        self.curr_labels.clone()
    }

    fn error(&self) -> Option<Error> {
        self.inner.error()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
