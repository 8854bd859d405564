//! Compression Adapter - Uniform Writers and Readers per Encoding
//!
//! This module gives the chunk a single interface over the supported
//! compression codecs. A one-byte `Encoding` tag is persisted in the V2 chunk
//! header and selects the codec for every block in that chunk.
//!
//! ## Encoding Tags
//!
//! Tag values are a wire contract and must never be renumbered:
//!
//! | Tag | Codec                 |
//! |-----|-----------------------|
//! | 0   | None (stored raw)     |
//! | 1   | Gzip                  |
//! | 2   | Snappy (framed)       |
//! | 3   | LZ4 (framed)          |
//!
//! ## Pools
//!
//! `WriterPool` and `ReaderPool` exist per encoding and are shared
//! process-wide. The codec crates expose no way to re-arm compressor state
//! onto a new source or sink, so the pools amortize what can be amortized:
//! the writer pool recycles sink buffers reclaimed through `put_writer`, and
//! the read path leases its line buffers from the size-classed pool in
//! `crate::pool`. Both pools are safe for concurrent `get`/`put`.
//!
//! ## Example
//! ```ignore
//! let pool = WriterPool::for_encoding(Encoding::Gzip);
//! let mut w = pool.get_writer();
//! w.write_all(&uncompressed)?;
//! let compressed = w.finish()?;
//!
//! let mut r = ReaderPool::for_encoding(Encoding::Gzip).get_reader(compressed.into());
//! r.read_to_end(&mut out)?;
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Mutex, OnceLock};

use bytes::{Buf, Bytes};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sink buffers kept per writer pool
const MAX_POOLED_SINKS: usize = 16;

/// Compression codec tag persisted in the V2 chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Encoding {
    None = 0,
    Gzip = 1,
    Snappy = 2,
    Lz4 = 3,
}

impl Encoding {
    /// The wire tag byte for this encoding
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// All supported encodings, in tag order
    pub fn all() -> [Encoding; 4] {
        [
            Encoding::None,
            Encoding::Gzip,
            Encoding::Snappy,
            Encoding::Lz4,
        ]
    }
}

impl TryFrom<u8> for Encoding {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Encoding::None),
            1 => Ok(Encoding::Gzip),
            2 => Ok(Encoding::Snappy),
            3 => Ok(Encoding::Lz4),
            _ => Err(Error::InvalidEncoding(value)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::None => write!(f, "none"),
            Encoding::Gzip => write!(f, "gzip"),
            Encoding::Snappy => write!(f, "snappy"),
            Encoding::Lz4 => write!(f, "lz4"),
        }
    }
}

/// A compressing writer over an owned sink buffer
///
/// `finish` flushes the codec and yields the compressed bytes; a writer that
/// will not be finished (error paths) should go back to its pool via
/// `WriterPool::put_writer` so the sink capacity is reclaimed.
pub enum CompressionWriter {
    None(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
    Snappy(snap::write::FrameEncoder<Vec<u8>>),
    Lz4(Box<lz4_flex::frame::FrameEncoder<Vec<u8>>>),
}

impl CompressionWriter {
    fn new(encoding: Encoding, sink: Vec<u8>) -> Self {
        match encoding {
            Encoding::None => CompressionWriter::None(sink),
            Encoding::Gzip => {
                CompressionWriter::Gzip(GzEncoder::new(sink, flate2::Compression::default()))
            }
            Encoding::Snappy => CompressionWriter::Snappy(snap::write::FrameEncoder::new(sink)),
            Encoding::Lz4 => {
                CompressionWriter::Lz4(Box::new(lz4_flex::frame::FrameEncoder::new(sink)))
            }
        }
    }

    /// Flush all pending state and return the compressed bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        match self {
            CompressionWriter::None(sink) => Ok(sink),
            CompressionWriter::Gzip(enc) => enc.finish().map_err(Error::from),
            CompressionWriter::Snappy(mut enc) => {
                enc.flush()?;
                enc.into_inner()
                    .map_err(|e| Error::Io(e.error().to_string()))
            }
            CompressionWriter::Lz4(enc) => {
                enc.finish().map_err(|e| Error::Io(e.to_string()))
            }
        }
    }

    /// Abandon any pending compression state and reclaim the sink buffer
    fn into_sink(self) -> Option<Vec<u8>> {
        match self {
            CompressionWriter::None(sink) => Some(sink),
            CompressionWriter::Gzip(enc) => enc.finish().ok(),
            CompressionWriter::Snappy(enc) => enc.into_inner().ok(),
            CompressionWriter::Lz4(enc) => enc.finish().ok(),
        }
    }
}

impl Write for CompressionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressionWriter::None(sink) => sink.write(buf),
            CompressionWriter::Gzip(enc) => enc.write(buf),
            CompressionWriter::Snappy(enc) => enc.write(buf),
            CompressionWriter::Lz4(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressionWriter::None(sink) => sink.flush(),
            CompressionWriter::Gzip(enc) => enc.flush(),
            CompressionWriter::Snappy(enc) => enc.flush(),
            CompressionWriter::Lz4(enc) => enc.flush(),
        }
    }
}

/// A decompressing reader over an owned `Bytes` payload
pub enum CompressionReader {
    None(bytes::buf::Reader<Bytes>),
    Gzip(GzDecoder<bytes::buf::Reader<Bytes>>),
    Snappy(snap::read::FrameDecoder<bytes::buf::Reader<Bytes>>),
    Lz4(lz4_flex::frame::FrameDecoder<bytes::buf::Reader<Bytes>>),
}

impl Read for CompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CompressionReader::None(r) => r.read(buf),
            CompressionReader::Gzip(r) => r.read(buf),
            CompressionReader::Snappy(r) => r.read(buf),
            CompressionReader::Lz4(r) => r.read(buf),
        }
    }
}

/// Hands out compressing writers for one encoding
pub struct WriterPool {
    encoding: Encoding,
    sinks: Mutex<Vec<Vec<u8>>>,
}

impl WriterPool {
    fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide pool for the given encoding
    pub fn for_encoding(encoding: Encoding) -> &'static WriterPool {
        static POOLS: OnceLock<[WriterPool; 4]> = OnceLock::new();
        let pools = POOLS.get_or_init(|| Encoding::all().map(WriterPool::new));
        &pools[encoding.tag() as usize]
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Lease a writer, reusing a recycled sink buffer when one is available
    pub fn get_writer(&self) -> CompressionWriter {
        let sink = self
            .sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_default();
        CompressionWriter::new(self.encoding, sink)
    }

    /// Return an unfinished writer, reclaiming its sink buffer
    pub fn put_writer(&self, writer: CompressionWriter) {
        if let Some(mut sink) = writer.into_sink() {
            sink.clear();
            let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
            if sinks.len() < MAX_POOLED_SINKS {
                sinks.push(sink);
            }
        }
    }
}

/// Hands out decompressing readers for one encoding
pub struct ReaderPool {
    encoding: Encoding,
}

impl ReaderPool {
    /// The process-wide pool for the given encoding
    pub fn for_encoding(encoding: Encoding) -> &'static ReaderPool {
        static POOLS: OnceLock<[ReaderPool; 4]> = OnceLock::new();
        let pools = POOLS.get_or_init(|| Encoding::all().map(|encoding| ReaderPool { encoding }));
        &pools[encoding.tag() as usize]
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Lease a decompressing reader over the given payload
    pub fn get_reader(&self, b: Bytes) -> CompressionReader {
        match self.encoding {
            Encoding::None => CompressionReader::None(b.reader()),
            Encoding::Gzip => CompressionReader::Gzip(GzDecoder::new(b.reader())),
            Encoding::Snappy => {
                CompressionReader::Snappy(snap::read::FrameDecoder::new(b.reader()))
            }
            Encoding::Lz4 => CompressionReader::Lz4(lz4_flex::frame::FrameDecoder::new(b.reader())),
        }
    }

    /// Release a reader lease. Decompressor state cannot be re-armed onto a
    /// new source by the underlying codecs, so the lease ends here; line and
    /// buffer reuse is handled by `crate::pool`.
    pub fn put_reader(&self, reader: CompressionReader) {
        drop(reader);
    }
}
