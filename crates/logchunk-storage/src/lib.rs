//! In-memory Compressed Log Chunk
//!
//! This crate implements the unit of storage and query for a single log
//! stream: a chunk that accumulates `(timestamp, line)` entries in an
//! uncompressed head buffer, periodically compresses them into immutable
//! blocks, and serializes to a self-describing, checksummed binary container.
//!
//! ## Write Path
//!
//! ```text
//! caller ──► MemChunk::append ──► head buffer ──► (head full) cut()
//!                                                      │
//!                                     compress through WriterPool
//!                                                      │
//!                                                      ▼
//!                                             immutable Block
//! ```
//!
//! ## Read Path
//!
//! ```text
//! stored bytes ──► MemChunk::from_bytes ──► per-block streaming iterator
//!                                                      │
//!                                        pipeline / extractor per line
//!                                                      │
//!                                                      ▼
//!                                    merged iterator over the time range
//! ```
//!
//! ## Guarantees
//!
//! - Byte-exact round-tripping across format versions V1 and V2
//! - Non-decreasing timestamps within the chunk; `OutOfOrder` on violation
//! - CRC32-Castagnoli over every block payload and over the metadata
//!   section; a damaged block is dropped, damaged metadata fails the parse
//! - Streaming decode with pooled buffers: steady-state iteration does not
//!   allocate
//!
//! ## Example
//!
//! ```ignore
//! use logchunk_storage::{Direction, Encoding, Labels, MemChunk, NoopPipeline, QueryContext};
//!
//! let mut chunk = MemChunk::new(Encoding::Gzip, 256 * 1024, 1 << 20);
//! chunk.append(&entry)?;
//! let bytes = chunk.to_bytes()?;
//!
//! let chunk = MemChunk::from_bytes(bytes.into(), 256 * 1024, 1 << 20)?;
//! let ctx = QueryContext::new();
//! let mut it = chunk.iterator(&ctx, from, through, Direction::Forward, &labels, &pipeline)?;
//! while it.next() {
//!     handle(it.entry());
//! }
//! it.close()?;
//! ```

pub mod chunk;
pub mod compression;
pub mod error;
pub mod iter;
pub mod pipeline;
pub mod pool;
pub mod stats;

pub use chunk::{Block, EncBlock, MemChunk, BLOCKS_PER_CHUNK, CHUNK_MAGIC};
pub use compression::{Encoding, ReaderPool, WriterPool};
pub use error::{Error, Result};
pub use iter::{Direction, EntryIterator, Sample, SampleIterator};
pub use pipeline::{CountExtractor, Labels, NoopPipeline, Pipeline, SampleExtractor};
pub use stats::{ChunkStats, QueryContext, StatsSnapshot};

pub use logchunk_core::{Entry, MAX_LINE_LENGTH};
