//! Per-query Statistics and Cancellation Context
//!
//! A `QueryContext` is created per request and handed to every iterator built
//! from a chunk. It carries:
//!
//! - a shared `ChunkStats` sink that iterators feed with monotone additions
//!   (head lines/bytes observed, compressed/decompressed bytes, decompressed
//!   lines)
//! - a cancellation flag; block iterators check it on every step and the
//!   composing iterators check it at block boundaries. A cancelled iterator
//!   terminates with `Error::Cancelled`.
//!
//! Counters are relaxed atomics: totals are read after the query completes,
//! and no ordering is needed between them.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Statistics sink shared by all iterators of one query
#[derive(Debug, Default)]
pub struct ChunkStats {
    head_chunk_lines: AtomicI64,
    head_chunk_bytes: AtomicI64,
    compressed_bytes: AtomicI64,
    decompressed_bytes: AtomicI64,
    decompressed_lines: AtomicI64,
}

impl ChunkStats {
    pub fn add_head_chunk_lines(&self, n: i64) {
        self.head_chunk_lines.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_head_chunk_bytes(&self, n: i64) {
        self.head_chunk_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_compressed_bytes(&self, n: i64) {
        self.compressed_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_decompressed_bytes(&self, n: i64) {
        self.decompressed_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_decompressed_lines(&self, n: i64) {
        self.decompressed_lines.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            head_chunk_lines: self.head_chunk_lines.load(Ordering::Relaxed),
            head_chunk_bytes: self.head_chunk_bytes.load(Ordering::Relaxed),
            compressed_bytes: self.compressed_bytes.load(Ordering::Relaxed),
            decompressed_bytes: self.decompressed_bytes.load(Ordering::Relaxed),
            decompressed_lines: self.decompressed_lines.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub head_chunk_lines: i64,
    pub head_chunk_bytes: i64,
    pub compressed_bytes: i64,
    pub decompressed_bytes: i64,
    pub decompressed_lines: i64,
}

/// Request-scoped context passed to iterator construction
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    stats: Arc<ChunkStats>,
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ChunkStats {
        &self.stats
    }

    /// Request cancellation; in-flight iterators observe it on their next step
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
