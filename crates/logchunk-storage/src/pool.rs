//! Byte-buffer Pools for the Hot Paths
//!
//! Two pools back the chunk's allocation discipline:
//!
//! - `BufferPool`: plain buffers for the serialization staging area. The head
//!   buffer encodes its entries into a pooled staging buffer before streaming
//!   them through the compressor, and returns it on every exit path.
//! - `BytesPool`: size-classed buffers for decoded lines. A block iterator
//!   leases a buffer sized for the line it is about to read and keeps it
//!   across entries, only trading up when a longer line appears; the buffer
//!   goes back to its class on close. In steady state `next()` allocates
//!   nothing.
//!
//! Leases are plain `Vec<u8>` moves, so double-return and use-after-return
//! are unrepresentable: returning a buffer gives up ownership.
//!
//! Free lists are bounded so a burst of large queries cannot pin memory
//! forever.

use std::sync::{Mutex, OnceLock};

/// Buffers kept per free list
const MAX_POOLED: usize = 64;

/// Smallest line-buffer size class
const MIN_CLASS: usize = 512;

/// Largest pooled line-buffer size class; longer lines get one-off buffers
const MAX_CLASS: usize = 16 * 1024 * 1024;

/// Pool of uniform staging buffers
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease an empty buffer, retaining whatever capacity it accumulated
    pub fn get(&self) -> Vec<u8> {
        self.free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_default()
    }

    /// Return a buffer; contents are discarded
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < MAX_POOLED {
            free.push(buf);
        }
    }
}

/// Size-classed pool of line buffers
///
/// Classes double from `MIN_CLASS` up to `MAX_CLASS`. Leased buffers have
/// `len == capacity` (callers slice to the length they need), so refilling a
/// recycled buffer never re-zeroes it.
#[derive(Debug)]
pub struct BytesPool {
    classes: Vec<SizeClass>,
}

#[derive(Debug)]
struct SizeClass {
    size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BytesPool {
    pub fn new() -> Self {
        let mut classes = Vec::new();
        let mut size = MIN_CLASS;
        while size <= MAX_CLASS {
            classes.push(SizeClass {
                size,
                free: Mutex::new(Vec::new()),
            });
            size *= 2;
        }
        Self { classes }
    }

    /// Lease a buffer with `len >= size`
    pub fn get(&self, size: usize) -> Vec<u8> {
        for class in &self.classes {
            if class.size >= size {
                let recycled = class
                    .free
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pop();
                return recycled.unwrap_or_else(|| vec![0u8; class.size]);
            }
        }
        // Beyond the largest class: a one-off buffer, not pooled on return.
        vec![0u8; size]
    }

    /// Return a buffer to the class its capacity matches, if any
    pub fn put(&self, buf: Vec<u8>) {
        for class in &self.classes {
            if class.size == buf.len() {
                let mut free = class.free.lock().unwrap_or_else(|e| e.into_inner());
                if free.len() < MAX_POOLED {
                    free.push(buf);
                }
                return;
            }
        }
    }
}

impl Default for BytesPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide staging-buffer pool for head serialization
pub(crate) fn staging_pool() -> &'static BufferPool {
    static POOL: OnceLock<BufferPool> = OnceLock::new();
    POOL.get_or_init(BufferPool::new)
}

/// Process-wide line-buffer pool for block iterators
pub(crate) fn line_pool() -> &'static BytesPool {
    static POOL: OnceLock<BytesPool> = OnceLock::new();
    POOL.get_or_init(BytesPool::new)
}
