//! Chunk Error Types
//!
//! This module defines all error types that can occur while building, parsing,
//! or iterating a chunk.
//!
//! ## Error Categories
//!
//! ### Write-side Errors
//! - `OutOfOrder`: an appended entry is older than what the chunk already
//!   holds. Recoverable by the caller (drop or reorder); chunk state is
//!   unchanged.
//!
//! ### Chunk-fatal Parse Errors
//! - `InvalidMagic`, `InvalidVersion`, `InvalidEncoding`: the header is not a
//!   chunk we understand
//! - `InvalidChecksum`: the metadata section fails its CRC
//! - `HeaderCorrupt` / `BlockMetaCorrupt`: a primitive read underflowed
//!
//! A per-block CRC mismatch is deliberately *not* in this list: a damaged
//! block is dropped with a warning and parsing continues.
//!
//! ### Read-side Errors
//! - `LineTooLong`: a decoded line length exceeds the per-line cap (corruption
//!   or a hostile payload); terminates the affected iterator only
//! - `Decompression` / `Io`: codec failures surfaced from an iterator
//! - `Cancelled`: the query context was cancelled mid-iteration
//!
//! The enum is `Clone` so a sticky iterator error can be returned from both
//! `error()` and an idempotent `close()`; io errors are captured by message
//! for the same reason.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("entry out of order")]
    OutOfOrder,

    #[error("invalid magic number {0:#010x}")]
    InvalidMagic(u32),

    #[error("invalid chunk format version {0}")]
    InvalidVersion(u8),

    #[error("invalid encoding tag {0}")]
    InvalidEncoding(u8),

    #[error("checksum mismatch")]
    InvalidChecksum,

    #[error("corrupt chunk header: {0}")]
    HeaderCorrupt(#[source] logchunk_core::Error),

    #[error("corrupt block metadata: {0}")]
    BlockMetaCorrupt(#[source] logchunk_core::Error),

    #[error("line too long: {length} bytes, maximum {limit}")]
    LineTooLong { length: usize, limit: usize },

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("query cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
