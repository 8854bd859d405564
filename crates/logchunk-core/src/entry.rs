//! Log Entry Data Structure
//!
//! This module defines the core `Entry` type - the fundamental unit of data in
//! a log stream.
//!
//! ## What is an Entry?
//! An entry is a single log line together with the instant it was observed:
//! - **timestamp**: nanoseconds since the Unix epoch (signed, so pre-1970
//!   values are representable)
//! - **line**: the log line payload (UTF-8 by convention, arbitrary bytes on
//!   the wire)
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for zero-copy operations (no allocations when slicing
//!   a decoded block or handing lines to a pipeline)
//! - Implements `Serialize`/`Deserialize` for metadata and test tooling
//! - Timestamp is i64 nanoseconds to match the chunk wire format exactly
//!
//! ## Example
//! ```ignore
//! let entry = Entry::new(
//!     1_700_000_000_000_000_000,          // nanoseconds since epoch
//!     Bytes::from("level=info msg=\"ready\""),
//! );
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum accepted length of a single log line, in bytes.
///
/// A decoded line length at or above this limit is treated as corruption (or a
/// hostile payload) and terminates the affected iterator.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024 * 1024;

/// A single entry in a log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Timestamp in nanoseconds since epoch
    pub timestamp: i64,

    /// The log line payload
    pub line: Bytes,
}

impl Entry {
    pub fn new(timestamp: i64, line: Bytes) -> Self {
        Self { timestamp, line }
    }

    /// Size of this entry as accounted by the head buffer (line bytes only,
    /// excluding varint overhead)
    pub fn size(&self) -> usize {
        self.line.len()
    }
}
