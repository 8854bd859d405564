//! Error Types for Wire-level Decoding
//!
//! Decode primitives (`DecBuf`) carry a sticky error: once a read fails, every
//! subsequent read returns zero and the recorded error is surfaced when the
//! caller checks after the batch. The enum is `Clone` + `Copy` so the chunk
//! layer can wrap it without ceremony.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("varint overflows 64 bits")]
    InvalidVarint,
}

pub type Result<T> = std::result::Result<T, Error>;
