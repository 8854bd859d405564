pub mod codec;
pub mod entry;
pub mod error;
pub mod varint;

pub use codec::{DecBuf, EncBuf};
pub use entry::{Entry, MAX_LINE_LENGTH};
pub use error::{Error, Result};
