//! # bytecoder
//!
//! Byte stream compression with classic coders.  Every codec builds a static
//! model from the complete input, transforms buffers (not files), and needs the
//! original length to expand.
//!
//! * `huffman`, `shannon`, `arithmetic` are entropy coders over bytes
//! * `lz77`, `lz78`, `rle` are dictionary and run-length coders
//! * `crc32` is the integrity check used by the `frame` container
//!
//! The `codec` module collects the codecs behind one closed `Method` enum.

mod tools;
pub mod crc32;
pub mod freq;
pub mod huffman;
pub mod shannon;
pub mod arithmetic;
pub mod lz77;
pub mod lz78;
pub mod rle;
pub mod codec;
pub mod frame;

pub use tools::prefix_tree::{Code,CodeTable,PrefixTree,MAX_CODE_BITS};

type DYNERR = Box<dyn std::error::Error>;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("memory allocation failed")]
    Memory(#[from] std::collections::TryReserveError),
    #[error("corrupt stream: {0}")]
    Corrupt(&'static str),
    #[error("expected {expected} bytes, decoded {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("code exceeds {} bits",MAX_CODE_BITS)]
    CodeOverflow,
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge,
    #[error("checksum mismatch")]
    ChecksumMismatch
}

/// Allocate an output buffer for `len` bytes, failing gracefully if the
/// length is absurd (e.g. read from a damaged header).
fn output_buffer(len: usize) -> Result<Vec<u8>,Error> {
    let mut ans = Vec::new();
    ans.try_reserve_exact(len)?;
    Ok(ans)
}
