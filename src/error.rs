//! Error types for tern

use crate::DocId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("doc {doc} is not larger than current max doc {max}")]
    OutOfOrder { doc: DocId, max: DocId },

    #[error("out of space: block needs {needed} bytes, {remaining} remaining")]
    OutOfSpace { needed: usize, remaining: usize },

    #[error("varint has no terminator within the buffer")]
    UnterminatedVarInt,

    #[error("corrupted posting data: {0}")]
    Corruption(String),

    #[error("doc {doc} exceeds bitset capacity of {capacity} bits")]
    BitSetCapacity { doc: DocId, capacity: u64 },

    #[error("buffer pool exhausted for chunk size {size}")]
    PoolExhausted { size: usize },

    #[error("invalid skip layout: {0}")]
    InvalidLayout(String),
}

pub type Result<T> = std::result::Result<T, Error>;
