//! Tern - inverted-index storage and retrieval core
//!
//! This library provides:
//! - A self-delimiting varint codec for doc-id deltas
//! - Delta-encoded posting lists with embedded skip pointers and two skip
//!   placement policies
//! - Forward-only iterators with conditional skip-taking seeks
//! - Heap-driven merge and lock-step intersection over any mix of cursor
//!   implementations
//! - A dense doc-id bitmap with a De Bruijn scanning iterator
//! - A size-class buffer pool that recycles the chunks serialized lists
//!   live in, and a word directory built on top of it

pub mod error;
pub mod index;
pub mod pool;
pub mod query;
pub mod structures;

pub use error::{Error, Result};
pub use index::{IndexConfig, TextHit, TextIndex};
pub use pool::{Allocation, BufferPool, PoolRef};
pub use query::{intersect, merge, merge_into, Intersection, MatchIterator, MatchList, Merge};
pub use structures::{
    BitSet, BitSetIterator, NoPayload, PayloadFormat, PostingIterator, PostingList, SkipLayout,
    Stats, VarIntPayload,
};

/// Opaque document identifier, ordered numerically.
pub type DocId = u64;
