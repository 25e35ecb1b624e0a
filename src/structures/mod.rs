mod bitset;
mod posting;
pub mod varint;

pub use bitset::{BitSet, BitSetIterator};
pub use posting::{
    Doc, Docs, NoPayload, PayloadFormat, PostingIterator, PostingList, SkipLayout, Stats,
    VarIntPayload, BLOCK_TYPE_DOC, SKIP_PAYLOAD,
};
