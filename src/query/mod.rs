//! Set operations over doc-id cursors.
//!
//! `MatchIterator` is the capability every doc-id source exposes; merge and
//! intersection work against it alone, so posting lists and bitmaps mix
//! freely in one operation.

mod intersection;
mod merge;

pub use intersection::{intersect, Intersection};
pub use merge::{merge, merge_into, Merge};

use crate::error::Result;
use crate::DocId;

/// Forward-only cursor over a sorted set of doc ids.
pub trait MatchIterator {
    /// Current doc id. Constant time.
    fn current(&self) -> DocId;

    /// True once the cursor has moved past its last doc.
    fn finished(&self) -> bool;

    /// Advance to the next doc. Returns the new current doc id and whether
    /// the cursor is now exhausted (the doc id is then the final one).
    /// Panics if the cursor was already finished.
    fn advance(&mut self) -> (DocId, bool);

    /// Advance to the first doc >= `target`. Panics if the cursor is
    /// finished or `target` lies behind the current position; cursors are
    /// forward-only.
    fn seek(&mut self, target: DocId) -> (DocId, bool);

    /// Payload bytes attached to the current doc, when the backing
    /// representation carries any.
    fn payload(&self) -> &[u8] {
        &[]
    }
}

/// Sink for the output of a set operation.
pub trait MatchList {
    fn add(&mut self, doc: DocId) -> Result<()>;
}

impl MatchList for Vec<DocId> {
    fn add(&mut self, doc: DocId) -> Result<()> {
        self.push(doc);
        Ok(())
    }
}
