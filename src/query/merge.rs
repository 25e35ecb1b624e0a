//! Sorted union of many cursors, driven by a min-heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{MatchIterator, MatchList};
use crate::error::Result;
use crate::DocId;

struct Entry<'a> {
    doc: DocId,
    iter: Box<dyn MatchIterator + 'a>,
}

impl PartialEq for Entry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}

impl Eq for Entry<'_> {}

impl PartialOrd for Entry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we pop the smallest doc
        other.doc.cmp(&self.doc)
    }
}

/// Lazy sorted union with deduplication across overlapping inputs.
///
/// Each step pops the cursor with the smallest current doc, re-pushes it if
/// it still has docs, and emits the doc unless it equals the previous one.
pub struct Merge<'a> {
    heap: BinaryHeap<Entry<'a>>,
    last: Option<DocId>,
}

/// Merge the given cursors into one deduplicated sorted stream.
pub fn merge<'a>(iters: Vec<Box<dyn MatchIterator + 'a>>) -> Merge<'a> {
    let mut heap = BinaryHeap::with_capacity(iters.len());
    for iter in iters {
        if !iter.finished() {
            heap.push(Entry {
                doc: iter.current(),
                iter,
            });
        }
    }
    Merge { heap, last: None }
}

/// Merge directly into a sink.
pub fn merge_into<'a>(
    iters: Vec<Box<dyn MatchIterator + 'a>>,
    sink: &mut impl MatchList,
) -> Result<()> {
    for doc in merge(iters) {
        sink.add(doc)?;
    }
    Ok(())
}

impl Iterator for Merge<'_> {
    type Item = DocId;

    fn next(&mut self) -> Option<DocId> {
        while let Some(mut entry) = self.heap.pop() {
            let doc = entry.doc;

            let (next, finished) = entry.iter.advance();
            if !finished {
                entry.doc = next;
                self.heap.push(entry);
            }

            if self.last != Some(doc) {
                self.last = Some(doc);
                return Some(doc);
            }
        }
        None
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::{BitSet, PostingList};

    fn list_of(docs: &[DocId]) -> PostingList {
        let mut list: PostingList = PostingList::with_capacity(1024);
        for &doc in docs {
            list.add(doc).unwrap();
        }
        list
    }

    fn merged(lists: &[&PostingList]) -> Vec<DocId> {
        let mut iters: Vec<Box<dyn MatchIterator + '_>> = Vec::new();
        for l in lists {
            iters.push(Box::new(l.iter().unwrap()));
        }
        merge(iters).collect()
    }

    #[test]
    fn test_merge_dedup() {
        let a = list_of(&[1, 3, 5]);
        let b = list_of(&[3, 4, 5, 6]);
        assert_eq!(merged(&[&a, &b]), [1, 3, 4, 5, 6]);
    }

    #[test]
    fn test_merge_disjoint() {
        let a = list_of(&[10, 30]);
        let b = list_of(&[5, 20, 40]);
        let c = list_of(&[1]);
        assert_eq!(merged(&[&a, &b, &c]), [1, 5, 10, 20, 30, 40]);
    }

    #[test]
    fn test_merge_identical_inputs() {
        let a = list_of(&[2, 4, 6]);
        let b = list_of(&[2, 4, 6]);
        assert_eq!(merged(&[&a, &b]), [2, 4, 6]);
    }

    #[test]
    fn test_merge_with_empty_input() {
        let a = list_of(&[1, 2]);
        let empty = list_of(&[]);
        assert_eq!(merged(&[&a, &empty]), [1, 2]);
        assert!(merged(&[&empty]).is_empty());
        assert!(merge(Vec::new()).next().is_none());
    }

    #[test]
    fn test_merge_mixed_representations() {
        let a = list_of(&[1, 8, 64]);
        let mut b = BitSet::with_capacity(128);
        for doc in [3u64, 8, 100] {
            b.add(doc).unwrap();
        }

        let iters: Vec<Box<dyn MatchIterator + '_>> =
            vec![Box::new(a.iter().unwrap()), Box::new(b.iter())];
        assert_eq!(merge(iters).collect::<Vec<_>>(), [1, 3, 8, 64, 100]);
    }

    #[test]
    fn test_merge_into_bitset() {
        let a = list_of(&[1, 3]);
        let b = list_of(&[2, 3]);
        let iters: Vec<Box<dyn MatchIterator + '_>> =
            vec![Box::new(a.iter().unwrap()), Box::new(b.iter().unwrap())];

        let mut out = BitSet::with_capacity(64);
        merge_into(iters, &mut out).unwrap();
        assert!(out.contains(1));
        assert!(out.contains(2));
        assert!(out.contains(3));
        assert!(!out.contains(4));
    }
}
