//! In-memory word directory over pooled posting lists.
//!
//! Each word maps to a [`PoolRef`] whose chunk holds the word's serialized
//! posting list; payloads are varint term frequencies. Lists are immutable
//! once stored: updates build a new list, publish it, and release the old
//! chunk back to the pool.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pool::{BufferPool, PoolRef};
use crate::query::{intersect, MatchIterator};
use crate::structures::{varint, PostingList, SkipLayout, VarIntPayload, SKIP_PAYLOAD};
use crate::DocId;

/// Tuning knobs for the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Ceiling on total bytes per pool size class.
    pub max_buffer_size: usize,
    /// A skip block is reserved before every this-many documents.
    pub skip_interval: usize,
    /// Placement policy applied when a list is finalized.
    pub skip_layout: SkipLayout,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            max_buffer_size: 1 << 20,
            skip_interval: 16,
            skip_layout: SkipLayout::Next,
        }
    }
}

/// One scored result from [`TextIndex::query`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextHit {
    pub doc: DocId,
    pub score: f64,
}

/// Word → posting-list directory backed by a [`BufferPool`].
pub struct TextIndex {
    words: FxHashMap<String, PoolRef>,
    pool: BufferPool,
    config: IndexConfig,
}

impl TextIndex {
    pub fn new(config: IndexConfig) -> Self {
        TextIndex {
            words: FxHashMap::default(),
            pool: BufferPool::new(config.max_buffer_size),
            config,
        }
    }

    /// Build a finalized posting list for `word` from sorted `(doc, tf)`
    /// pairs and store it, replacing any previous list.
    pub fn insert<R: Rng>(
        &mut self,
        word: &str,
        postings: &[(DocId, u64)],
        rng: &mut R,
    ) -> Result<()> {
        let list = build_list(postings, &self.config, rng)?;
        self.replace(word, &list)
    }

    /// Store an already-built list under `word`, releasing the old chunk.
    pub fn replace(&mut self, word: &str, list: &PostingList<VarIntPayload>) -> Result<()> {
        if let Some(old) = self.words.remove(word) {
            log::debug!("replacing posting list for {:?}", word);
            if let Some(old_alloc) = self.pool.find(old) {
                old_alloc.free();
            }
        }

        let size = list.size();
        let alloc = self.pool.alloc(size)?;
        {
            let mut raw = alloc.raw();
            raw.resize(size, 0);
            list.to_bytes(&mut raw);
        }
        self.words.insert(word.to_string(), alloc.reference());
        Ok(())
    }

    /// Decode the stored posting list for `word`.
    pub fn lookup(&self, word: &str) -> Result<Option<PostingList<VarIntPayload>>> {
        let Some(&reference) = self.words.get(word) else {
            return Ok(None);
        };
        let alloc = self
            .pool
            .find(reference)
            .ok_or_else(|| Error::Corruption(format!("dangling pool reference for {:?}", word)))?;
        let raw = alloc.raw();
        Ok(Some(PostingList::from_bytes(&raw)?))
    }

    /// Docs containing every word, scored by summed tf/df. A word with no
    /// posting list makes the result empty.
    pub fn query(&self, words: &[&str]) -> Result<Vec<TextHit>> {
        let mut lists = Vec::with_capacity(words.len());
        let mut dfs = Vec::with_capacity(words.len());

        for word in words {
            match self.lookup(word)? {
                Some(list) => {
                    dfs.push(list.stats()?.doc_count as f64);
                    lists.push(list);
                }
                None => return Ok(Vec::new()),
            }
        }
        log::debug!("query over {} posting lists", lists.len());

        let mut iters: Vec<Box<dyn MatchIterator + '_>> = Vec::with_capacity(lists.len());
        for list in &lists {
            iters.push(Box::new(list.iter()?));
        }

        let mut hits = Vec::new();
        let mut isect = intersect(iters);
        while let Some(doc) = isect.next() {
            let mut score = 0.0;
            for (payload, df) in isect.payloads().zip(&dfs) {
                let (_, tf) = varint::read(payload)?;
                score += tf as f64 / df;
            }
            hits.push(TextHit { doc, score });
        }
        Ok(hits)
    }
}

/// Encode sorted `(doc, tf)` pairs into a finalized, skip-wired list.
fn build_list<R: Rng>(
    postings: &[(DocId, u64)],
    config: &IndexConfig,
    rng: &mut R,
) -> Result<PostingList<VarIntPayload>> {
    // exact byte budget: one delta + tf varint pair per doc, one skip block
    // per interval
    let mut capacity = 0;
    let mut last = 0;
    for (i, &(doc, tf)) in postings.iter().enumerate() {
        if i > 0 && doc <= last {
            return Err(Error::OutOfOrder { doc, max: last });
        }
        capacity += varint::size(doc - last) + varint::size(tf);
        last = doc;
    }
    capacity += (postings.len() / config.skip_interval) * (1 + SKIP_PAYLOAD);

    let mut list = PostingList::with_format(capacity, VarIntPayload);
    let mut tf_buf = [0u8; 10];
    for (i, &(doc, tf)) in postings.iter().enumerate() {
        if i > 0 && i % config.skip_interval == 0 {
            list.add_skip()?;
        }
        let n = varint::write(tf, &mut tf_buf);
        list.add_with_payload(doc, &tf_buf[..n])?;
    }

    list.build_skips(config.skip_layout, rng)?;
    Ok(list)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn test_insert_lookup_roundtrip() {
        let mut index = TextIndex::new(IndexConfig::default());
        let postings: Vec<(DocId, u64)> = (0..50).map(|i| (i * 5, i % 7 + 1)).collect();
        index.insert("walrus", &postings, &mut rng()).unwrap();

        let list = index.lookup("walrus").unwrap().unwrap();
        let decoded: Vec<(DocId, u64)> = list
            .docs()
            .map(|d| {
                let d = d.unwrap();
                (d.doc, varint::read(d.payload).unwrap().1)
            })
            .collect();
        assert_eq!(decoded, postings);

        assert!(index.lookup("absent").unwrap().is_none());
    }

    #[test]
    fn test_replace_releases_old_chunk() {
        let mut index = TextIndex::new(IndexConfig::default());
        index.insert("w", &[(1, 1), (2, 1)], &mut rng()).unwrap();
        let first = index.words["w"];

        // same-sized list lands in the chunk the first insert vacated
        index.insert("w", &[(3, 1), (4, 1)], &mut rng()).unwrap();
        assert_eq!(index.words["w"], first);

        let docs: Vec<DocId> = index
            .lookup("w")
            .unwrap()
            .unwrap()
            .docs()
            .map(|d| d.unwrap().doc)
            .collect();
        assert_eq!(docs, [3, 4]);
    }

    #[test]
    fn test_query_scores() {
        let mut index = TextIndex::new(IndexConfig::default());
        // "fox" in docs 1,2,4 — "red" in docs 2,4,8
        index
            .insert("fox", &[(1, 2), (2, 1), (4, 3)], &mut rng())
            .unwrap();
        index
            .insert("red", &[(2, 5), (4, 1), (8, 1)], &mut rng())
            .unwrap();

        let hits = index.query(&["fox", "red"]).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc, 2);
        assert_eq!(hits[1].doc, 4);
        // tf/df with df = 3 for both words
        assert!((hits[0].score - (1.0 / 3.0 + 5.0 / 3.0)).abs() < 1e-9);
        assert!((hits[1].score - (3.0 / 3.0 + 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_query_unknown_word_is_empty() {
        let mut index = TextIndex::new(IndexConfig::default());
        index.insert("fox", &[(1, 1)], &mut rng()).unwrap();
        assert!(index.query(&["fox", "unicorn"]).unwrap().is_empty());
    }

    #[test]
    fn test_build_list_rejects_unsorted() {
        let config = IndexConfig::default();
        assert!(matches!(
            build_list(&[(5, 1), (3, 1)], &config, &mut rng()),
            Err(Error::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_config_parses() {
        let config: IndexConfig = serde_json::from_str(
            r#"{"max_buffer_size": 4096, "skip_interval": 8, "skip_layout": "random"}"#,
        )
        .unwrap();
        assert_eq!(config.skip_interval, 8);
        assert_eq!(config.skip_layout, SkipLayout::Random);
    }
}
