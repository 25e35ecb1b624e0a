//! Delta-encoded posting lists with embedded skip pointers.
//!
//! A list is one contiguous byte buffer holding a stream of blocks. A data
//! block is a varint doc-id delta (high bit of the first byte set) followed
//! by an optional payload; a skip block is a flag byte plus fixed-width
//! forward pointer and target doc id. Skip blocks are reserved while the
//! list grows and wired once it is complete, after which the buffer is
//! read-only.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::MatchIterator;
use crate::structures::varint;
use crate::DocId;

/// High bit of a block's first byte marks it as a data block.
pub const BLOCK_TYPE_DOC: u8 = 0x80;

/// Fixed bytes following a skip block's flag byte: 4-byte forward offset
/// plus 8-byte target doc id.
pub const SKIP_PAYLOAD: usize = 12;

const SKIP_UNINITIALIZED: u8 = 0;
const SKIP_INITIALIZED: u8 = 1;

// ── Payload framing ──────────────────────────────────────────────────────

/// Determines where a data block's payload ends during decoding.
///
/// The probe runs in the inner loop of every posting-list operation; keep it
/// cheap.
pub trait PayloadFormat {
    /// Offset one past the payload at the front of `raw`.
    fn end(&self, raw: &[u8]) -> Result<usize>;
}

/// Data blocks carry no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPayload;

impl PayloadFormat for NoPayload {
    #[inline]
    fn end(&self, _raw: &[u8]) -> Result<usize> {
        Ok(0)
    }
}

/// Payload is a single varint, e.g. a term frequency.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarIntPayload;

impl PayloadFormat for VarIntPayload {
    #[inline]
    fn end(&self, raw: &[u8]) -> Result<usize> {
        varint::end(raw)
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// Decoded view of one block. Produced on demand, never stored.
#[derive(Debug, Clone, Copy)]
struct Block {
    /// Byte offset of this block in the backing buffer.
    start: usize,
    is_skip: bool,
    initialized: bool,
    /// Forward offset from `start` to the skip target.
    next_block_offset: usize,
    /// Doc id at this block; for skip blocks, the preceding doc id.
    doc: DocId,
    /// For initialized skip blocks, the doc id decoding resumes from at the
    /// target.
    next_doc: DocId,
    /// Payload `(offset, len)` into the backing buffer.
    payload: (usize, usize),
}

impl Block {
    fn empty() -> Self {
        Block {
            start: 0,
            is_skip: false,
            initialized: false,
            next_block_offset: 0,
            doc: 0,
            next_doc: 0,
            payload: (0, 0),
        }
    }
}

/// Walk statistics, for diagnostics rather than the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub doc_count: usize,
    pub max_id: DocId,
}

/// One decoded document from [`PostingList::docs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Doc<'a> {
    pub doc: DocId,
    pub payload: &'a [u8],
}

// ── Skip placement ───────────────────────────────────────────────────────

/// Placement policy for wiring skip targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipLayout {
    /// Each skip points at the next skip in the stream.
    Next,
    /// Each skip points at a uniformly drawn skip at or after its position.
    /// The draw is biased toward later skips; callers accept this.
    Random,
}

impl FromStr for SkipLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "next" => Ok(SkipLayout::Next),
            "random" => Ok(SkipLayout::Random),
            other => Err(Error::InvalidLayout(other.to_string())),
        }
    }
}

// ── Posting list ─────────────────────────────────────────────────────────

/// A sorted set of doc ids in one compact byte buffer.
///
/// Grows only through [`add`](Self::add) / [`add_skip`](Self::add_skip) up
/// to its fixed byte capacity; [`build_skips`](Self::build_skips) finalizes
/// it. Doc ids must be strictly increasing.
#[derive(Debug, Clone)]
pub struct PostingList<F: PayloadFormat = NoPayload> {
    raw: Vec<u8>,
    capacity: usize,
    max_id: DocId,
    format: F,
}

impl<F: PayloadFormat + Default> PostingList<F> {
    /// An empty list with a fixed byte budget.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_format(capacity, F::default())
    }

    /// Decode a list serialized by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_format(bytes, F::default())
    }
}

impl<F: PayloadFormat> PostingList<F> {
    pub fn with_format(capacity: usize, format: F) -> Self {
        PostingList {
            raw: Vec::with_capacity(capacity),
            capacity,
            max_id: 0,
            format,
        }
    }

    pub fn from_bytes_with_format(bytes: &[u8], format: F) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::Corruption("truncated posting list header".into()));
        }
        let max_id = BigEndian::read_u64(&bytes[..8]);
        let (n, raw_len) = varint::read(&bytes[8..])?;
        let raw_len = raw_len as usize;
        let start = 8 + n;
        if bytes.len() < start + raw_len {
            return Err(Error::Corruption(format!(
                "posting list claims {} block bytes, {} available",
                raw_len,
                bytes.len() - start
            )));
        }

        let raw = bytes[start..start + raw_len].to_vec();
        Ok(PostingList {
            capacity: raw.len(),
            raw,
            max_id,
            format,
        })
    }

    /// Largest doc id added so far.
    #[inline]
    pub fn max_id(&self) -> DocId {
        self.max_id
    }

    /// The encoded block stream.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Append `doc` with no payload.
    pub fn add(&mut self, doc: DocId) -> Result<()> {
        self.add_with_payload(doc, &[])
    }

    /// Append `doc` followed by pre-encoded payload bytes.
    ///
    /// The payload must be framed so that this list's [`PayloadFormat`] can
    /// find its end again. On error the list is unchanged.
    pub fn add_with_payload(&mut self, doc: DocId, payload: &[u8]) -> Result<()> {
        let len = self.raw.len();
        if len > 0 && doc <= self.max_id {
            return Err(Error::OutOfOrder {
                doc,
                max: self.max_id,
            });
        }

        let delta = doc - self.max_id;
        let size = varint::size(delta) + payload.len();
        if len + size > self.capacity {
            return Err(Error::OutOfSpace {
                needed: size,
                remaining: self.capacity - len,
            });
        }

        self.raw.resize(len + size, 0);
        let used = varint::write(delta, &mut self.raw[len..]);
        self.raw[len + used..len + size].copy_from_slice(payload);

        // Mark the block as a data block
        self.raw[len] |= BLOCK_TYPE_DOC;
        self.max_id = doc;

        Ok(())
    }

    /// Reserve an uninitialized skip block at the current position.
    ///
    /// It stays inert until [`build_skips`](Self::build_skips) wires it.
    pub fn add_skip(&mut self) -> Result<()> {
        let len = self.raw.len();
        let size = 1 + SKIP_PAYLOAD;
        if len + size > self.capacity {
            return Err(Error::OutOfSpace {
                needed: size,
                remaining: self.capacity - len,
            });
        }

        self.raw.resize(len + size, 0);
        self.raw[len] = SKIP_UNINITIALIZED;

        Ok(())
    }

    /// Serialized size: 8-byte max id, varint block length, block bytes.
    pub fn size(&self) -> usize {
        8 + varint::size(self.raw.len() as u64) + self.raw.len()
    }

    /// Serialize into the front of `dst`.
    ///
    /// Panics if `dst` is shorter than [`size`](Self::size).
    pub fn to_bytes(&self, dst: &mut [u8]) {
        assert!(
            dst.len() >= self.size(),
            "serialization target buffer too small ({} bytes for {})",
            dst.len(),
            self.size()
        );

        BigEndian::write_u64(&mut dst[..8], self.max_id);
        let n = varint::write(self.raw.len() as u64, &mut dst[8..]);
        dst[8 + n..8 + n + self.raw.len()].copy_from_slice(&self.raw);
    }

    fn read_block(&self, idx: usize, last_doc: DocId) -> Result<(usize, Block)> {
        let bytes = &self.raw[idx..];

        if bytes[0] & BLOCK_TYPE_DOC != 0 {
            let (doc_size, delta) = varint::read(bytes)?;
            let payload_size = self.format.end(&bytes[doc_size..])?;

            let doc = last_doc + delta;
            let block = Block {
                start: idx,
                is_skip: false,
                initialized: true,
                next_block_offset: 0,
                doc,
                next_doc: doc,
                payload: (idx + doc_size, payload_size),
            };
            return Ok((doc_size + payload_size, block));
        }

        if bytes.len() < 1 + SKIP_PAYLOAD {
            return Err(Error::Corruption("truncated skip block".into()));
        }
        let initialized = bytes[0] == SKIP_INITIALIZED;
        let next_block_offset = BigEndian::read_u32(&bytes[1..5]) as usize;
        let next_doc = BigEndian::read_u64(&bytes[5..13]);

        let block = Block {
            start: idx,
            is_skip: true,
            initialized,
            next_block_offset,
            doc: last_doc,
            next_doc: if initialized { next_doc } else { last_doc },
            payload: (0, 0),
        };
        Ok((1 + SKIP_PAYLOAD, block))
    }

    fn for_each_block(&self, mut visit: impl FnMut(Block)) -> Result<()> {
        let mut i = 0;
        let mut last_doc = 0;

        while i < self.raw.len() {
            let (read, block) = self.read_block(i, last_doc)?;
            last_doc = block.doc;
            visit(block);
            i += read;
        }

        Ok(())
    }

    fn skips(&self) -> Result<Vec<Block>> {
        let mut skips = Vec::new();
        self.for_each_block(|b| {
            if b.is_skip {
                skips.push(b);
            }
        })?;
        Ok(skips)
    }

    /// Lazy forward walk over the decoded documents, skipping skip blocks.
    pub fn docs(&self) -> Docs<'_, F> {
        Docs {
            list: self,
            offset: 0,
            last_doc: 0,
            failed: false,
        }
    }

    /// Full-walk statistics.
    pub fn stats(&self) -> Result<Stats> {
        let mut doc_count = 0;
        self.for_each_block(|b| {
            if !b.is_skip {
                doc_count += 1;
            }
        })?;
        Ok(Stats {
            doc_count,
            max_id: self.max_id,
        })
    }

    /// Cursor positioned at the first document.
    pub fn iter(&self) -> Result<PostingIterator<'_, F>> {
        PostingIterator::new(self)
    }

    fn update_skip(&mut self, src: &Block, target: &Block) {
        self.raw[src.start] = SKIP_INITIALIZED;

        let offset = (target.start - src.start) as u32;
        BigEndian::write_u32(&mut self.raw[src.start + 1..src.start + 5], offset);
        BigEndian::write_u64(&mut self.raw[src.start + 5..src.start + 13], target.doc);
    }

    /// Wire every reserved skip block's target according to `layout`.
    ///
    /// The trailing skip of the stream stays uninitialized; iterators step
    /// over it. Call once, after the last `add`.
    pub fn build_skips<R: Rng>(&mut self, layout: SkipLayout, rng: &mut R) -> Result<()> {
        let skips = self.skips()?;

        match layout {
            SkipLayout::Next => {
                for pair in skips.windows(2) {
                    self.update_skip(&pair[0], &pair[1]);
                }
            }
            SkipLayout::Random => {
                for idx in 1..skips.len() {
                    // uniform over the skips at or after idx
                    let goal = rng.gen_range(idx..skips.len());
                    self.update_skip(&skips[idx - 1], &skips[goal]);
                }
            }
        }

        Ok(())
    }
}

impl<F: PayloadFormat> fmt::Display for PostingList<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PostingList: {} of {} bytes used, max doc {}",
            self.raw.len(),
            self.capacity,
            self.max_id
        )?;

        let mut lines = Vec::new();
        let walk = self.for_each_block(|b| {
            lines.push(if b.is_skip && b.initialized {
                format!("Skip - doc {} @ {}", b.next_doc, b.start + b.next_block_offset)
            } else if b.is_skip {
                "Skip - uninitialized".to_string()
            } else {
                format!("Data - doc {}", b.doc)
            });
        });
        if let Err(e) = walk {
            lines.push(format!("<corrupt: {}>", e));
        }
        for line in lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl crate::query::MatchList for PostingList<NoPayload> {
    fn add(&mut self, doc: DocId) -> Result<()> {
        PostingList::add(self, doc)
    }
}

// ── Document walk ────────────────────────────────────────────────────────

/// Lazy iterator over decoded documents; see [`PostingList::docs`].
pub struct Docs<'a, F: PayloadFormat> {
    list: &'a PostingList<F>,
    offset: usize,
    last_doc: DocId,
    failed: bool,
}

impl<'a, F: PayloadFormat> Iterator for Docs<'a, F> {
    type Item = Result<Doc<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while self.offset < self.list.raw.len() {
            match self.list.read_block(self.offset, self.last_doc) {
                Ok((read, block)) => {
                    self.offset += read;
                    self.last_doc = block.doc;
                    if !block.is_skip {
                        let (off, len) = block.payload;
                        return Some(Ok(Doc {
                            doc: block.doc,
                            payload: &self.list.raw[off..off + len],
                        }));
                    }
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

// ── Iterator ─────────────────────────────────────────────────────────────

/// Forward-only cursor over one posting list's block stream.
///
/// `seek` follows initialized skip pointers when they land strictly below
/// the target, so it never passes over a sought doc id. The cursor never
/// rests on a skip block.
pub struct PostingIterator<'a, F: PayloadFormat = NoPayload> {
    list: &'a PostingList<F>,
    block: Block,
    finished: bool,
    /// Offset one past the current block.
    last: usize,
    error: Option<Error>,
}

impl<'a, F: PayloadFormat> PostingIterator<'a, F> {
    pub fn new(list: &'a PostingList<F>) -> Result<Self> {
        let mut it = if list.raw.is_empty() {
            PostingIterator {
                list,
                block: Block::empty(),
                finished: true,
                last: 0,
                error: None,
            }
        } else {
            let (read, first) = list.read_block(0, 0)?;
            PostingIterator {
                list,
                block: first,
                finished: false,
                last: read,
                error: None,
            }
        };

        while it.block.is_skip && !it.finished {
            it.step()?;
        }
        Ok(it)
    }

    /// Doc id of the current block. Constant time.
    #[inline]
    pub fn current(&self) -> DocId {
        self.block.doc
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Payload bytes of the current document.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        let (off, len) = self.block.payload;
        &self.list.raw[off..off + len]
    }

    /// The decode failure that poisoned this cursor, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn step(&mut self) -> Result<()> {
        if self.last >= self.list.raw.len() {
            self.finished = true;
            return Ok(());
        }

        let (read, block) = self.list.read_block(self.last, self.block.doc)?;
        self.block = block;
        self.last += read;
        Ok(())
    }

    /// Advance to the next document.
    ///
    /// Returns the new current doc id and whether the cursor is exhausted;
    /// when it is, the doc id is the final document's. Panics if the cursor
    /// was already finished.
    pub fn try_advance(&mut self) -> Result<(DocId, bool)> {
        assert!(!self.finished, "advance called on a finished iterator");

        self.step()?;
        while self.block.is_skip && !self.finished {
            self.step()?;
        }

        Ok((self.block.doc, self.finished))
    }

    /// Advance to the first document >= `target`.
    ///
    /// Initialized skips are taken only when their target doc lands strictly
    /// below `target`; otherwise the cursor moves one block at a time.
    /// Panics if the cursor is finished or `target` is behind it.
    pub fn try_seek(&mut self, target: DocId) -> Result<(DocId, bool)> {
        assert!(!self.finished, "seek called on a finished iterator");
        assert!(
            self.block.doc <= target,
            "cannot seek backwards (at {}, target {})",
            self.block.doc,
            target
        );

        if self.block.doc == target {
            return Ok((self.block.doc, false));
        }

        while !self.finished && self.block.doc < target {
            if self.block.is_skip && self.block.initialized && self.block.next_doc < target {
                // take the skip
                let start = self.block.start + self.block.next_block_offset;
                if start >= self.list.raw.len() {
                    return Err(Error::Corruption(format!(
                        "skip target {} past end of {}-byte list",
                        start,
                        self.list.raw.len()
                    )));
                }
                let (read, block) = self.list.read_block(start, self.block.next_doc)?;
                self.block = block;
                self.last = start + read;
            } else {
                self.step()?;
            }
        }

        // We might have ended on a skip. Advance past it.
        while self.block.is_skip && !self.finished {
            self.step()?;
        }

        Ok((self.block.doc, self.finished))
    }

    fn poison(&mut self, e: Error) -> (DocId, bool) {
        log::warn!("posting iterator poisoned by decode failure: {}", e);
        self.error = Some(e);
        self.finished = true;
        (self.block.doc, true)
    }
}

impl<F: PayloadFormat> MatchIterator for PostingIterator<'_, F> {
    fn current(&self) -> DocId {
        self.block.doc
    }

    fn finished(&self) -> bool {
        self.finished
    }

    fn advance(&mut self) -> (DocId, bool) {
        match self.try_advance() {
            Ok(r) => r,
            Err(e) => self.poison(e),
        }
    }

    fn seek(&mut self, target: DocId) -> (DocId, bool) {
        match self.try_seek(target) {
            Ok(r) => r,
            Err(e) => self.poison(e),
        }
    }

    fn payload(&self) -> &[u8] {
        PostingIterator::payload(self)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
