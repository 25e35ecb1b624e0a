//! Size-class slab allocator for serialized posting lists.
//!
//! The pool owns every chunk. Callers hold an [`Allocation`] (a revocable
//! view) and may persist its [`PoolRef`] to find the chunk again later.
//! Freeing pushes the chunk onto its class's free list with length reset,
//! ready for the next allocation of that size. Each size class has its own
//! lock, held only for the O(1) free-list pop/push or chunk append.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Stable handle to a pool-owned chunk.
///
/// The directory layer owns these: it must free a reference exactly once and
/// never dereference it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolRef {
    chunk_size: usize,
    chunk: usize,
}

struct Buffer {
    chunk_size: usize,
    max_size: usize,
    inner: Mutex<BufferInner>,
}

#[derive(Default)]
struct BufferInner {
    chunks: Vec<Arc<Mutex<Vec<u8>>>>,
    free: Vec<usize>,
}

impl Buffer {
    fn new(chunk_size: usize, max_size: usize) -> Self {
        Buffer {
            chunk_size,
            max_size,
            inner: Mutex::new(BufferInner::default()),
        }
    }

    fn alloc(self: &Arc<Self>) -> Option<Allocation> {
        let mut inner = self.inner.lock();

        if let Some(chunk) = inner.free.pop() {
            return Some(Allocation {
                raw: inner.chunks[chunk].clone(),
                reference: PoolRef {
                    chunk_size: self.chunk_size,
                    chunk,
                },
                buf: self.clone(),
            });
        }

        if inner.chunks.len() * self.chunk_size >= self.max_size {
            // class is at its ceiling
            return None;
        }

        let raw = Arc::new(Mutex::new(Vec::with_capacity(self.chunk_size)));
        inner.chunks.push(raw.clone());
        let chunk = inner.chunks.len() - 1;

        Some(Allocation {
            raw,
            reference: PoolRef {
                chunk_size: self.chunk_size,
                chunk,
            },
            buf: self.clone(),
        })
    }

    fn free(&self, reference: PoolRef) {
        let mut inner = self.inner.lock();
        inner.chunks[reference.chunk].lock().clear();
        inner.free.push(reference.chunk);
    }
}

/// A borrowed, revocable view of one pool chunk.
pub struct Allocation {
    raw: Arc<Mutex<Vec<u8>>>,
    reference: PoolRef,
    buf: Arc<Buffer>,
}

impl Allocation {
    /// Handle for finding this chunk again.
    pub fn reference(&self) -> PoolRef {
        self.reference
    }

    /// The chunk's bytes. Length is what the last writer left; capacity is
    /// the size class.
    pub fn raw(&self) -> MutexGuard<'_, Vec<u8>> {
        self.raw.lock()
    }

    /// Return the chunk to its class's free list, length reset.
    pub fn free(self) {
        self.buf.free(self.reference);
    }
}

/// Pool of byte buffers grouped into size classes.
pub struct BufferPool {
    buffers: RwLock<FxHashMap<usize, Arc<Buffer>>>,
    max_buf_size: usize,
}

impl BufferPool {
    /// `max_buf_size` caps the total bytes each size class may hold.
    pub fn new(max_buf_size: usize) -> Self {
        BufferPool {
            buffers: RwLock::new(FxHashMap::default()),
            max_buf_size,
        }
    }

    /// Hand out a chunk of exactly `size` bytes capacity, reusing a freed
    /// chunk of that class when one exists.
    pub fn alloc(&self, size: usize) -> Result<Allocation> {
        let existing = self.buffers.read().get(&size).cloned();

        let buf = match existing {
            Some(buf) => buf,
            None => self
                .buffers
                .write()
                .entry(size)
                .or_insert_with(|| Arc::new(Buffer::new(size, self.max_buf_size)))
                .clone(),
        };

        buf.alloc().ok_or(Error::PoolExhausted { size })
    }

    /// Re-materialize the allocation behind a stored reference.
    pub fn find(&self, reference: PoolRef) -> Option<Allocation> {
        let buf = self.buffers.read().get(&reference.chunk_size)?.clone();
        let raw = buf.inner.lock().chunks.get(reference.chunk)?.clone();

        Some(Allocation {
            raw,
            reference,
            buf,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
