//! A lock-free-per-bucket pool of byte buffers sized to the block-size
//! ladder, reused across the encode/compress/write hot path.

use std::sync::Mutex;

use bep_model::BLOCK_SIZE_LADDER;
use bytes::BytesMut;

/// Pool of reusable buffers, one free-list per ladder rung.
///
/// Each bucket is guarded by its own lock so `Get`/`Put` on different
/// buckets never contend; this mirrors the "lock-free per bucket" shared
/// resource described for the buffer pool.
pub struct BufferPool {
    buckets: Vec<Mutex<Vec<BytesMut>>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    /// Construct an empty pool with one bucket per ladder rung.
    #[must_use]
    pub fn new() -> Self {
        Self { buckets: BLOCK_SIZE_LADDER.iter().map(|_| Mutex::new(Vec::new())).collect() }
    }

    /// Index of the smallest ladder rung that is `>= size`, or `None` if
    /// `size` exceeds the largest rung.
    fn bucket_for(size: usize) -> Option<usize> {
        BLOCK_SIZE_LADDER.iter().position(|&rung| size <= rung as usize)
    }

    /// Obtain a zero-length buffer with capacity for at least `size` bytes.
    /// Requests outside the ladder bypass the pool and allocate directly.
    #[must_use]
    pub fn get(&self, size: usize) -> BytesMut {
        let Some(bucket) = Self::bucket_for(size) else {
            return BytesMut::with_capacity(size);
        };

        let mut free_list = self.buckets[bucket].lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        free_list.pop().map_or_else(
            || BytesMut::with_capacity(BLOCK_SIZE_LADDER[bucket] as usize),
            |mut buf| {
                buf.clear();
                buf
            },
        )
    }

    /// Return a buffer to its bucket for reuse. Buffers whose capacity
    /// doesn't match a ladder rung exactly are dropped rather than pooled.
    pub fn put(&self, buf: BytesMut) {
        if let Some(bucket) = BLOCK_SIZE_LADDER.iter().position(|&rung| rung as usize == buf.capacity()) {
            let mut free_list = self.buckets[bucket].lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            free_list.push(buf);
        }
    }

    /// Grow `buf` to at least `new_size`, reusing its allocation in place
    /// when the existing capacity already suffices.
    #[must_use]
    pub fn upgrade(&self, mut buf: BytesMut, new_size: usize) -> BytesMut {
        if buf.capacity() >= new_size {
            return buf;
        }
        self.put(buf.split());
        self.get(new_size)
    }
}
