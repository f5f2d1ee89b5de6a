//! LRU-over-requests policy.

use std::collections::VecDeque;

use cube_core::Buffer;

use super::{index_set, not_remembered, CacheResult, CachingPolicy};
use crate::chunk::{ChunkIndex, RawCubeChunk};

/// Keeps the chunk sets of the `N` most recently seen distinct requests.
///
/// Like [`FilterPolicy`](super::FilterPolicy), but the remembered sets form
/// a queue: a repeated set moves to the back, and a new set evicts the
/// front once the queue is full.
#[derive(Debug, Clone)]
pub struct UniqueIoPolicy {
    sets: VecDeque<Vec<ChunkIndex>>,
    capacity: usize,
}

impl UniqueIoPolicy {
    /// Remembers `unique_ios` chunk sets (at least one).
    pub fn new(unique_ios: usize) -> Self {
        let capacity = unique_ios.max(1);
        Self {
            sets: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
}

impl CachingPolicy for UniqueIoPolicy {
    fn name(&self) -> &'static str {
        "unique-io"
    }

    fn recommend_chunks_to_free(
        &mut self,
        allocated: &[&RawCubeChunk],
        just_used: &[&RawCubeChunk],
        _requested: &Buffer,
    ) -> CacheResult {
        let current = index_set(just_used);
        if let Some(pos) = self.sets.iter().position(|s| *s == current) {
            if let Some(set) = self.sets.remove(pos) {
                self.sets.push_back(set);
            }
        } else {
            self.sets.push_back(current);
            while self.sets.len() > self.capacity {
                self.sets.pop_front();
            }
        }

        let remembered: Vec<&[ChunkIndex]> = self.sets.iter().map(Vec::as_slice).collect();
        CacheResult::Evict(not_remembered(allocated, &remembered))
    }
}
