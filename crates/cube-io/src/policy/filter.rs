//! N-parallel-I/O policy.

use cube_core::Buffer;

use super::{index_set, not_remembered, CacheResult, CachingPolicy};
use crate::chunk::{ChunkIndex, RawCubeChunk};

/// Remembers the chunk sets of the last `N` distinct requests.
///
/// Suited to filters that walk `N` regions of the cube in lock step (for
/// example a line above, the current line, and the line below). A repeated
/// chunk set refreshes its slot; a new one replaces the oldest slot. Every
/// cached chunk in none of the remembered sets is evicted.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    slots: Vec<Slot>,
    capacity: usize,
    clock: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    chunks: Vec<ChunkIndex>,
    refreshed: u64,
}

impl FilterPolicy {
    /// Remembers `parallel_ios` chunk sets (at least one).
    pub fn new(parallel_ios: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity: parallel_ios.max(1),
            clock: 0,
        }
    }

    fn remember(&mut self, chunks: Vec<ChunkIndex>) {
        self.clock += 1;
        if let Some(slot) = self.slots.iter_mut().find(|s| s.chunks == chunks) {
            slot.refreshed = self.clock;
            return;
        }
        let slot = Slot {
            chunks,
            refreshed: self.clock,
        };
        if self.slots.len() < self.capacity {
            self.slots.push(slot);
        } else if let Some(oldest) = self.slots.iter_mut().min_by_key(|s| s.refreshed) {
            *oldest = slot;
        }
    }
}

impl CachingPolicy for FilterPolicy {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn recommend_chunks_to_free(
        &mut self,
        allocated: &[&RawCubeChunk],
        just_used: &[&RawCubeChunk],
        _requested: &Buffer,
    ) -> CacheResult {
        self.remember(index_set(just_used));
        let remembered: Vec<&[ChunkIndex]> = self.slots.iter().map(|s| s.chunks.as_slice()).collect();
        CacheResult::Evict(not_remembered(allocated, &remembered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testing::*;

    #[test]
    fn keeps_last_n_sets() {
        let chunks: Vec<_> = (0..5).map(|i| line_chunk(i, i as i64 + 1)).collect();
        let all: Vec<_> = chunks.iter().collect();
        let req = request(4, 1);
        let mut p = FilterPolicy::new(2);

        assert_eq!(p.recommend_chunks_to_free(&all, &[all[0]], &req), CacheResult::Evict(vec![1, 2, 3, 4]));
        assert_eq!(p.recommend_chunks_to_free(&all, &[all[1]], &req), CacheResult::Evict(vec![2, 3, 4]));
        // third distinct set pushes out the oldest ({0})
        assert_eq!(p.recommend_chunks_to_free(&all, &[all[2]], &req), CacheResult::Evict(vec![0, 3, 4]));
    }

    #[test]
    fn repeated_set_is_refreshed() {
        let chunks: Vec<_> = (0..4).map(|i| line_chunk(i, i as i64 + 1)).collect();
        let all: Vec<_> = chunks.iter().collect();
        let req = request(4, 1);
        let mut p = FilterPolicy::new(2);

        p.recommend_chunks_to_free(&all, &[all[0]], &req);
        p.recommend_chunks_to_free(&all, &[all[1]], &req);
        // {0} refreshed, so {1} becomes the oldest
        p.recommend_chunks_to_free(&all, &[all[0]], &req);
        assert_eq!(p.recommend_chunks_to_free(&all, &[all[2]], &req), CacheResult::Evict(vec![1, 3]));
    }
}
