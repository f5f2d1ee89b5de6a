//! Default policy: keep a region around the current request.

use cube_core::Buffer;
use tracing::trace;

use super::{index_set, CacheResult, CachingPolicy};
use crate::chunk::RawCubeChunk;

/// Cache footprint below which nothing is evicted.
pub const REGIONAL_BUDGET_BYTES: usize = 10 * 1024 * 1024;

/// Extra chunks kept per chunk-width of the request.
const WORKING_SET_FACTOR: usize = 2;

/// Keeps roughly the chunks a request of the same size needs next.
///
/// Once the cache holds more than 10 MiB, the target working set is
/// `ceil(max(buffer dims) / max(chunk dims)) * 2` chunks, capped at
/// `10 MiB / bytes per chunk` and never below the number of chunks just
/// used. The least recently used chunks outside the just-used set are
/// evicted until the target is met.
#[derive(Debug, Default, Clone)]
pub struct RegionalPolicy;

impl RegionalPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl CachingPolicy for RegionalPolicy {
    fn name(&self) -> &'static str {
        "regional"
    }

    fn recommend_chunks_to_free(
        &mut self,
        allocated: &[&RawCubeChunk],
        just_used: &[&RawCubeChunk],
        requested: &Buffer,
    ) -> CacheResult {
        let Some(first) = allocated.first() else {
            return CacheResult::NotUnderstood;
        };

        let bytes_per_chunk = first.byte_count().max(1);
        if allocated.len() * bytes_per_chunk <= REGIONAL_BUDGET_BYTES {
            return CacheResult::Evict(Vec::new());
        }

        let buffer_dim = requested
            .sample_dimension()
            .max(requested.line_dimension())
            .max(requested.band_dimension());
        let chunk_dim = first
            .sample_count()
            .max(first.line_count())
            .max(first.band_count())
            .max(1);

        let target = (buffer_dim.div_ceil(chunk_dim) * WORKING_SET_FACTOR)
            .min(REGIONAL_BUDGET_BYTES / bytes_per_chunk)
            .max(just_used.len());

        let used = index_set(just_used);
        let excess = allocated.len().saturating_sub(target);
        let evict: Vec<_> = allocated
            .iter()
            .map(|c| c.index())
            .filter(|idx| used.binary_search(idx).is_err())
            .take(excess)
            .collect();

        trace!(target, cached = allocated.len(), evicting = evict.len(), "regional policy");
        CacheResult::Evict(evict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testing::*;

    #[test]
    fn empty_cache_is_not_understood() {
        let mut p = RegionalPolicy::new();
        assert_eq!(p.recommend_chunks_to_free(&[], &[], &request(8, 8)), CacheResult::NotUnderstood);
    }

    #[test]
    fn small_cache_is_left_alone() {
        let mut p = RegionalPolicy::new();
        let chunks: Vec<_> = (0..4).map(|i| sized_chunk(i, 1024)).collect();
        let refs: Vec<_> = chunks.iter().collect();
        assert_eq!(
            p.recommend_chunks_to_free(&refs, &refs[..1], &request(8, 8)),
            CacheResult::Evict(vec![])
        );
    }

    #[test]
    fn large_cache_is_trimmed_lru_first() {
        let mut p = RegionalPolicy::new();
        // 12 chunks of 1 MiB: over budget
        let chunks: Vec<_> = (0..12).map(|i| sized_chunk(i, 1024 * 1024)).collect();
        let refs: Vec<_> = chunks.iter().collect();
        // request of 16 samples over 8-wide chunks -> target 4, just used 2
        let just_used = [refs[0], refs[11]];
        let CacheResult::Evict(evict) = p.recommend_chunks_to_free(&refs, &just_used, &request(16, 1)) else {
            panic!("regional policy always understands a non-empty cache");
        };
        assert_eq!(evict, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn never_evicts_below_just_used() {
        let mut p = RegionalPolicy::new();
        let chunks: Vec<_> = (0..12).map(|i| sized_chunk(i, 1024 * 1024)).collect();
        let refs: Vec<_> = chunks.iter().collect();
        let CacheResult::Evict(evict) = p.recommend_chunks_to_free(&refs, &refs, &request(1, 1)) else {
            panic!("expected evictions");
        };
        assert!(evict.is_empty());
    }
}
