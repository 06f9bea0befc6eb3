/// Counters for the upload cache, reset with [`crate::BufferCache::reset_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCacheStats {
    pub vertex_cache_hits: u64,
    pub vertex_cache_misses: u64,
    /// Scavenge passes, whether explicit or triggered by a failed allocation.
    pub scavenges: u64,
    /// Allocations that failed even after the scavenge-and-retry.
    pub allocation_failures: u64,
    /// Bytes written into the ring by all three pipelines.
    pub bytes_uploaded: u64,
}

impl BufferCacheStats {
    pub fn vertex_hit_rate(&self) -> f64 {
        let lookups = self.vertex_cache_hits + self.vertex_cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.vertex_cache_hits as f64 / lookups as f64
    }
}
