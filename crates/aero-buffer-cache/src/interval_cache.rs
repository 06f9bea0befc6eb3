use std::collections::BTreeMap;
use std::ops::Bound;

/// A guest byte range currently mirrored in the transient ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub guest_length: u32,
    pub gpu_offset: u64,
}

/// Ordered map from guest start address to the ring offset holding a swapped copy of the range.
///
/// Lookups only succeed when a single entry fully contains the requested range; partial overlaps
/// are misses. Entries are never partially invalidated: the owner clears the whole map whenever
/// ring space may have been reclaimed or guest memory may have changed.
#[derive(Debug, Default)]
pub struct IntervalCache {
    entries: BTreeMap<u32, CacheEntry>,
}

impl IntervalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ring offset of `[guest_address, guest_address + guest_length)` if one entry contains it.
    pub fn find(&self, guest_address: u32, guest_length: u32) -> Option<u64> {
        let (&start, entry) = self.entries.range(..=guest_address).next_back()?;

        let cached_end = u64::from(start) + u64::from(entry.guest_length);
        let requested_end = u64::from(guest_address) + u64::from(guest_length);
        if cached_end < requested_end {
            return None;
        }

        Some(entry.gpu_offset + u64::from(guest_address - start))
    }

    /// Record `[guest_address, guest_address + guest_length)` at `gpu_offset`.
    ///
    /// Replaces any entry starting at the same address, then drops the run of following entries
    /// that the new range fully covers. The scan stops at the first entry that extends past the
    /// new range.
    pub fn insert(&mut self, guest_address: u32, guest_length: u32, gpu_offset: u64) {
        self.entries.insert(
            guest_address,
            CacheEntry {
                guest_length,
                gpu_offset,
            },
        );

        let new_end = u64::from(guest_address) + u64::from(guest_length);
        let covered: Vec<u32> = self
            .entries
            .range((Bound::Excluded(guest_address), Bound::Unbounded))
            .take_while(|(&start, entry)| u64::from(start) + u64::from(entry.guest_length) <= new_end)
            .map(|(&start, _)| start)
            .collect();

        for start in covered {
            self.entries.remove(&start);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, CacheEntry)> + '_ {
        self.entries.iter().map(|(&start, &entry)| (start, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contained_range_hits_with_delta() {
        let mut cache = IntervalCache::new();
        cache.insert(100, 50, 0);

        assert_eq!(cache.find(100, 50), Some(0));
        assert_eq!(cache.find(110, 20), Some(10));
        assert_eq!(cache.find(149, 1), Some(49));
    }

    #[test]
    fn partial_overlap_is_a_miss() {
        let mut cache = IntervalCache::new();
        cache.insert(100, 50, 0);

        // Starts before the entry.
        assert_eq!(cache.find(90, 50), None);
        // Runs past the end.
        assert_eq!(cache.find(140, 20), None);
        // Entirely after.
        assert_eq!(cache.find(150, 4), None);
    }

    #[test]
    fn empty_cache_misses() {
        let cache = IntervalCache::new();
        assert_eq!(cache.find(0, 0), None);
        assert_eq!(cache.find(u32::MAX, 1), None);
    }

    #[test]
    fn covering_insert_evicts_contained_entries() {
        let mut cache = IntervalCache::new();
        cache.insert(100, 50, 0);
        cache.insert(90, 80, 500);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find(100, 50), Some(510));
    }

    #[test]
    fn eviction_stops_at_first_uncovered_entry() {
        let mut cache = IntervalCache::new();
        cache.insert(0x100, 0x10, 0);
        cache.insert(0x200, 0x400, 4096);
        cache.insert(0x300, 0x10, 8192);

        cache.insert(0x80, 0x200, 12288);

        let starts: Vec<u32> = cache.iter().map(|(start, _)| start).collect();
        assert_eq!(starts, vec![0x80, 0x200, 0x300]);
        assert_eq!(cache.find(0x100, 0x10), Some(12288 + 0x80));
    }

    #[test]
    fn eviction_is_a_prefix_scan() {
        let mut cache = IntervalCache::new();
        cache.insert(0x100, 0x100, 0);
        // Nothing follows 0x180, so the two are left overlapping.
        cache.insert(0x180, 0x10, 4096);
        assert_eq!(cache.len(), 2);

        // 0x100 runs past the new end, so the scan stops before reaching 0x180.
        cache.insert(0x80, 0x130, 8192);
        let starts: Vec<u32> = cache.iter().map(|(start, _)| start).collect();
        assert_eq!(starts, vec![0x80, 0x100, 0x180]);
    }

    #[test]
    fn reinsert_at_same_address_replaces_entry() {
        let mut cache = IntervalCache::new();
        cache.insert(0x1000, 0x100, 0);
        cache.insert(0x1000, 0x40, 4096);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find(0x1000, 0x40), Some(4096));
        assert_eq!(cache.find(0x1000, 0x100), None);
    }

    #[test]
    fn ranges_at_top_of_address_space_do_not_overflow() {
        let mut cache = IntervalCache::new();
        cache.insert(u32::MAX - 15, 16, 64);

        assert_eq!(cache.find(u32::MAX - 3, 4), Some(76));
        assert_eq!(cache.find(u32::MAX - 3, 8), None);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = IntervalCache::new();
        cache.insert(0, 4, 0);
        cache.insert(8, 4, 4096);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.find(0, 4), None);
    }
}
