//! Tests for the cache layer

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::cache::LruStorage;
    use crate::entry::Entry;
    use crate::store::{MemoryStorage, StateStorage, Storage};

    /// Payload sized so one resident row costs exactly 100 bytes.
    const PAYLOAD: usize = 100 - Entry::OVERHEAD_BYTES;
    const ROW: usize = 100;

    fn value(tag: u8) -> Vec<u8> {
        vec![tag; PAYLOAD]
    }

    fn backed_cache(capacity: usize) -> (Arc<MemoryStorage>, LruStorage) {
        let backing = Arc::new(MemoryStorage::new());
        let cache = LruStorage::with_capacity(Some(backing.clone()), capacity);
        (backing, cache)
    }

    #[test]
    fn test_read_after_write_same_caller() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();

        cache.set("t", "k", Entry::new(&b"v1"[..])).unwrap();
        let row = cache.get("t", "k").unwrap().unwrap();
        assert_eq!(row.value(), b"v1");

        cache.stop();
    }

    #[test]
    fn test_capacity_bound_settles_after_drain() {
        let (_backing, cache) = backed_cache(4 * ROW);
        cache.start();

        // Burst of 32 rows, eight times the capacity.
        for i in 0..32u8 {
            cache
                .set("t", &format!("k{i:02}"), Entry::new(value(i)))
                .unwrap();
        }

        // stop() processes every touch enqueued above before returning.
        cache.stop();

        assert!(cache.resident_bytes() <= 4 * ROW);
        assert!(cache.resident_rows() <= 4);
        assert!(cache.stats().evictions >= 28);
    }

    #[test]
    fn test_lru_eviction_order() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();

        cache.set("t", "a", Entry::new(value(1))).unwrap();
        cache.set("t", "b", Entry::new(value(2))).unwrap();
        cache.set("t", "c", Entry::new(value(3))).unwrap();
        // Touch "a" so "b" becomes the least recently used key.
        cache.get("t", "a").unwrap().unwrap();
        cache.stop();

        // Force exactly one eviction on the next processed touch.
        cache.set_max_capacity(2 * ROW);
        cache.start();
        cache.get("t", "a").unwrap().unwrap();
        cache.stop();

        assert_eq!(cache.resident_rows(), 2);
        assert!(cache.get("t", "b").unwrap().is_none());
        assert!(cache.get("t", "a").unwrap().is_some());
        assert!(cache.get("t", "c").unwrap().is_some());
    }

    #[test]
    fn test_hit_and_query_counters() {
        let (backing, cache) = backed_cache(10 * ROW);
        backing.set("t", "k", Entry::new(&b"v"[..])).unwrap();

        // Miss at this layer: fetched from the chain, not a hit.
        assert!(cache.get("t", "k").unwrap().is_some());
        assert_eq!(cache.query_count(), 1);
        assert_eq!(cache.hit_count(), 0);

        // Now resident.
        assert!(cache.get("t", "k").unwrap().is_some());
        assert_eq!(cache.query_count(), 2);
        assert_eq!(cache.hit_count(), 1);

        // Absent rows count as queries, never as hits.
        assert!(cache.get("t", "missing").unwrap().is_none());
        assert_eq!(cache.query_count(), 3);
        assert_eq!(cache.hit_count(), 1);

        let stats = cache.stats();
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_counts_each_key() {
        let (backing, cache) = backed_cache(10 * ROW);
        backing.set("t", "a", Entry::new(&b"1"[..])).unwrap();
        cache.set("t", "b", Entry::new(&b"2"[..])).unwrap();

        let rows = cache.get_batch("t", &["a", "b", "c"]).unwrap();
        assert!(rows[0].is_some());
        assert!(rows[1].is_some());
        assert!(rows[2].is_none());

        assert_eq!(cache.query_count(), 3);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_enumeration_is_not_a_touch() {
        let (backing, cache) = backed_cache(10 * ROW);
        backing.set("t", "a", Entry::new(&b"1"[..])).unwrap();

        let keys = cache.primary_keys("t", None).unwrap();
        assert_eq!(keys, vec!["a"]);
        assert_eq!(cache.query_count(), 0);
        assert_eq!(cache.hit_count(), 0);
    }

    #[test]
    fn test_merge_only_dirty_is_idempotent() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();

        let source = StateStorage::new(None);
        source.set("t", "a", Entry::new(&b"1"[..])).unwrap();
        source.set("t", "b", Entry::new(&b"2"[..])).unwrap();

        cache.merge(true, &source).unwrap();
        cache.stop();
        let rows = cache.resident_rows();
        let bytes = cache.resident_bytes();

        cache.start();
        cache.merge(true, &source).unwrap();
        cache.stop();

        assert_eq!(cache.resident_rows(), rows);
        assert_eq!(cache.resident_bytes(), bytes);
        assert_eq!(cache.get("t", "a").unwrap().unwrap().value(), b"1");
    }

    #[test]
    fn test_merge_only_dirty_skips_clean_rows() {
        let (_backing, cache) = backed_cache(10 * ROW);

        let source_backing = Arc::new(MemoryStorage::new());
        source_backing.set("t", "clean", Entry::new(&b"c"[..])).unwrap();
        let source = StateStorage::new(Some(source_backing));
        source.get("t", "clean").unwrap();
        source.set("t", "dirty", Entry::new(&b"d"[..])).unwrap();

        cache.merge(true, &source).unwrap();
        assert_eq!(cache.resident_rows(), 1);

        cache.merge(false, &source).unwrap();
        assert_eq!(cache.resident_rows(), 2);
    }

    #[test]
    fn test_merged_rows_start_most_recently_used() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();

        cache.set("t", "old", Entry::new(value(1))).unwrap();

        let source = StateStorage::new(None);
        source.set("t", "new", Entry::new(value(2))).unwrap();
        cache.merge(false, &source).unwrap();
        cache.stop();

        // One slot of room: the next touch must evict "old", not "new".
        cache.set_max_capacity(ROW);
        cache.start();
        cache.get("t", "new").unwrap().unwrap();
        cache.stop();

        assert!(cache.get("t", "old").unwrap().is_none());
        assert!(cache.get("t", "new").unwrap().is_some());
    }

    #[test]
    fn test_start_stop_idempotent() {
        let (_backing, cache) = backed_cache(10 * ROW);

        assert!(!cache.is_running());
        cache.start();
        cache.start();
        assert!(cache.is_running());

        cache.set("t", "k", Entry::new(&b"v"[..])).unwrap();

        cache.stop();
        assert!(!cache.is_running());
        cache.stop();
        assert!(!cache.is_running());

        // A full restart cycle still processes events.
        cache.start();
        cache.set("t", "k2", Entry::new(&b"v2"[..])).unwrap();
        cache.stop();
        assert_eq!(cache.resident_rows(), 2);
    }

    #[test]
    fn test_stop_before_start_is_a_no_op() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.stop();
        assert!(!cache.is_running());
    }

    #[test]
    fn test_concurrent_start_stop_leaves_consistent_state() {
        let (_backing, cache) = backed_cache(10 * ROW);
        let cache = Arc::new(cache);

        let mut handles = vec![];
        for spawn_idx in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    if spawn_idx % 2 == 0 {
                        cache.start();
                    } else {
                        cache.stop();
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        cache.start();
        cache.set("t", "k", Entry::new(&b"v"[..])).unwrap();
        cache.stop();
        assert!(!cache.is_running());
        assert_eq!(cache.resident_rows(), 1);
    }

    #[test]
    fn test_empty_address_rejected_everywhere() {
        let (_backing, cache) = backed_cache(10 * ROW);

        assert!(cache.get("", "k").is_err());
        assert!(cache.get("t", "").is_err());
        assert!(cache.set("", "k", Entry::new(&b"v"[..])).is_err());
        assert!(cache.set("t", "", Entry::new(&b"v"[..])).is_err());
        assert!(cache.get_batch("t", &["ok", ""]).is_err());

        // Rejected lookups leave the counters untouched.
        assert_eq!(cache.query_count(), 0);
    }

    #[test]
    fn test_evicted_row_refetches_from_backing_store() {
        let (backing, cache) = backed_cache(2 * ROW);
        backing.set("t", "a", Entry::new(value(1))).unwrap();
        cache.start();

        cache.get("t", "a").unwrap().unwrap();
        // Two more rows push "a" out.
        cache.set("t", "b", Entry::new(value(2))).unwrap();
        cache.set("t", "c", Entry::new(value(3))).unwrap();
        cache.stop();

        assert!(cache.resident_bytes() <= 2 * ROW);

        // Eviction never deleted from the backing store.
        let row = cache.get("t", "a").unwrap().unwrap();
        assert_eq!(row.value(), value(1));
    }

    #[test]
    fn test_zero_capacity_degrades_without_errors() {
        let (_backing, cache) = backed_cache(0);
        cache.start();

        for i in 0..10u8 {
            cache.set("t", &format!("k{i}"), Entry::new(value(i))).unwrap();
        }
        cache.stop();

        assert_eq!(cache.resident_rows(), 0);
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn test_capacity_change_applies_lazily_while_running() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();

        for i in 0..6u8 {
            cache.set("t", &format!("k{i}"), Entry::new(value(i))).unwrap();
        }

        cache.set_max_capacity(3 * ROW);
        // The shrink lands at the next processed touch.
        cache.get("t", "k5").unwrap().unwrap();
        cache.stop();

        assert!(cache.resident_bytes() <= 3 * ROW);
        assert!(cache.get("t", "k5").unwrap().is_some());
    }

    #[test]
    fn test_concurrent_access_under_eviction_pressure() {
        let (backing, cache) = backed_cache(8 * ROW);
        for i in 0..64u8 {
            backing
                .set("t", &format!("k{i:02}"), Entry::new(value(i)))
                .unwrap();
        }
        let cache = Arc::new(cache);
        cache.start();

        let mut handles = vec![];
        for t in 0..8u8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..200usize {
                    let key = format!("k{:02}", (i + usize::from(t) * 8) % 64);
                    assert!(cache.get("t", &key).unwrap().is_some());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        cache.stop();

        assert_eq!(cache.query_count(), 8 * 200);
        assert!(cache.resident_bytes() <= 8 * ROW);
    }

    #[test]
    fn test_drop_stops_the_worker() {
        let (_backing, cache) = backed_cache(10 * ROW);
        cache.start();
        cache.set("t", "k", Entry::new(&b"v"[..])).unwrap();
        // Dropping must join the worker rather than leaking it.
        drop(cache);
    }
}
