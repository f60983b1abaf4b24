//! The cache layer: row access with background LRU eviction.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::{CacheStats, RecencyIndex};
use crate::config::CacheConfig;
use crate::entry::{Entry, RowKey, TouchEvent};
use crate::error::Result;
use crate::store::{
    ensure_row_address, Condition, RowLookup, StateStorage, Storage, TraverseStorage,
};

/// Bounded, concurrent, recency-ordered cache over a chained row store.
///
/// Composes a [`StateStorage`] resident set with an access event queue and
/// one maintenance worker. Reads and writes pass through the resident set
/// (missing down the chain) and enqueue a touch; the worker reorders the
/// recency index and evicts least recently used rows while the resident
/// byte size exceeds the capacity bound.
///
/// The worker is started with [`LruStorage::start`] and stopped with
/// [`LruStorage::stop`]; both are idempotent and safe under concurrent
/// calls. Dropping the cache stops the worker first.
pub struct LruStorage {
    state: Arc<StateStorage>,
    touch_tx: Sender<TouchEvent>,
    touch_rx: Receiver<TouchEvent>,
    max_capacity: Arc<AtomicUsize>,
    hits: AtomicU64,
    queries: AtomicU64,
    evictions: Arc<AtomicU64>,
    running: AtomicBool,
    worker: Mutex<WorkerSlot>,
}

/// Lifecycle state handed back and forth with the maintenance worker.
///
/// The recency index travels through the worker's return value on stop and
/// is reused on the next start, so exactly one owner mutates it at any
/// point in time.
struct WorkerSlot {
    handle: Option<JoinHandle<RecencyIndex>>,
    index: Option<RecencyIndex>,
}

impl LruStorage {
    /// Default capacity bound for the resident set.
    pub const DEFAULT_MAX_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

    /// Creates a cache over `prev` with the default capacity.
    #[must_use]
    pub fn new(prev: Option<Arc<dyn Storage>>) -> Self {
        Self::with_capacity(prev, Self::DEFAULT_MAX_CAPACITY_BYTES)
    }

    /// Creates a cache over `prev` bounded to `max_capacity_bytes`.
    #[must_use]
    pub fn with_capacity(prev: Option<Arc<dyn Storage>>, max_capacity_bytes: usize) -> Self {
        let (touch_tx, touch_rx) = unbounded();
        Self {
            state: Arc::new(StateStorage::new(prev)),
            touch_tx,
            touch_rx,
            max_capacity: Arc::new(AtomicUsize::new(max_capacity_bytes)),
            hits: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            evictions: Arc::new(AtomicU64::new(0)),
            running: AtomicBool::new(false),
            worker: Mutex::new(WorkerSlot {
                handle: None,
                index: None,
            }),
        }
    }

    /// Creates a cache over `prev` sized from configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig, prev: Option<Arc<dyn Storage>>) -> Self {
        Self::with_capacity(prev, config.max_capacity_bytes())
    }

    /// Spawns the maintenance worker. No-op if already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if self.running.load(Ordering::Acquire) {
            return;
        }

        let index = worker.index.take().unwrap_or_default();
        let events = self.touch_rx.clone();
        let state = Arc::clone(&self.state);
        let capacity = Arc::clone(&self.max_capacity);
        let evictions = Arc::clone(&self.evictions);
        worker.handle = Some(std::thread::spawn(move || {
            maintenance_loop(&events, &state, &capacity, &evictions, index)
        }));
        self.running.store(true, Ordering::Release);
        tracing::debug!("cache maintenance started");
    }

    /// Stops the maintenance worker and waits for it to exit.
    /// No-op if not running.
    ///
    /// The stop sentinel travels through the same queue as regular touches,
    /// so every touch enqueued before this call is processed first.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        self.running.store(false, Ordering::Release);

        self.touch_tx.send(TouchEvent::stop()).ok();
        if let Some(handle) = worker.handle.take() {
            match handle.join() {
                Ok(index) => worker.index = Some(index),
                Err(_) => tracing::error!("cache maintenance worker panicked"),
            }
        }
        tracing::debug!("cache maintenance stopped");
    }

    /// Whether the maintenance worker is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Updates the resident-set capacity bound.
    ///
    /// Takes effect at the worker's next eviction check; safe to call at
    /// any point in the lifecycle.
    pub fn set_max_capacity(&self, bytes: usize) {
        if bytes == 0 {
            tracing::warn!("cache capacity set to zero; every touched row becomes evictable");
        }
        self.max_capacity.store(bytes, Ordering::Relaxed);
    }

    /// The configured resident-set capacity bound.
    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity.load(Ordering::Relaxed)
    }

    /// Lookups answered from the resident set since construction.
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total row lookups since construction.
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Snapshot of the access statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Estimated bytes held by resident rows.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.state.resident_bytes()
    }

    /// Number of resident rows.
    #[must_use]
    pub fn resident_rows(&self) -> usize {
        self.state.resident_rows()
    }

    /// Absorbs every row visible through `source` into the resident set,
    /// overwriting existing copies. With `only_dirty`, unmodified rows are
    /// skipped.
    ///
    /// Imported rows are touched exactly as a read or write would touch
    /// them, so they start most recently used. Capacity enforcement stays
    /// with the maintenance worker; the merge itself never evicts.
    ///
    /// # Errors
    ///
    /// Fails only if the source traversal fails.
    pub fn merge(&self, only_dirty: bool, source: &dyn TraverseStorage) -> Result<()> {
        let mut imported = 0usize;
        source.traverse(only_dirty, &mut |key, entry| {
            self.state.insert_row(key.clone(), entry.clone());
            self.touch_tx.send(TouchEvent::touch(key.clone())).ok();
            imported += 1;
            Ok(())
        })?;
        tracing::debug!(imported, only_dirty, "absorbed rows from source storage");
        Ok(())
    }

    fn push_touch(&self, table: &str, key: &str) {
        self.touch_tx
            .send(TouchEvent::touch(RowKey::new(table, key)))
            .ok();
    }

    fn record_lookup(&self, table: &str, lookup: &RowLookup, key: &str) {
        match lookup {
            RowLookup::Resident(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.push_touch(table, key);
            }
            RowLookup::Fetched(_) => self.push_touch(table, key),
            RowLookup::Absent => {}
        }
    }
}

impl Storage for LruStorage {
    fn get(&self, table: &str, key: &str) -> Result<Option<Entry>> {
        ensure_row_address(table, key)?;
        self.queries.fetch_add(1, Ordering::Relaxed);

        let lookup = self.state.lookup(table, key)?;
        self.record_lookup(table, &lookup, key);
        Ok(lookup.into_entry())
    }

    fn get_batch(&self, table: &str, keys: &[&str]) -> Result<Vec<Option<Entry>>> {
        for key in keys {
            ensure_row_address(table, key)?;
        }
        self.queries.fetch_add(keys.len() as u64, Ordering::Relaxed);

        let lookups = self.state.lookup_batch(table, keys)?;
        for (key, lookup) in keys.iter().zip(&lookups) {
            self.record_lookup(table, lookup, key);
        }
        Ok(lookups.into_iter().map(RowLookup::into_entry).collect())
    }

    fn set(&self, table: &str, key: &str, entry: Entry) -> Result<()> {
        self.state.set(table, key, entry)?;
        self.push_touch(table, key);
        Ok(())
    }

    fn primary_keys(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<String>> {
        // Enumeration is not a touch and not a query.
        self.state.primary_keys(table, condition)
    }
}

impl Drop for LruStorage {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drains the access event queue, maintaining recency order and enforcing
/// the capacity bound. Returns the index to the caller of `stop` so the
/// next worker can resume from it.
fn maintenance_loop(
    events: &Receiver<TouchEvent>,
    state: &StateStorage,
    capacity: &AtomicUsize,
    evictions: &AtomicU64,
    mut index: RecencyIndex,
) -> RecencyIndex {
    while let Ok(event) = events.recv() {
        if event.is_stop() {
            break;
        }
        index.touch(event.into_key());

        let cap = capacity.load(Ordering::Relaxed);
        let mut evicted = 0u64;
        while state.resident_bytes() > cap {
            let Some(victim) = index.pop_lru() else {
                break;
            };
            if state.discard(&victim) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            evictions.fetch_add(evicted, Ordering::Relaxed);
            tracing::trace!(
                evicted,
                resident_bytes = state.resident_bytes(),
                "evicted least recently used rows"
            );
        }
    }
    index
}
