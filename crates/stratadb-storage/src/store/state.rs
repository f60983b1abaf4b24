//! Concurrent in-memory working set chained to a backing store.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::entry::{Entry, RowKey};
use crate::error::{Error, Result};
use crate::store::{ensure_row_address, Condition, Storage, TraverseStorage};

/// Outcome of a read against the working set.
#[derive(Debug, Clone)]
pub enum RowLookup {
    /// The row already resided in this layer's local state.
    Resident(Entry),
    /// The row was fetched from the backing chain and materialized locally.
    Fetched(Entry),
    /// No row exists under this address anywhere in the chain.
    Absent,
}

impl RowLookup {
    /// The row, if the lookup produced one.
    #[must_use]
    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Self::Resident(entry) | Self::Fetched(entry) => Some(entry),
            Self::Absent => None,
        }
    }
}

/// The resident row set of one state layer.
///
/// Reads miss through to the previous store in the chain and materialize
/// the fetched row locally; writes land locally and are marked dirty until
/// absorbed upward. The map is internally thread-safe per key, so caller
/// threads may insert and overwrite concurrently while the maintenance
/// worker deletes on eviction.
///
/// Resident size is tracked incrementally: every insert, overwrite, and
/// discard adjusts an atomic byte counter under the owning map shard's
/// lock, so capacity checks never rescan the map.
pub struct StateStorage {
    prev: Option<Arc<dyn Storage>>,
    rows: DashMap<RowKey, Entry>,
    resident_bytes: AtomicUsize,
}

impl StateStorage {
    /// Creates a working set chained to `prev`, or a chain end when `None`.
    #[must_use]
    pub fn new(prev: Option<Arc<dyn Storage>>) -> Self {
        Self {
            prev,
            rows: DashMap::new(),
            resident_bytes: AtomicUsize::new(0),
        }
    }

    /// Estimated bytes held by resident rows.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes.load(Ordering::Relaxed)
    }

    /// Number of resident rows.
    #[must_use]
    pub fn resident_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether a row currently resides locally. Does not consult the chain.
    #[must_use]
    pub fn is_resident(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Reads one row, reporting where the answer came from.
    ///
    /// # Errors
    ///
    /// Propagates backing-chain failures verbatim.
    pub fn lookup(&self, table: &str, key: &str) -> Result<RowLookup> {
        ensure_row_address(table, key)?;
        let row_key = RowKey::new(table, key);

        if let Some(resident) = self.rows.get(&row_key) {
            return Ok(RowLookup::Resident(resident.clone()));
        }

        let Some(prev) = &self.prev else {
            return Ok(RowLookup::Absent);
        };
        match prev.get(table, key)? {
            Some(mut fetched) => {
                fetched.mark_clean();
                Ok(self.materialize(row_key, fetched))
            }
            None => Ok(RowLookup::Absent),
        }
    }

    /// Reads a set of rows in one pass: a local sweep, then a single
    /// batched fetch from the chain for the missing keys.
    ///
    /// # Errors
    ///
    /// Propagates backing-chain failures verbatim.
    pub fn lookup_batch(&self, table: &str, keys: &[&str]) -> Result<Vec<RowLookup>> {
        for key in keys {
            ensure_row_address(table, key)?;
        }

        let mut lookups: Vec<Option<RowLookup>> = Vec::with_capacity(keys.len());
        let mut missing: Vec<usize> = Vec::new();
        for (idx, key) in keys.iter().enumerate() {
            match self.rows.get(&RowKey::new(table, *key)) {
                Some(resident) => lookups.push(Some(RowLookup::Resident(resident.clone()))),
                None => {
                    lookups.push(None);
                    missing.push(idx);
                }
            }
        }

        if !missing.is_empty() {
            if let Some(prev) = &self.prev {
                let missing_keys: Vec<&str> = missing.iter().map(|idx| keys[*idx]).collect();
                let fetched = prev.get_batch(table, &missing_keys)?;
                for (idx, row) in missing.iter().zip(fetched) {
                    if let Some(mut entry) = row {
                        entry.mark_clean();
                        lookups[*idx] =
                            Some(self.materialize(RowKey::new(table, keys[*idx]), entry));
                    }
                }
            }
        }

        Ok(lookups
            .into_iter()
            .map(|lookup| lookup.unwrap_or(RowLookup::Absent))
            .collect())
    }

    /// Inserts or overwrites a resident row, preserving the entry's dirty
    /// flag. This is the raw import path used by bulk merges.
    pub fn insert_row(&self, key: RowKey, entry: Entry) {
        let new_size = entry.size_of();
        match self.rows.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let old_size = occupied.get().size_of();
                occupied.insert(entry);
                if new_size >= old_size {
                    self.resident_bytes
                        .fetch_add(new_size - old_size, Ordering::Relaxed);
                } else {
                    self.resident_bytes
                        .fetch_sub(old_size - new_size, Ordering::Relaxed);
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                self.resident_bytes.fetch_add(new_size, Ordering::Relaxed);
            }
        }
    }

    /// Drops a row from the resident set, if present.
    ///
    /// The chain below is untouched: a discarded row is re-fetched on the
    /// next read if the backing store still holds it.
    pub fn discard(&self, key: &RowKey) -> bool {
        match self.rows.remove(key) {
            Some((_, entry)) => {
                self.resident_bytes
                    .fetch_sub(entry.size_of(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn materialize(&self, key: RowKey, entry: Entry) -> RowLookup {
        match self.rows.entry(key) {
            // A concurrent caller raced us here; its copy already resides.
            MapEntry::Occupied(occupied) => RowLookup::Resident(occupied.get().clone()),
            MapEntry::Vacant(vacant) => {
                self.resident_bytes
                    .fetch_add(entry.size_of(), Ordering::Relaxed);
                vacant.insert(entry.clone());
                RowLookup::Fetched(entry)
            }
        }
    }

    /// Collects the locally resident keys of `table` that satisfy
    /// `condition`, along with whether the table has any local rows at all.
    fn local_keys(&self, table: &str, condition: Option<&Condition>) -> (bool, BTreeSet<String>) {
        let mut present = false;
        let mut keys = BTreeSet::new();
        for row in self.rows.iter() {
            if row.key().table() != table {
                continue;
            }
            present = true;
            let key = row.key().key();
            if condition.is_none_or(|cond| cond.is_match(key)) {
                keys.insert(key.to_string());
            }
        }
        (present, keys)
    }
}

impl Storage for StateStorage {
    fn get(&self, table: &str, key: &str) -> Result<Option<Entry>> {
        Ok(self.lookup(table, key)?.into_entry())
    }

    fn get_batch(&self, table: &str, keys: &[&str]) -> Result<Vec<Option<Entry>>> {
        Ok(self
            .lookup_batch(table, keys)?
            .into_iter()
            .map(RowLookup::into_entry)
            .collect())
    }

    fn set(&self, table: &str, key: &str, mut entry: Entry) -> Result<()> {
        ensure_row_address(table, key)?;
        entry.mark_dirty();
        self.insert_row(RowKey::new(table, key), entry);
        Ok(())
    }

    fn primary_keys(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<String>> {
        let (present_locally, mut keys) = self.local_keys(table, condition);

        if let Some(prev) = &self.prev {
            // Strip the window so it applies exactly once, over the union.
            let inner = condition.map(Condition::without_limit);
            match prev.primary_keys(table, inner.as_ref()) {
                Ok(chained) => keys.extend(chained),
                Err(Error::TableNotFound(_)) if present_locally => {}
                Err(err) => return Err(err),
            }
        } else if !present_locally {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let ordered: Vec<String> = keys.into_iter().collect();
        Ok(match condition {
            Some(cond) => cond.apply_limit(ordered),
            None => ordered,
        })
    }
}

impl TraverseStorage for StateStorage {
    fn traverse(
        &self,
        only_dirty: bool,
        visit: &mut dyn FnMut(&RowKey, &Entry) -> Result<()>,
    ) -> Result<()> {
        let mut rows: Vec<(RowKey, Entry)> = self
            .rows
            .iter()
            .filter(|row| !only_dirty || row.value().is_dirty())
            .map(|row| (row.key().clone(), row.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, entry) in &rows {
            visit(key, entry)?;
        }
        Ok(())
    }
}
