//! In-memory table/row store ending a storage chain.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::store::{ensure_row_address, Condition, Storage};

/// A plain table/row store keyed by `(table, key)`.
///
/// Serves as the end of a storage chain: a stand-in for the persistent
/// backing store during bootstrap and in tests. Rows are held per table in
/// key order, so enumeration is naturally sorted. Tables come into
/// existence with their first row; rows land clean, the way a committed
/// store would answer them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, BTreeMap<String, Entry>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.read().values().map(BTreeMap::len).sum()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, table: &str, key: &str) -> Result<Option<Entry>> {
        ensure_row_address(table, key)?;
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    fn get_batch(&self, table: &str, keys: &[&str]) -> Result<Vec<Option<Entry>>> {
        for key in keys {
            ensure_row_address(table, key)?;
        }
        let tables = self.tables.read();
        let rows = tables.get(table);
        Ok(keys
            .iter()
            .map(|key| rows.and_then(|rows| rows.get(*key)).cloned())
            .collect())
    }

    fn set(&self, table: &str, key: &str, mut entry: Entry) -> Result<()> {
        ensure_row_address(table, key)?;
        entry.mark_clean();
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn primary_keys(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<String>> {
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;

        let keys: Vec<String> = rows
            .keys()
            .filter(|key| condition.is_none_or(|cond| cond.is_match(key)))
            .cloned()
            .collect();

        Ok(match condition {
            Some(cond) => cond.apply_limit(keys),
            None => keys,
        })
    }
}
