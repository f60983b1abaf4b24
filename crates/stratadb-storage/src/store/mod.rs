//! Row stores and the chaining contract between them.
//!
//! Every layer of the state stack speaks the same row-access contract,
//! [`Storage`]: point reads, batched reads, writes, and primary-key
//! enumeration. Layers compose by holding the previous (slower) store as
//! a `dyn Storage` and delegating on local miss.
//!
//! # Public Types
//!
//! - [`Storage`], [`TraverseStorage`]: layering traits
//! - [`StateStorage`]: concurrent in-memory working set chained to a backing store
//! - [`MemoryStorage`]: table/row store ending a chain
//! - [`Condition`]: key filter for primary-key enumeration

mod condition;
mod memory;
mod state;

pub use condition::{CompareOp, Condition};
pub use memory::MemoryStorage;
pub use state::{RowLookup, StateStorage};

use crate::entry::{Entry, RowKey};
use crate::error::{Error, Result};

/// The row-access contract shared by every layer of the state stack.
pub trait Storage: Send + Sync {
    /// Reads one row, or reports its absence.
    ///
    /// # Errors
    ///
    /// Returns an error when the store (or a store further down the chain)
    /// cannot be read.
    fn get(&self, table: &str, key: &str) -> Result<Option<Entry>>;

    /// Reads a set of rows in one pass, answering each key independently.
    ///
    /// # Errors
    ///
    /// Same failure semantics as [`Storage::get`].
    fn get_batch(&self, table: &str, keys: &[&str]) -> Result<Vec<Option<Entry>>>;

    /// Writes one row. A single row is never partially applied.
    ///
    /// # Errors
    ///
    /// Returns an error on a rejected address or a failed write.
    fn set(&self, table: &str, key: &str, entry: Entry) -> Result<()>;

    /// Enumerates the primary keys of a table, optionally filtered.
    ///
    /// # Errors
    ///
    /// Fails only if the table itself cannot be accessed.
    fn primary_keys(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<String>>;
}

/// A row set that can be walked in its natural `(table, key)` order,
/// optionally restricted to locally modified rows.
///
/// This is the source side of a bulk merge: typically the working set
/// produced by one finished execution round.
pub trait TraverseStorage {
    /// Visits every row, skipping clean rows when `only_dirty` is set.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `visit`.
    fn traverse(
        &self,
        only_dirty: bool,
        visit: &mut dyn FnMut(&RowKey, &Entry) -> Result<()>,
    ) -> Result<()>;
}

/// Rejects empty row-address components.
///
/// The empty/empty pair is reserved as the maintenance stop sentinel, so
/// no legitimate table or key may be empty.
pub(crate) fn ensure_row_address(table: &str, key: &str) -> Result<()> {
    if table.is_empty() || key.is_empty() {
        return Err(Error::InvalidKey {
            table: table.to_string(),
            key: key.to_string(),
        });
    }
    Ok(())
}
