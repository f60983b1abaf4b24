//! Row addressing and row payloads.
//!
//! A row lives under a `(table, key)` address. `Entry` carries the row
//! payload together with its dirty flag; `TouchEvent` is the unit shipped
//! through the access event queue to the maintenance worker.

use bytes::Bytes;

/// Address of a row: a `(table, key)` pair.
///
/// Equality and hashing are over the pair. Both components are immutable
/// once constructed. Empty components never occur in legitimate traffic;
/// the empty/empty pair is reserved for [`TouchEvent::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    table: String,
    key: String,
}

impl RowKey {
    /// Creates a new row address.
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Table component of the address.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key component of the address.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A stored row payload with its modification state.
///
/// Values are held as [`Bytes`] so clones out of the concurrent resident
/// set are reference-counted rather than copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    value: Bytes,
    dirty: bool,
}

impl Entry {
    /// Fixed per-row overhead charged on top of the payload bytes.
    ///
    /// Approximates the key strings, map slot, and bookkeeping each
    /// resident row costs. The exact formula is a tunable, not a contract.
    pub const OVERHEAD_BYTES: usize = 64;

    /// Creates a clean entry (e.g., a row materialized from a backing store).
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            dirty: false,
        }
    }

    /// Creates a dirty entry (a locally modified row).
    pub fn dirty(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            dirty: true,
        }
    }

    /// The row payload.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Whether this row has local modifications not yet absorbed upward.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the row as locally modified.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Marks the row as unmodified relative to the backing chain.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Estimated resident cost of this row in bytes.
    #[must_use]
    pub fn size_of(&self) -> usize {
        self.value.len() + Self::OVERHEAD_BYTES
    }
}

/// An access event shipped to the maintenance worker.
///
/// A distinguished sentinel, carrying an empty table and an empty key,
/// signals the worker to terminate. Legitimate traffic can never produce
/// it because empty row addresses are rejected at the public API.
#[derive(Debug, Clone)]
pub struct TouchEvent(RowKey);

impl TouchEvent {
    /// Wraps a row address for queue transport.
    #[must_use]
    pub fn touch(key: RowKey) -> Self {
        Self(key)
    }

    /// The stop sentinel.
    #[must_use]
    pub fn stop() -> Self {
        Self(RowKey::new("", ""))
    }

    /// Whether this event is the stop sentinel.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.0.table().is_empty() && self.0.key().is_empty()
    }

    /// Unwraps the touched row address.
    #[must_use]
    pub fn into_key(self) -> RowKey {
        self.0
    }
}
