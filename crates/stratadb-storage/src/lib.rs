//! # `StrataDB` Storage
//!
//! Layered state storage for blockchain execution nodes.
//!
//! The crate provides the state-storage stack that sits between an
//! execution engine and a chain of slower backing stores: an in-memory
//! working set ([`StateStorage`]) that misses through to the previous
//! store in the chain, wrapped by a bounded, concurrent, recency-ordered
//! cache ([`LruStorage`]) that keeps the resident set within a configured
//! byte budget under heavy parallel access.
//!
//! ## Design
//!
//! - Every layer speaks the same row-access contract ([`Storage`]): point
//!   reads, batched reads, writes, and primary-key enumeration over
//!   `(table, key)` addresses.
//! - The cache layer never takes an internal lock on the read/write path.
//!   Accesses enqueue touch events on an unbounded channel; a single
//!   maintenance worker owns the recency order and evicts least recently
//!   used rows once the resident byte size exceeds capacity.
//! - Bulk merges absorb a finished execution round's working set in one
//!   traversal, leaving capacity enforcement to the worker.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratadb_storage::{Entry, LruStorage, MemoryStorage, Storage};
//!
//! let backing = Arc::new(MemoryStorage::new());
//! let cache = LruStorage::with_capacity(Some(backing), 64 * 1024 * 1024);
//! cache.start();
//!
//! cache.set("accounts", "0xabc", Entry::new(&b"balance=7"[..]))?;
//! let row = cache.get("accounts", "0xabc")?;
//!
//! cache.stop();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod logging;
pub mod store;

pub use cache::{CacheStats, LruStorage, RecencyIndex};
pub use config::{CacheConfig, ConfigError, LoggingConfig, StrataConfig};
pub use entry::{Entry, RowKey, TouchEvent};
pub use error::{Error, Result};
pub use store::{
    CompareOp, Condition, MemoryStorage, RowLookup, StateStorage, Storage, TraverseStorage,
};
