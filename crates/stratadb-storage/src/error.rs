//! Error types for `StrataDB` storage.
//!
//! This module provides a unified error type for all storage-stack
//! operations. Backing-store failures are surfaced verbatim to the caller;
//! this layer never swallows or retries them.

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the storage stack.
///
/// Each variant includes a descriptive error message suitable for end-users.
/// Error codes follow the pattern `STRATA-XXX` for easy debugging.
#[derive(Error, Debug)]
pub enum Error {
    /// Table not found (STRATA-001).
    #[error("[STRATA-001] Table '{0}' not found")]
    TableNotFound(String),

    /// Invalid row address (STRATA-002).
    ///
    /// Empty table names and empty row keys are rejected at the public API;
    /// the empty/empty pair is reserved as the maintenance stop sentinel.
    #[error("[STRATA-002] Invalid row address: table '{table}', key '{key}' (empty components are reserved)")]
    InvalidKey {
        /// Table component of the rejected address.
        table: String,
        /// Key component of the rejected address.
        key: String,
    },

    /// Backing store error (STRATA-003).
    #[error("[STRATA-003] Storage error: {0}")]
    Storage(String),

    /// IO error (STRATA-004).
    #[error("[STRATA-004] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (STRATA-005).
    #[error("[STRATA-005] Configuration error: {0}")]
    Config(String),

    /// Internal error (STRATA-006).
    ///
    /// Indicates an unexpected internal error. Please report if encountered.
    #[error("[STRATA-006] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "STRATA-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TableNotFound(_) => "STRATA-001",
            Self::InvalidKey { .. } => "STRATA-002",
            Self::Storage(_) => "STRATA-003",
            Self::Io(_) => "STRATA-004",
            Self::Config(_) => "STRATA-005",
            Self::Internal(_) => "STRATA-006",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Non-recoverable errors indicate corrupted or inconsistent state.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}
