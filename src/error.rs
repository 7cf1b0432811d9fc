//! Error types for the foliochat core.
//!
//! Expected outcomes (cache miss, TTL expiry, admission rejection) are ordinary
//! return values, never errors. Errors are reserved for invalid configuration
//! and collaborator faults.

use thiserror::Error;

/// Errors produced by the foliochat core.
#[derive(Debug, Error)]
pub enum FolioError {
    /// Invalid configuration detected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The usage ledger collaborator failed (storage unreachable, timeout).
    ///
    /// Admission checks never surface this — persisted-tier checks fail open.
    /// It is returned only from direct ledger trait calls.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// The completion provider collaborator failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The context searcher collaborator failed.
    #[error("Search error: {0}")]
    Search(String),
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FolioError>;
