//! Ledger error types.

use thiserror::Error;

/// Errors from appending to or reading the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A durable write (log line, fsync, head record) failed. The entry
    /// must be treated as not appended.
    #[error("ledger write failed at {path}: {source}")]
    Write {
        /// File being written.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the log failed.
    #[error("ledger read failed at {path}: {source}")]
    Read {
        /// File being read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Acquiring the cross-process append lock failed.
    #[error("could not lock ledger {path}: {source}")]
    Lock {
        /// Lock file path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A committed record does not decode as an entry. Committed records
    /// are never repaired; only an unterminated final fragment is.
    #[error("corrupt ledger record at {path}:{line}: {reason}")]
    CorruptLog {
        /// Log file path.
        path: String,
        /// 1-indexed line number.
        line: usize,
        /// Parse failure.
        reason: String,
    },

    /// Entry commitment could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] acm_core::CanonicalizationError),

    /// Entry could not be serialized for storage.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Replay found a broken link. Raised only by chain audit, never by append.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chain broken at entry {broken_at_index}: {reason}")]
pub struct ChainIntegrityError {
    /// 0-indexed position of the first entry that fails replay.
    pub broken_at_index: usize,
    /// Which check failed.
    pub reason: String,
}
