//! # Error Types
//!
//! Low-level errors shared by every crate in the workspace. Domain crates
//! wrap these in their own `thiserror` enums (`PolicyError`, `LedgerError`,
//! `GateError`) rather than re-exporting them directly.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// The value could not be converted to a JSON tree.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error decoding a hex-encoded digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The hex string does not have 64 characters.
    #[error("expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    /// The string contains a non-hex character.
    #[error("invalid hex character at offset {0}")]
    InvalidHex(usize),
}

/// Error parsing a timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// Only `Z`-suffixed UTC timestamps are accepted.
    #[error("timestamp must use Z suffix (UTC only), got: {0:?}")]
    NotUtc(String),

    /// Not valid RFC 3339.
    #[error("invalid RFC 3339 timestamp {input:?}: {reason}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },
}
