//! Gate error types.

use thiserror::Error;

/// A token could not be decoded. The gate turns this into a denial; only
/// strict inspection surfaces it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestationParseError {
    /// Not exactly three dot-separated segments.
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    /// The claims segment is empty.
    #[error("claims segment is empty")]
    EmptyClaims,

    /// A segment is not base64url.
    #[error("{segment} segment is not base64url: {reason}")]
    Base64 {
        /// `header` or `claims`.
        segment: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A segment decoded but is not a JSON object.
    #[error("{segment} segment is not a JSON object: {reason}")]
    Json {
        /// `header` or `claims`.
        segment: &'static str,
        /// Parser message.
        reason: String,
    },
}

/// The secret store collaborator failed (as opposed to having no value).
#[derive(Error, Debug)]
#[error("secret store failed for {name}: {reason}")]
pub struct SecretStoreError {
    /// Secret requested.
    pub name: String,
    /// What went wrong.
    pub reason: String,
}

/// Internal gate failures. Distinct from a denial.
#[derive(Error, Debug)]
pub enum GateError {
    /// Secret store collaborator failed.
    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),

    /// The decision could not be recorded; nothing was released.
    #[error("ledger append failed: {0}")]
    Ledger(#[from] acm_ledger::LedgerError),
}
