//! # Ledger Entries
//!
//! A [`LedgerEntry`] is sealed once, at append time, and never modified.
//! The digested commitment is the entry minus its two derived fields:
//!
//! ```text
//! commitment   = {type, payload, timestamp, prev_head}     (prev_head: null for entry 0)
//! entry_digest = SHA256(JCS(commitment))
//! chain_head   = SHA256(utf8(prev_head or "") ++ utf8(entry_digest))
//! ```

use acm_core::{sha256_digest, CanonicalBytes, ContentDigest, Sha256Accumulator, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

/// Kind of decision an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// A plan verification verdict.
    PlanVerdict,
    /// A secret released by the attestation gate.
    SecretRelease,
    /// A denied release request (only when denial auditing is enabled).
    SecretDenial,
    /// A decision proof bundle.
    DecisionProof,
}

impl EntryType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanVerdict => "plan_verdict",
            Self::SecretRelease => "secret_release",
            Self::SecretDenial => "secret_denial",
            Self::DecisionProof => "decision_proof",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sealed ledger record, as stored (one JSON object per log line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry kind.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Decision payload.
    pub payload: Value,
    /// When the entry was sealed.
    pub timestamp: Timestamp,
    /// Chain head before this entry; `None` for the first entry.
    pub prev_head: Option<String>,
    /// Digest of the commitment, lowercase hex.
    pub entry_digest: String,
    /// Chain head after this entry, lowercase hex.
    pub chain_head: String,
}

#[derive(Serialize)]
struct EntryCommitment<'a> {
    #[serde(rename = "type")]
    entry_type: EntryType,
    payload: &'a Value,
    timestamp: Timestamp,
    prev_head: Option<&'a str>,
}

/// Digest of an entry's commitment.
pub fn compute_entry_digest(
    entry_type: EntryType,
    payload: &Value,
    timestamp: Timestamp,
    prev_head: Option<&str>,
) -> Result<ContentDigest, LedgerError> {
    let canonical = CanonicalBytes::new(&EntryCommitment {
        entry_type,
        payload,
        timestamp,
        prev_head,
    })?;
    Ok(sha256_digest(&canonical))
}

/// Fold an entry digest into the chain. Both inputs are hex strings.
pub fn compute_chain_head(prev_head: Option<&str>, entry_digest: &str) -> String {
    let mut acc = Sha256Accumulator::new();
    acc.update(prev_head.unwrap_or("").as_bytes());
    acc.update(entry_digest.as_bytes());
    acc.finalize().to_hex()
}

impl LedgerEntry {
    /// Seal a new entry on top of `prev_head`.
    pub fn seal(
        entry_type: EntryType,
        payload: Value,
        timestamp: Timestamp,
        prev_head: Option<String>,
    ) -> Result<Self, LedgerError> {
        let entry_digest =
            compute_entry_digest(entry_type, &payload, timestamp, prev_head.as_deref())?.to_hex();
        let chain_head = compute_chain_head(prev_head.as_deref(), &entry_digest);
        Ok(Self {
            entry_type,
            payload,
            timestamp,
            prev_head,
            entry_digest,
            chain_head,
        })
    }

    /// Recompute this entry's digest from its stored fields.
    pub fn recompute_digest(&self) -> Result<String, LedgerError> {
        Ok(compute_entry_digest(
            self.entry_type,
            &self.payload,
            self.timestamp,
            self.prev_head.as_deref(),
        )?
        .to_hex())
    }
}
