//! # Chain Replay
//!
//! The auditor's view of the ledger: walk entries in append order and
//! recompute every derived field. For entry `k` the checks run in this
//! order, so a mutation of any stored field of entry `k` is reported at
//! index `k` and never at `k + 1`:
//!
//! 1. `entry_digest == SHA256(JCS(commitment))`
//! 2. `prev_head == chain_head` of entry `k - 1` (`None` for entry 0)
//! 3. `chain_head == SHA256(prev_head ++ entry_digest)`

use serde::Serialize;

use crate::entry::{compute_chain_head, LedgerEntry};
use crate::error::ChainIntegrityError;

/// Replay outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Whether every entry replayed cleanly.
    pub ok: bool,
    /// First failing entry, if any.
    pub broken_at_index: Option<usize>,
}

impl ChainReport {
    /// A report that fails at `index`.
    pub fn broken_at(index: usize) -> Self {
        Self {
            ok: false,
            broken_at_index: Some(index),
        }
    }
}

impl From<Result<(), ChainIntegrityError>> for ChainReport {
    fn from(result: Result<(), ChainIntegrityError>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                broken_at_index: None,
            },
            Err(e) => Self::broken_at(e.broken_at_index),
        }
    }
}

/// Replay the chain, failing on the first broken entry.
pub fn audit_chain(entries: &[LedgerEntry]) -> Result<(), ChainIntegrityError> {
    let mut expected_prev: Option<&str> = None;
    for (index, entry) in entries.iter().enumerate() {
        let broken = |reason: String| ChainIntegrityError {
            broken_at_index: index,
            reason,
        };

        let recomputed = entry
            .recompute_digest()
            .map_err(|e| broken(format!("commitment not canonicalizable: {e}")))?;
        if recomputed != entry.entry_digest {
            return Err(broken(format!(
                "entry_digest mismatch: stored {}, recomputed {recomputed}",
                entry.entry_digest
            )));
        }

        if entry.prev_head.as_deref() != expected_prev {
            return Err(broken(format!(
                "prev_head {:?} does not link to previous chain_head {:?}",
                entry.prev_head, expected_prev
            )));
        }

        let head = compute_chain_head(entry.prev_head.as_deref(), &entry.entry_digest);
        if head != entry.chain_head {
            return Err(broken(format!(
                "chain_head mismatch: stored {}, recomputed {head}",
                entry.chain_head
            )));
        }

        expected_prev = Some(entry.chain_head.as_str());
    }
    Ok(())
}

/// Replay the chain and report where it breaks.
pub fn verify_chain(entries: &[LedgerEntry]) -> ChainReport {
    ChainReport::from(audit_chain(entries))
}
