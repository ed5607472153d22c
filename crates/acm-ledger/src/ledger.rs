//! The audit ledger facade.

use std::path::Path;

use acm_core::Timestamp;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::chain::{audit_chain, ChainReport};
use crate::entry::{EntryType, LedgerEntry};
use crate::error::LedgerError;
use crate::storage::{FileStorage, LedgerStorage, MemoryStorage};

/// Append-only, hash-chained decision log.
///
/// `append` holds the storage mutex for the whole read-head, seal, write,
/// publish-head sequence, so two appends from the same process never see
/// the same `prev_head`. [`FileStorage`] adds a cross-process lock on top.
pub struct AuditLedger {
    storage: Mutex<Box<dyn LedgerStorage>>,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger").finish_non_exhaustive()
    }
}

impl AuditLedger {
    /// Wrap a storage backend.
    pub fn new(storage: impl LedgerStorage + 'static) -> Self {
        Self {
            storage: Mutex::new(Box::new(storage)),
        }
    }

    /// Ledger backed by `dir/file_name`.
    pub fn open(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, LedgerError> {
        Ok(Self::new(FileStorage::open(dir, file_name)?))
    }

    /// Ledger held in memory.
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Append a decision. Returns the sealed entry as persisted.
    pub fn append(&self, entry_type: EntryType, payload: Value) -> Result<LedgerEntry, LedgerError> {
        let mut payload = Some(payload);
        let mut storage = self.storage.lock();
        let entry = storage.append_with(&mut |prev_head| {
            LedgerEntry::seal(
                entry_type,
                payload.take().unwrap_or(Value::Null),
                Timestamp::now(),
                prev_head,
            )
        })?;
        tracing::info!(
            entry_type = %entry.entry_type,
            entry_digest = %entry.entry_digest,
            chain_head = %entry.chain_head,
            "ledger entry appended"
        );
        Ok(entry)
    }

    /// Serialize `record` and append it.
    pub fn append_record<T: Serialize>(
        &self,
        entry_type: EntryType,
        record: &T,
    ) -> Result<LedgerEntry, LedgerError> {
        self.append(entry_type, serde_json::to_value(record)?)
    }

    /// Current chain head, or `None` for an empty ledger.
    pub fn current_head(&self) -> Result<Option<String>, LedgerError> {
        self.storage.lock().head()
    }

    /// All entries in append order.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.storage.lock().entries()
    }

    /// Replay the stored chain without modifying storage.
    ///
    /// A committed record that no longer decodes is a break at its index,
    /// unless an earlier entry already fails replay.
    pub fn audit(&self) -> Result<ChainReport, LedgerError> {
        let scan = self.storage.lock().scan()?;
        let report = match (audit_chain(&scan.entries), &scan.unreadable) {
            (Err(e), _) => {
                tracing::warn!(broken_at_index = e.broken_at_index, reason = %e.reason, "ledger chain audit failed");
                ChainReport::from(Err(e))
            }
            (Ok(()), Some(record)) => {
                tracing::warn!(
                    broken_at_index = record.index,
                    line = record.line,
                    reason = %record.reason,
                    "ledger record does not decode"
                );
                ChainReport::broken_at(record.index)
            }
            (Ok(()), None) => ChainReport::from(Ok(())),
        };
        Ok(report)
    }
}
