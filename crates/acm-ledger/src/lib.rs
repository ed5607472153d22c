//! # acm-ledger: Hash-Chained Audit Ledger
//!
//! An append-only log of decision entries where every entry folds in the
//! previous chain head:
//!
//! ```text
//! entry_digest = SHA256(JCS({type, payload, timestamp, prev_head}))
//! chain_head   = SHA256(utf8(prev_head or "") ++ utf8(entry_digest))
//! ```
//!
//! `entry_digest` and `chain_head` are derived and never part of their own
//! commitment. Retroactive edits to any stored field break the replay done
//! by [`verify_chain`].
//!
//! ## Append Discipline
//!
//! Reading the head, building the entry, writing the entry and publishing
//! the head run as one critical section: an in-process [`parking_lot::Mutex`]
//! around the storage, plus an exclusive `fs2` lock on the ledger directory
//! for [`FileStorage`] so separate processes serialize too. The head is always
//! derived from the last durable record; the head file is a cache. Reads
//! and audits never modify the log.

pub mod chain;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod storage;

pub use chain::{audit_chain, verify_chain, ChainReport};
pub use entry::{compute_chain_head, compute_entry_digest, EntryType, LedgerEntry};
pub use error::{ChainIntegrityError, LedgerError};
pub use ledger::AuditLedger;
pub use storage::{
    FileStorage, HeadRecord, LedgerStorage, LogScan, MemoryStorage, UnreadableRecord,
};
