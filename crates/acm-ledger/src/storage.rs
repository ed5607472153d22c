//! # Ledger Storage
//!
//! Two backends behind [`LedgerStorage`]:
//!
//! - [`FileStorage`]: one JSON entry per line in an append-only log, plus a
//!   separately addressable head record (`chain.meta`,
//!   `{head_digest, updated_at}`). Every operation runs under an exclusive
//!   `fs2` lock on a sibling lock file, so independent processes sharing the
//!   directory serialize their appends.
//! - [`MemoryStorage`]: a vector, for tests and embedding.
//!
//! ## Crash Recovery
//!
//! The log line, newline included, and its fsync are the commit point. The
//! head record is written afterwards through a temp file and rename, and is
//! only a cache: the head is always re-derived from the last durable record.
//!
//! Reads never modify the log. A final fragment without its newline is a
//! torn write from a crash before the commit point; reads ignore it and the
//! next append truncates it away. A newline-terminated record that does not
//! decode is committed data: reads surface it as an [`UnreadableRecord`]
//! (the auditor reports it as a chain break at its index) and appends refuse
//! to extend the log past it with [`LedgerError::CorruptLog`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use acm_core::Timestamp;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::entry::LedgerEntry;
use crate::error::LedgerError;

/// File name of the head record inside the ledger directory.
pub const HEAD_FILE_NAME: &str = "chain.meta";

/// The cached chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRecord {
    /// Latest `chain_head`, or `None` for an empty ledger.
    pub head_digest: Option<String>,
    /// When the head was last written.
    pub updated_at: Timestamp,
}

/// A committed log record that does not decode as a [`LedgerEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRecord {
    /// 0-indexed entry position the record occupies in the chain.
    pub index: usize,
    /// 1-indexed line number in the log.
    pub line: usize,
    /// Decode failure.
    pub reason: String,
}

/// The log as it stands on disk, read without modification.
#[derive(Debug, Clone, Default)]
pub struct LogScan {
    /// Decoded entries up to the first unreadable record.
    pub entries: Vec<LedgerEntry>,
    /// First committed record that does not decode, if any.
    pub unreadable: Option<UnreadableRecord>,
    /// Byte offset of an unterminated final fragment, if any.
    pub torn_tail: Option<u64>,
}

/// Builds the entry to append from the current tail head.
pub type EntryBuilder<'a> = dyn FnMut(Option<String>) -> Result<LedgerEntry, LedgerError> + 'a;

/// Durable backend for the audit ledger.
pub trait LedgerStorage: Send {
    /// Run one append critical section: read the tail head, call `build`
    /// with it, persist the returned entry, publish the new head.
    fn append_with(&mut self, build: &mut EntryBuilder<'_>) -> Result<LedgerEntry, LedgerError>;

    /// All entries in append order.
    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// The stored log, including records that do not decode. Never writes.
    fn scan(&self) -> Result<LogScan, LedgerError> {
        Ok(LogScan {
            entries: self.entries()?,
            ..LogScan::default()
        })
    }

    /// The current chain head, derived from the last entry.
    fn head(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.entries()?.last().map(|e| e.chain_head.clone()))
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Vector-backed storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Vec<LedgerEntry>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStorage for MemoryStorage {
    fn append_with(&mut self, build: &mut EntryBuilder<'_>) -> Result<LedgerEntry, LedgerError> {
        let prev = self.entries.last().map(|e| e.chain_head.clone());
        let entry = build(prev)?;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// JSONL log plus head record in one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    log_path: PathBuf,
    head_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    /// Open the ledger `dir/file_name`, creating the directory if needed.
    ///
    /// Opening does not touch the log or the head record; torn-tail repair
    /// and head publication happen inside the next append.
    pub fn open(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, LedgerError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| LedgerError::Write {
            path: dir.display().to_string(),
            source,
        })?;
        let storage = Self {
            log_path: dir.join(file_name),
            head_path: dir.join(HEAD_FILE_NAME),
            lock_path: dir.join(format!(".{file_name}.lock")),
        };
        tracing::debug!(log = %storage.log_path.display(), "opened ledger");
        Ok(storage)
    }

    /// Path of the JSONL log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Path of the head record.
    pub fn head_path(&self) -> &Path {
        &self.head_path
    }

    /// Read the cached head record, if one has been written.
    pub fn read_head_record(&self) -> Result<Option<HeadRecord>, LedgerError> {
        match std::fs::read(&self.head_path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    tracing::warn!(path = %self.head_path.display(), error = %e, "unreadable head record");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LedgerError::Read {
                path: self.head_path.display().to_string(),
                source,
            }),
        }
    }

    fn with_lock<R>(&self, f: impl FnOnce(&Self) -> Result<R, LedgerError>) -> Result<R, LedgerError> {
        let lock_err = |source| LedgerError::Lock {
            path: self.lock_path.display().to_string(),
            source,
        };
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(lock_err)?;
        lock_file.lock_exclusive().map_err(lock_err)?;
        let result = f(self);
        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(path = %self.lock_path.display(), error = %e, "failed to release ledger lock");
        }
        result
    }

    /// Decode the log. Must be called with the lock held.
    fn read_log(&self) -> Result<LogScan, LedgerError> {
        let bytes = match std::fs::read(&self.log_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogScan::default()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: self.log_path.display().to_string(),
                    source,
                })
            }
        };

        let mut scan = LogScan::default();
        let mut offset = 0usize;
        for (index, raw) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
            let Some(body) = raw.strip_suffix(b"\n") else {
                // Only the last chunk of `split_inclusive` can lack the newline.
                scan.torn_tail = Some(offset as u64);
                break;
            };
            offset += raw.len();
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<LedgerEntry>(body) {
                Ok(entry) => scan.entries.push(entry),
                Err(e) => {
                    scan.unreadable = Some(UnreadableRecord {
                        index: scan.entries.len(),
                        line: index + 1,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
        Ok(scan)
    }

    fn corrupt(&self, record: &UnreadableRecord) -> LedgerError {
        LedgerError::CorruptLog {
            path: self.log_path.display().to_string(),
            line: record.line,
            reason: record.reason.clone(),
        }
    }

    fn truncate_log(&self, len: u64) -> Result<(), LedgerError> {
        let write_err = |source| LedgerError::Write {
            path: self.log_path.display().to_string(),
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .open(&self.log_path)
            .map_err(write_err)?;
        file.set_len(len).map_err(write_err)?;
        file.sync_all().map_err(write_err)
    }

    fn write_head(&self, record: &HeadRecord) -> Result<(), LedgerError> {
        let tmp = self.head_path.with_extension("meta.tmp");
        let write_err = |path: &Path, source| LedgerError::Write {
            path: path.display().to_string(),
            source,
        };
        let body = serde_json::to_vec(record)?;
        let mut file = File::create(&tmp).map_err(|e| write_err(&tmp, e))?;
        file.write_all(&body).map_err(|e| write_err(&tmp, e))?;
        file.sync_all().map_err(|e| write_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.head_path).map_err(|e| write_err(&self.head_path, e))
    }

    fn append_line(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let write_err = |source| LedgerError::Write {
            path: self.log_path.display().to_string(),
            source,
        };
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(write_err)?;
        file.write_all(&line).map_err(write_err)?;
        file.sync_all().map_err(write_err)
    }
}

impl LedgerStorage for FileStorage {
    fn append_with(&mut self, build: &mut EntryBuilder<'_>) -> Result<LedgerEntry, LedgerError> {
        self.with_lock(|s| {
            let scan = s.read_log()?;
            if let Some(record) = &scan.unreadable {
                return Err(s.corrupt(record));
            }
            if let Some(len) = scan.torn_tail {
                tracing::warn!(
                    path = %s.log_path.display(),
                    offset = len,
                    "torn final ledger record, truncating before append"
                );
                s.truncate_log(len)?;
            }
            let prev = scan.entries.last().map(|e| e.chain_head.clone());
            let entry = build(prev)?;
            s.append_line(&entry)?;
            let head = HeadRecord {
                head_digest: Some(entry.chain_head.clone()),
                updated_at: entry.timestamp,
            };
            if let Err(e) = s.write_head(&head) {
                // The log line is already durable; the next append republishes the head.
                tracing::warn!(error = %e, "head record not updated after append");
            }
            Ok(entry)
        })
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let scan = self.scan()?;
        match &scan.unreadable {
            Some(record) => Err(self.corrupt(record)),
            None => Ok(scan.entries),
        }
    }

    fn scan(&self) -> Result<LogScan, LedgerError> {
        let scan = self.with_lock(|s| s.read_log())?;
        if let Some(offset) = scan.torn_tail {
            tracing::debug!(path = %self.log_path.display(), offset, "ignoring torn final fragment");
        }
        Ok(scan)
    }
}
