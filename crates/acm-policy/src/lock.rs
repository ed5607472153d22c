//! # Policy Lock
//!
//! Hash pinning: `policies/policy.lock` holds a single line
//! `policy_sha256: <hex>` agreed when the policy was last reviewed. Before
//! any plan is verified the live document's integrity hash is recomputed
//! and compared against it.
//!
//! | Lock state          | Outcome                                        |
//! |---------------------|------------------------------------------------|
//! | file absent / empty | `ABSENT`, proceed with the recomputed hash     |
//! | hashes equal        | `OK`                                           |
//! | hashes differ       | `MISMATCH`, a hard refusal distinct from FAIL  |

use std::path::Path;

use acm_core::ContentDigest;
use serde::Serialize;

use crate::document::PolicyDocument;
use crate::error::PolicyError;
use crate::integrity::compute_integrity_hash;

const LOCK_KEY: &str = "policy_sha256";

/// The pinned policy hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyLock {
    /// Lowercase hex SHA-256 of the integrity material.
    pub policy_sha256: String,
}

impl PolicyLock {
    /// Pin a hash value.
    pub fn new(policy_sha256: impl Into<String>) -> Self {
        Self {
            policy_sha256: policy_sha256.into().trim().to_lowercase(),
        }
    }

    /// Parse lock file text.
    ///
    /// Returns `Ok(None)` for an empty file or an empty value. A value that
    /// is not 64 hex digits is a `LockFormat` error.
    pub fn parse(text: &str, path: &Path) -> Result<Option<Self>, PolicyError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let (key, value) = text.split_once(':').ok_or_else(|| PolicyError::LockFormat {
            path: path.display().to_string(),
            reason: "expected `policy_sha256: <hex>`".into(),
        })?;
        if key.trim() != LOCK_KEY {
            return Err(PolicyError::LockFormat {
                path: path.display().to_string(),
                reason: format!("unexpected key {:?}", key.trim()),
            });
        }
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let digest = ContentDigest::from_hex(value).map_err(|e| PolicyError::LockFormat {
            path: path.display().to_string(),
            reason: format!("policy_sha256 is not a SHA-256 hex digest: {e}"),
        })?;
        Ok(Some(Self::new(digest.to_hex())))
    }

    /// Render the single lock line, newline-terminated.
    pub fn render(&self) -> String {
        format!("{LOCK_KEY}: {}\n", self.policy_sha256)
    }
}

/// Read the lock file. A missing file is `Ok(None)`.
pub fn read_lock(path: &Path) -> Result<Option<PolicyLock>, PolicyError> {
    match std::fs::read_to_string(path) {
        Ok(text) => PolicyLock::parse(&text, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PolicyError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write (or overwrite) the lock file with a new pin.
pub fn write_lock(path: &Path, lock: &PolicyLock) -> Result<(), PolicyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| PolicyError::LockWrite {
            path: path.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, lock.render()).map_err(|source| PolicyError::LockWrite {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), policy_sha256 = %lock.policy_sha256, "wrote policy lock");
    Ok(())
}

/// Outcome of comparing a live document against its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    /// Lock present and equal.
    Ok,
    /// Lock present and different.
    Mismatch,
    /// No lock to compare against.
    Absent,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Mismatch => "MISMATCH",
            Self::Absent => "ABSENT",
        })
    }
}

/// Full lock comparison result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockResult {
    /// Comparison outcome.
    pub status: LockStatus,
    /// Hash of the live document.
    pub recomputed: String,
    /// Hash from the lock file, if any.
    pub locked: Option<String>,
}

/// Compare a document's recomputed hash against an optional lock.
pub fn check_lock(doc: &PolicyDocument, lock: Option<&PolicyLock>) -> Result<LockResult, PolicyError> {
    let recomputed = compute_integrity_hash(doc)?;
    let status = match lock {
        None => LockStatus::Absent,
        Some(l) if l.policy_sha256 == recomputed => LockStatus::Ok,
        Some(_) => LockStatus::Mismatch,
    };
    Ok(LockResult {
        status,
        recomputed,
        locked: lock.map(|l| l.policy_sha256.clone()),
    })
}

/// A policy document whose hash precondition has been checked.
///
/// The only way to build one is [`PinnedPolicy::pin`], so holding a
/// `PinnedPolicy` proves the live document matches its lock (or that no
/// lock exists).
#[derive(Debug, Clone)]
pub struct PinnedPolicy {
    document: PolicyDocument,
    policy_sha256: String,
    lock_status: LockStatus,
}

impl PinnedPolicy {
    /// Check the lock and pin the document.
    ///
    /// # Errors
    ///
    /// [`PolicyError::HashMismatch`] when the lock disagrees with the live
    /// document; [`PolicyError::PathResolution`] when `hash_include` is broken.
    pub fn pin(document: PolicyDocument, lock: Option<&PolicyLock>) -> Result<Self, PolicyError> {
        let result = check_lock(&document, lock)?;
        match result.status {
            LockStatus::Mismatch => {
                let locked = result.locked.unwrap_or_default();
                tracing::warn!(
                    recomputed = %result.recomputed,
                    locked = %locked,
                    "policy hash mismatch, refusing verification"
                );
                Err(PolicyError::HashMismatch {
                    recomputed: result.recomputed,
                    locked,
                })
            }
            LockStatus::Absent => {
                tracing::info!(recomputed = %result.recomputed, "no policy lock, using recomputed hash");
                Ok(Self {
                    document,
                    policy_sha256: result.recomputed,
                    lock_status: LockStatus::Absent,
                })
            }
            LockStatus::Ok => Ok(Self {
                document,
                policy_sha256: result.locked.unwrap_or(result.recomputed),
                lock_status: LockStatus::Ok,
            }),
        }
    }

    /// The checked document.
    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    /// The hash verdicts are stamped with.
    pub fn policy_sha256(&self) -> &str {
        &self.policy_sha256
    }

    /// Whether a lock backed this pin.
    pub fn lock_status(&self) -> LockStatus {
        self.lock_status
    }
}
