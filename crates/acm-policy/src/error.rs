//! # Policy Error Types
//!
//! Structural and integrity failures. These are fatal for the verification
//! they belong to and are surfaced to the caller immediately. A plan that
//! breaks a constraint is not an error; see [`crate::Verdict`].

use serde::Serialize;
use thiserror::Error;

/// A single structural problem found while validating a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureIssue {
    /// Dotted path of the offending field (`constraints.max_latency_ms`).
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl StructureIssue {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors from loading, hashing, or pinning a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The policy source could not be read.
    #[error("failed to read policy {path}: {source}")]
    Read {
        /// File that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The policy source is not parseable YAML/JSON.
    #[error("policy is not parseable: {0}")]
    Parse(String),

    /// The policy parsed but is structurally invalid. Carries every issue found.
    #[error("policy is structurally invalid ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
    Load {
        /// All structural issues, in document order.
        issues: Vec<StructureIssue>,
    },

    /// A `hash_include` path does not resolve in the document.
    #[error("hash_include path {path:?} does not resolve: missing segment {segment:?}")]
    PathResolution {
        /// The dotted path that failed.
        path: String,
        /// The first segment that was absent.
        segment: String,
    },

    /// The live document no longer matches the pinned hash.
    #[error("policy hash mismatch: recomputed {recomputed}, locked {locked}")]
    HashMismatch {
        /// Hash of the live document.
        recomputed: String,
        /// Hash recorded in the lock file.
        locked: String,
    },

    /// The lock file exists but is not a `policy_sha256: <hex>` line.
    #[error("malformed policy lock {path}: {reason}")]
    LockFormat {
        /// Lock file path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Writing the lock file failed.
    #[error("failed to write policy lock {path}: {source}")]
    LockWrite {
        /// Lock file path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

fn join_issues(issues: &[StructureIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_lists_every_issue() {
        let err = PolicyError::Load {
            issues: vec![
                StructureIssue::new("version", "missing"),
                StructureIssue::new("constraints.budget_cap_usd", "must be a non-negative integer"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("version: missing"));
        assert!(msg.contains("constraints.budget_cap_usd"));
    }

    #[test]
    fn hash_mismatch_display_names_both_hashes() {
        let err = PolicyError::HashMismatch {
            recomputed: "aa".into(),
            locked: "bb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("recomputed aa"));
        assert!(msg.contains("locked bb"));
    }
}
