//! # acm-policy: Policy Store and Constraint Verifier
//!
//! Turns a proposed [`Plan`] into a PASS/FAIL [`Verdict`] against a policy
//! document whose integrity is pinned by a lock file.
//!
//! ## Pipeline
//!
//! ```text
//! base.yaml ──load()──▶ PolicyDocument ──pin(lock)──▶ PinnedPolicy ──verify(plan)──▶ Verdict
//!                           │                            │
//!                 validate_structure()          HashMismatch (terminal,
//!                 (all issues at once)           never a FAIL verdict)
//! ```
//!
//! ## Crate Policy
//!
//! - Structural problems are errors ([`PolicyError::Load`]); constraint
//!   failures are values ([`VerdictStatus::Fail`]).
//! - Verification is a pure function of `(plan, pinned policy)`.
//! - Violations are reported in the fixed order of [`ViolationCode::ALL`].

pub mod document;
pub mod error;
pub mod integrity;
pub mod lock;
pub mod plan;
pub mod verifier;

pub use document::{validate_structure, Constraints, EgressRules, PolicyDocument, RiskThresholds};
pub use error::{PolicyError, StructureIssue};
pub use integrity::{compute_integrity_hash, resolve_path};
pub use lock::{check_lock, read_lock, write_lock, LockResult, LockStatus, PinnedPolicy, PolicyLock};
pub use plan::Plan;
pub use verifier::{verify, verify_pinned, Verdict, VerdictStatus, Violation, ViolationCode};
