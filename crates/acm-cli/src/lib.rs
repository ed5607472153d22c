//! # acm-cli: Attested Control Mesh Command-Line Interface
//!
//! Boundary tools over the policy verifier, the audit ledger and the
//! attestation gate.
//!
//! ## Subcommands
//!
//! - `policy validate|hash|lock`: structure check, integrity hash, lock pinning
//! - `verify`: PASS/FAIL verdict for a plan, optionally recorded
//! - `get-secret`: attestation-gated secret release
//! - `token inspect`: unverified claim inspection
//! - `proof`: decision proof entry for a plan bundle
//! - `lineage`: lineage record for a verified plan
//! - `runbook`: gate call under bounded retry
//! - `ledger head|verify`: chain head and replay audit
//!
//! ## Crate Policy
//!
//! - Every invocation writes exactly one JSON line to stdout, including on
//!   failure. Diagnostics go to stderr through `tracing`.
//! - Handlers return the process exit code; business outcomes (FAIL, DENIED)
//!   are exit codes, not errors.
//! - No business logic here: handlers delegate to the domain crates.

pub mod config;
pub mod get_secret;
pub mod ledger;
pub mod lineage;
pub mod output;
pub mod policy;
pub mod proof;
pub mod runbook;
pub mod token;
pub mod verify;
