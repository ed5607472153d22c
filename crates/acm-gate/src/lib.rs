//! # acm-gate: Attestation-Gated Secret Release
//!
//! Releases a named secret only when a presented attestation token carries
//! claims that satisfy the [`GatePolicy`]. Each request walks
//!
//! ```text
//! RECEIVED ──decode──▶ PARSED ──policy──▶ EVALUATED ──store──▶ RELEASED
//!     │                   │                   │
//!     └───────────────────┴───────────────────┴──────────────▶ DENIED
//! ```
//!
//! Business outcomes are values: a malformed token, a wrong attestation
//! type, or a missing secret all yield [`ReleaseDecision::Denied`]. Only
//! collaborator failures (secret store, ledger) are [`GateError`]s.
//!
//! ## Trust Boundary
//!
//! Token signatures are **not** verified. Claims are read from the unsigned
//! payload segment and the attestation type recorded in the ledger is the
//! one the token asserts. Any caller able to mint a token with the right
//! claim passes the gate. This must be closed with real signature and
//! issuer-key verification before the gate protects production secrets.

pub mod error;
pub mod gate;
pub mod retry;
pub mod store;
pub mod token;

pub use error::{AttestationParseError, GateError, SecretStoreError};
pub use gate::{AttestationGate, DenialReason, GatePolicy, GateState, ReleaseDecision};
pub use retry::{RetryOutcome, RetryPolicy, RetryingClient, Sleeper, ThreadSleeper};
pub use store::{EnvSecretStore, SecretStore, SecretValue, StaticSecretStore};
pub use token::{extract_claims, token_digest, AttestationToken, ClaimsExtraction, UNKNOWN_CLAIM};
