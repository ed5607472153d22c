#![deny(missing_docs)]

//! # acm-core: Foundational Types for the Attested Control Mesh
//!
//! Every other crate in the workspace depends on `acm-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every digest over structured data (ledger
//!    entries, proof payloads) flows through `CanonicalBytes::new()`. No raw
//!    `serde_json::to_vec()` for digests.
//!
//! 2. **`Sha256Accumulator` for composite digests.** Chain heads and the
//!    policy integrity hash are computed over concatenated text, not JSON.
//!    Those paths use the accumulator explicitly so the exception is visible.
//!
//! 3. **UTC-only timestamps.** `Timestamp` renders `YYYY-MM-DDTHH:MM:SSZ`,
//!    the same bytes on every host.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `acm-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{
    sha256_bytes, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm, Sha256Accumulator,
};
pub use error::{CanonicalizationError, DigestError, TimestampError};
pub use temporal::Timestamp;
