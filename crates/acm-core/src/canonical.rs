//! # Canonical Serialization: JCS Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in structured digest computation (ledger entry digests, proof
//! payload digests).
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()` or
//! `CanonicalBytes::from_value()`, both of which render RFC 8785 (JSON
//! Canonicalization Scheme) output: sorted keys, compact separators, and the
//! ECMAScript number form for non-integers.
//!
//! An auditor replaying the ledger in another language recomputes an entry
//! digest with any RFC 8785 implementation and gets the same bytes.
//!
//! ## Numbers
//!
//! Ledger payloads carry risk scores (`stockout_risk: 0.05`), so finite
//! floats are accepted. JCS pins their textual form, which removes the
//! representation drift that native `to_string` rendering would introduce.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - Object keys are sorted by UTF-16 code units (RFC 8785 §3.2.3).
/// - No insignificant whitespace.
/// - Numbers use the ECMAScript shortest round-trip form.
///
/// These invariants are enforced by the constructors and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-built JSON tree.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View the canonical bytes as UTF-8 text.
    ///
    /// JCS output is always valid UTF-8, so this never fails for values
    /// built through the constructors.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
