//! # Content Digest: SHA-256 Identifiers
//!
//! Defines `ContentDigest` and `DigestAlgorithm` used for ledger entry
//! digests, chain heads, token digests, and file fingerprints.
//!
//! ## Security Invariant
//!
//! Structured values are hashed only through [`sha256_digest()`], which
//! accepts `&CanonicalBytes`. Text concatenations with a fixed, documented
//! layout (chain heads, the policy integrity material) and raw file bytes
//! go through [`Sha256Accumulator`] or [`sha256_bytes()`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::DigestError;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

/// A 32-byte digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string into a SHA-256 digest.
    ///
    /// Accepts upper- or lowercase input and surrounding whitespace.
    pub fn from_hex(hex: &str) -> Result<Self, DigestError> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(DigestError::InvalidLength(hex.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hi = hex_nibble(chunk[0]).ok_or(DigestError::InvalidHex(i * 2))?;
            let lo = hex_nibble(chunk[1]).ok_or(DigestError::InvalidHex(i * 2 + 1))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self::new(DigestAlgorithm::Sha256, bytes))
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
///
/// The signature accepts only `&CanonicalBytes`, so no code path can digest
/// a structured value through an ad-hoc serialization.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    sha256_bytes(data.as_bytes())
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

/// Compute a SHA-256 digest over raw bytes.
///
/// Reserved for opaque inputs: file contents and attestation tokens, whose
/// bytes are the identity being fingerprinted.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let mut acc = Sha256Accumulator::new();
    acc.update(data);
    acc.finalize()
}

/// Incremental SHA-256 hasher for composite digests.
///
/// Used where a digest is defined over a concatenation with a documented
/// layout rather than over a single canonical JSON value, e.g. the chain
/// head `H(prev_head ∥ entry_digest)`.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
}

impl Sha256Accumulator {
    /// Start an empty accumulator.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feed bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consume the accumulator and produce the digest.
    pub fn finalize(self) -> ContentDigest {
        let hash = self.hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        ContentDigest::new(DigestAlgorithm::Sha256, bytes)
    }
}

impl std::fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256Accumulator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sha256_digest_deterministic() {
        let mut data = BTreeMap::new();
        data.insert("a", 1);
        data.insert("b", 2);
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(sha256_digest(&cb), sha256_digest(&cb));
    }

    #[test]
    fn test_sha256_hex_format() {
        let cb = CanonicalBytes::new(&serde_json::json!({"key": "value"})).unwrap();
        let hex = sha256_hex(&cb);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_known_sha256_vector() {
        // SHA256("{}"), cross-checked with `printf '{}' | sha256sum`.
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(
            sha256_digest(&cb).to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_empty_input_vector() {
        assert_eq!(
            sha256_bytes(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_accumulator_matches_one_shot() {
        let mut acc = Sha256Accumulator::new();
        acc.update(b"ab");
        acc.update(b"cd");
        assert_eq!(acc.finalize(), sha256_bytes(b"abcd"));
    }

    #[test]
    fn test_hex_roundtrip_and_case() {
        let d = sha256_bytes(b"payload");
        let upper = d.to_hex().to_uppercase();
        assert_eq!(ContentDigest::from_hex(&upper).unwrap(), d);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert_eq!(
            ContentDigest::from_hex("abc"),
            Err(DigestError::InvalidLength(3))
        );
        let bad = format!("{}zz", "0".repeat(62));
        assert_eq!(ContentDigest::from_hex(&bad), Err(DigestError::InvalidHex(62)));
    }
}
