//! # Attestation Tokens
//!
//! Compact three-segment tokens: `base64url(header).base64url(claims).signature`.
//! Padding is tolerated, the signature segment may be empty, and it is
//! never checked.

use acm_core::sha256_bytes;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AttestationParseError;

/// Sentinel for claims that are absent or unreadable.
pub const UNKNOWN_CLAIM: &str = "unknown";

/// Claim carrying the attestation type (`sevsnpvm`, `simulated`, ...).
pub const ATTESTATION_TYPE_CLAIM: &str = "x-ms-attestation-type";

/// Claim carrying the issuer.
pub const ISSUER_CLAIM: &str = "iss";

/// A decoded, unverified token.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationToken {
    /// Decoded header object.
    pub header: Map<String, Value>,
    /// Decoded claims object.
    pub claims: Map<String, Value>,
    /// Raw signature segment, unchecked.
    pub signature: String,
}

impl AttestationToken {
    /// Decode header and claims. Fails on any structural problem.
    pub fn parse(compact: &str) -> Result<Self, AttestationParseError> {
        let parts = split_segments(compact)?;
        Ok(Self {
            header: decode_object(parts[0], "header")?,
            claims: decode_object(parts[1], "claims")?,
            signature: parts[2].to_string(),
        })
    }

    /// Decode only the claims segment. The header may be garbage.
    pub fn decode_claims(compact: &str) -> Result<Map<String, Value>, AttestationParseError> {
        let parts = split_segments(compact)?;
        decode_object(parts[1], "claims")
    }
}

fn split_segments(compact: &str) -> Result<Vec<&str>, AttestationParseError> {
    let parts: Vec<&str> = compact.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(AttestationParseError::SegmentCount(parts.len()));
    }
    if parts[1].trim().is_empty() {
        return Err(AttestationParseError::EmptyClaims);
    }
    Ok(parts)
}

fn decode_object(
    segment: &str,
    name: &'static str,
) -> Result<Map<String, Value>, AttestationParseError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim().trim_end_matches('='))
        .map_err(|e| AttestationParseError::Base64 {
            segment: name,
            reason: e.to_string(),
        })?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AttestationParseError::Json {
            segment: name,
            reason: format!("found {}", json_kind(&other)),
        }),
        Err(e) => Err(AttestationParseError::Json {
            segment: name,
            reason: e.to_string(),
        }),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Best-effort claims. Never fails: on a parse error `claims` holds the
/// sentinel values and `parse_ok` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimsExtraction {
    /// Decoded claims, or the sentinel mapping.
    pub claims: Map<String, Value>,
    /// Whether the claims segment decoded.
    pub parse_ok: bool,
}

impl ClaimsExtraction {
    fn sentinel() -> Self {
        let mut claims = Map::new();
        claims.insert(ATTESTATION_TYPE_CLAIM.into(), Value::from(UNKNOWN_CLAIM));
        claims.insert(ISSUER_CLAIM.into(), Value::from(UNKNOWN_CLAIM));
        Self {
            claims,
            parse_ok: false,
        }
    }

    /// The asserted attestation type, or `"unknown"`.
    pub fn attestation_type(&self) -> &str {
        self.string_claim(ATTESTATION_TYPE_CLAIM)
    }

    /// The asserted issuer, or `"unknown"`.
    pub fn issuer(&self) -> &str {
        self.string_claim(ISSUER_CLAIM)
    }

    fn string_claim(&self, key: &str) -> &str {
        self.claims
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_CLAIM)
    }
}

/// Read the claims of a token without verifying anything.
pub fn extract_claims(compact: &str) -> ClaimsExtraction {
    match AttestationToken::decode_claims(compact) {
        Ok(claims) => ClaimsExtraction {
            claims,
            parse_ok: true,
        },
        Err(e) => {
            tracing::debug!(error = %e, "attestation claims unreadable, using sentinel");
            ClaimsExtraction::sentinel()
        }
    }
}

/// Digest recorded in place of the raw token.
pub fn token_digest(compact: &str) -> String {
    sha256_bytes(compact.trim().as_bytes()).to_hex()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn mint(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{body}.")
    }

    #[test]
    fn parses_unsigned_token() {
        let token = mint(&serde_json::json!({"iss": "https://maa.test", "x-ms-attestation-type": "sevsnpvm"}));
        let parsed = AttestationToken::parse(&token).unwrap();
        assert_eq!(parsed.header["alg"], "none");
        assert_eq!(parsed.claims["x-ms-attestation-type"], "sevsnpvm");
        assert_eq!(parsed.signature, "");
    }

    #[test]
    fn padded_segments_are_accepted() {
        let body = URL_SAFE_NO_PAD.encode(br#"{"iss":"x"}"#);
        let token = format!("e30=.{body}==.sig\n");
        let extraction = extract_claims(&token);
        assert!(extraction.parse_ok);
        assert_eq!(extraction.issuer(), "x");
        assert_eq!(extraction.attestation_type(), UNKNOWN_CLAIM);
    }

    #[test]
    fn wrong_segment_count_is_reported() {
        assert_eq!(
            AttestationToken::parse("a.b"),
            Err(AttestationParseError::SegmentCount(2))
        );
        assert_eq!(
            AttestationToken::parse("a.b.c.d"),
            Err(AttestationParseError::SegmentCount(4))
        );
    }

    #[test]
    fn empty_claims_segment_is_reported() {
        assert_eq!(
            AttestationToken::parse("e30..sig"),
            Err(AttestationParseError::EmptyClaims)
        );
    }

    #[test]
    fn non_object_claims_are_rejected() {
        let body = URL_SAFE_NO_PAD.encode(b"[1,2]");
        let err = AttestationToken::decode_claims(&format!("e30.{body}.")).unwrap_err();
        assert!(matches!(err, AttestationParseError::Json { segment: "claims", .. }));
    }

    #[test]
    fn garbage_header_still_yields_claims_for_the_gate() {
        let body = URL_SAFE_NO_PAD.encode(br#"{"x-ms-attestation-type":"simulated"}"#);
        let token = format!("!!!.{body}.");
        assert!(AttestationToken::parse(&token).is_err());
        assert_eq!(extract_claims(&token).attestation_type(), "simulated");
    }

    #[test]
    fn non_string_claim_reads_as_unknown() {
        let token = mint(&serde_json::json!({"x-ms-attestation-type": 7}));
        assert_eq!(extract_claims(&token).attestation_type(), UNKNOWN_CLAIM);
    }

    #[test]
    fn digest_ignores_surrounding_whitespace() {
        assert_eq!(token_digest("a.b.c\n"), token_digest("  a.b.c"));
        assert_eq!(token_digest("a.b.c").len(), 64);
    }

    proptest! {
        #[test]
        fn extraction_never_panics(input in ".{0,200}") {
            let extraction = extract_claims(&input);
            if !extraction.parse_ok {
                prop_assert_eq!(extraction.attestation_type(), UNKNOWN_CLAIM);
                prop_assert_eq!(extraction.issuer(), UNKNOWN_CLAIM);
            }
        }
    }
}
