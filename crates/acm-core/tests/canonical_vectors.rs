//! # Canonical Byte Vectors
//!
//! Fixed JSON inputs and their RFC 8785 renderings. An external auditor
//! replaying the ledger relies on these exact bytes to recompute entry
//! digests, so any change here is a ledger format break.

use acm_core::{sha256_digest, CanonicalBytes};

const VECTORS: &[(&str, &str)] = &[
    (r#"{"b":2,"a":1,"c":"hello"}"#, r#"{"a":1,"b":2,"c":"hello"}"#),
    (r#"{"z":26,"a":1}"#, r#"{"a":1,"z":26}"#),
    (r#"{}"#, r#"{}"#),
    (r#"[]"#, r#"[]"#),
    (
        r#"{"nested":{"z":1,"a":2},"top":true}"#,
        r#"{"nested":{"a":2,"z":1},"top":true}"#,
    ),
    (
        r#"{"n":null,"b":false,"t":true,"i":42,"s":"text"}"#,
        r#"{"b":false,"i":42,"n":null,"s":"text","t":true}"#,
    ),
    (r#"{"risk":0.10,"sla":99.50}"#, r#"{"risk":0.1,"sla":99.5}"#),
    (r#"{"big":999999999999}"#, r#"{"big":999999999999}"#),
    (r#"{"neg":-42}"#, r#"{"neg":-42}"#),
    (r#"{"empty":""}"#, r#"{"empty":""}"#),
];

#[test]
fn canonical_bytes_match_expected_vectors() {
    for (input, expected) in VECTORS {
        let value: serde_json::Value = serde_json::from_str(input).unwrap();
        let cb = CanonicalBytes::new(&value).unwrap();
        assert_eq!(cb.as_str(), *expected, "canonical mismatch for input: {input}");
    }
}

#[test]
fn reordered_input_produces_identical_digest() {
    for (input, expected) in VECTORS {
        let from_input: serde_json::Value = serde_json::from_str(input).unwrap();
        let from_expected: serde_json::Value = serde_json::from_str(expected).unwrap();
        let a = sha256_digest(&CanonicalBytes::new(&from_input).unwrap());
        let b = sha256_digest(&CanonicalBytes::new(&from_expected).unwrap());
        assert_eq!(a, b, "digest drift for input: {input}");
    }
}
