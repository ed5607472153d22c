//! # Policy Integrity Hash
//!
//! Computes the pinned hash of a policy over the fields listed in its own
//! `hash_include`:
//!
//! ```text
//! material = join("\n", [ "<path>=<render(value at path)>" for path in hash_include ])
//! policy_sha256 = hex(SHA256(utf8(material)))
//! ```
//!
//! `render` is language-neutral: strings are emitted verbatim, every other
//! value (numbers, booleans, null, lists, mappings) is emitted as its
//! RFC 8785 canonical JSON text. Only referenced fields contribute, so
//! reordering or editing unrelated keys leaves the hash unchanged.

use acm_core::{CanonicalBytes, Sha256Accumulator};
use serde_json::Value;

use crate::document::PolicyDocument;
use crate::error::PolicyError;

/// Resolve a dotted path (`constraints.risk_thresholds.max_delay_minutes`)
/// against a JSON tree. Only mapping keys are traversed.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PolicyError> {
    let mut cur = root;
    for segment in path.split('.') {
        cur = cur
            .as_object()
            .and_then(|m| m.get(segment))
            .ok_or_else(|| PolicyError::PathResolution {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
    }
    Ok(cur)
}

/// Stable text form of a policy value.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => CanonicalBytes::from_value(other.clone())
            .map(|cb| cb.as_str().to_string())
            .unwrap_or_else(|_| other.to_string()),
    }
}

/// The newline-joined `path=value` lines that feed the hash.
pub fn integrity_material(doc: &PolicyDocument) -> Result<String, PolicyError> {
    let lines = doc
        .hash_include
        .iter()
        .map(|path| resolve_path(doc.raw(), path).map(|v| format!("{path}={}", render_value(v))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Compute the policy integrity hash as lowercase hex.
pub fn compute_integrity_hash(doc: &PolicyDocument) -> Result<String, PolicyError> {
    let material = integrity_material(doc)?;
    let mut acc = Sha256Accumulator::new();
    acc.update(material.as_bytes());
    Ok(acc.finalize().to_hex())
}
