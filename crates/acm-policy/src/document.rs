//! # Policy Document
//!
//! Loads `policies/base.yaml` into an immutable [`PolicyDocument`].
//!
//! Structure checks run over the raw JSON tree before any typed
//! deserialization and never stop at the first problem: a policy author
//! gets the complete list of missing or mistyped fields in one pass.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PolicyError, StructureIssue};
use crate::integrity::render_value;

const REQUIRED_TOP_LEVEL: [&str; 4] = ["version", "description", "constraints", "hash_include"];

const REQUIRED_CONSTRAINT_KEYS: [&str; 7] = [
    "budget_cap_usd",
    "allowed_jurisdictions",
    "pii_handling",
    "min_sla_percent",
    "max_latency_ms",
    "data_egress_rules",
    "risk_thresholds",
];

const REQUIRED_EGRESS_KEYS: [&str; 2] = ["non_eu_egress_allowed", "permitted_endpoints"];

const REQUIRED_RISK_KEYS: [&str; 2] = ["max_stockout_risk", "max_delay_minutes"];

/// The constraint block of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum plan cost in whole USD.
    pub budget_cap_usd: u64,
    /// Region codes a plan may run in. Document order is kept for messages.
    pub allowed_jurisdictions: Vec<String>,
    /// PII handling mode (free-form label, e.g. `masked`).
    pub pii_handling: String,
    /// Minimum SLA, 0..=100.
    pub min_sla_percent: u8,
    /// Maximum latency in milliseconds, strictly positive.
    pub max_latency_ms: u64,
    /// Data egress rules.
    pub data_egress_rules: EgressRules,
    /// Risk thresholds.
    pub risk_thresholds: RiskThresholds,
}

/// Where plan data may flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRules {
    /// Whether a non-EU region may receive data.
    pub non_eu_egress_allowed: bool,
    /// Endpoint classes a plan may target.
    pub permitted_endpoints: Vec<String>,
}

/// Operational risk ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Maximum stockout probability, 0..=1.
    pub max_stockout_risk: f64,
    /// Maximum delay in minutes.
    pub max_delay_minutes: u64,
}

/// An immutable, structurally valid policy snapshot.
///
/// Keeps the raw JSON tree alongside the typed view: `hash_include` paths
/// address the document as written, including fields the typed view does
/// not model.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    /// Policy version label, rendered as text.
    pub version: String,
    /// Human description.
    pub description: String,
    /// Typed constraint block.
    pub constraints: Constraints,
    /// Ordered dotted paths folded into the integrity hash.
    pub hash_include: Vec<String>,
    raw: Value,
}

impl PolicyDocument {
    /// Load and validate a policy file (YAML or JSON).
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let doc = Self::from_yaml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            version = %doc.version,
            hash_fields = doc.hash_include.len(),
            "loaded policy document"
        );
        Ok(doc)
    }

    /// Parse and validate policy text. JSON is accepted as a YAML subset.
    pub fn from_yaml_str(text: &str) -> Result<Self, PolicyError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate a JSON tree and build the typed document.
    pub fn from_value(value: Value) -> Result<Self, PolicyError> {
        let issues = validate_structure(&value);
        if !issues.is_empty() {
            return Err(PolicyError::Load { issues });
        }

        let constraints: Constraints = serde_json::from_value(value["constraints"].clone())
            .map_err(|e| PolicyError::Load {
                issues: vec![StructureIssue::new("constraints", e.to_string())],
            })?;
        let hash_include: Vec<String> = serde_json::from_value(value["hash_include"].clone())
            .map_err(|e| PolicyError::Load {
                issues: vec![StructureIssue::new("hash_include", e.to_string())],
            })?;

        Ok(Self {
            version: render_value(&value["version"]),
            description: render_value(&value["description"]),
            constraints,
            hash_include,
            raw: value,
        })
    }

    /// The document as parsed, for dotted-path lookups.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Check a policy tree against the required shape.
///
/// Returns every issue found; an empty vector means the document is valid.
/// A missing parent suppresses checks on its children, since they cannot
/// be present.
pub fn validate_structure(doc: &Value) -> Vec<StructureIssue> {
    let mut issues = Vec::new();

    let Some(top) = doc.as_object() else {
        issues.push(StructureIssue::new("$", "top-level document must be a mapping"));
        return issues;
    };

    for key in REQUIRED_TOP_LEVEL {
        if !top.contains_key(key) {
            issues.push(StructureIssue::new(key, "missing required key"));
        }
    }

    if let Some(hi) = top.get("hash_include") {
        if !is_string_list(hi) {
            issues.push(StructureIssue::new(
                "hash_include",
                "must be a list of string paths",
            ));
        }
    }

    let Some(constraints) = top.get("constraints") else {
        return issues;
    };
    let Some(c) = constraints.as_object() else {
        issues.push(StructureIssue::new("constraints", "must be a mapping"));
        return issues;
    };

    for key in REQUIRED_CONSTRAINT_KEYS {
        if !c.contains_key(key) {
            issues.push(StructureIssue::new(
                format!("constraints.{key}"),
                "missing required key",
            ));
        }
    }

    if let Some(v) = c.get("budget_cap_usd") {
        if v.as_u64().is_none() {
            issues.push(StructureIssue::new(
                "constraints.budget_cap_usd",
                "must be a non-negative integer",
            ));
        }
    }
    if let Some(v) = c.get("allowed_jurisdictions") {
        if !is_string_list(v) {
            issues.push(StructureIssue::new(
                "constraints.allowed_jurisdictions",
                "must be a list of strings",
            ));
        }
    }
    if let Some(v) = c.get("pii_handling") {
        if !v.is_string() {
            issues.push(StructureIssue::new(
                "constraints.pii_handling",
                "must be a string",
            ));
        }
    }
    if let Some(v) = c.get("min_sla_percent") {
        if !v.as_u64().is_some_and(|n| n <= 100) {
            issues.push(StructureIssue::new(
                "constraints.min_sla_percent",
                "must be an integer between 0 and 100",
            ));
        }
    }
    if let Some(v) = c.get("max_latency_ms") {
        if !v.as_u64().is_some_and(|n| n > 0) {
            issues.push(StructureIssue::new(
                "constraints.max_latency_ms",
                "must be a positive integer",
            ));
        }
    }

    if let Some(egress) = c.get("data_egress_rules") {
        match egress.as_object() {
            None => issues.push(StructureIssue::new(
                "constraints.data_egress_rules",
                "must be a mapping",
            )),
            Some(e) => {
                for key in REQUIRED_EGRESS_KEYS {
                    if !e.contains_key(key) {
                        issues.push(StructureIssue::new(
                            format!("constraints.data_egress_rules.{key}"),
                            "missing required key",
                        ));
                    }
                }
                if e.get("non_eu_egress_allowed").is_some_and(|v| !v.is_boolean()) {
                    issues.push(StructureIssue::new(
                        "constraints.data_egress_rules.non_eu_egress_allowed",
                        "must be a boolean",
                    ));
                }
                if e.get("permitted_endpoints").is_some_and(|v| !is_string_list(v)) {
                    issues.push(StructureIssue::new(
                        "constraints.data_egress_rules.permitted_endpoints",
                        "must be a list of strings",
                    ));
                }
            }
        }
    }

    if let Some(risk) = c.get("risk_thresholds") {
        match risk.as_object() {
            None => issues.push(StructureIssue::new(
                "constraints.risk_thresholds",
                "must be a mapping",
            )),
            Some(r) => {
                for key in REQUIRED_RISK_KEYS {
                    if !r.contains_key(key) {
                        issues.push(StructureIssue::new(
                            format!("constraints.risk_thresholds.{key}"),
                            "missing required key",
                        ));
                    }
                }
                if let Some(v) = r.get("max_stockout_risk") {
                    if !v.as_f64().is_some_and(|x| (0.0..=1.0).contains(&x)) {
                        issues.push(StructureIssue::new(
                            "constraints.risk_thresholds.max_stockout_risk",
                            "must be a number between 0 and 1",
                        ));
                    }
                }
                if let Some(v) = r.get("max_delay_minutes") {
                    if v.as_u64().is_none() {
                        issues.push(StructureIssue::new(
                            "constraints.risk_thresholds.max_delay_minutes",
                            "must be a non-negative integer",
                        ));
                    }
                }
            }
        }
    }

    issues
}

fn is_string_list(v: &Value) -> bool {
    v.as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}
