//! Candidate plans submitted for verification.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Plan id reported when a plan carries none.
pub const UNKNOWN_PLAN_ID: &str = "unknown";

/// A proposed action, immutable once submitted.
///
/// Integer-valued fields accept JSON numbers written with a zero fraction
/// (`500.0`) since plan files are often produced by tools that emit every
/// number as a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan identifier. `plan_id` is accepted as an alias.
    #[serde(default, alias = "plan_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Total cost in whole USD.
    #[serde(deserialize_with = "whole_number")]
    pub cost_usd: u64,
    /// Expected SLA percentage. `sla_expected_percent` is accepted as an alias.
    #[serde(alias = "sla_expected_percent")]
    pub sla_pct: f64,
    /// Expected latency in milliseconds.
    #[serde(deserialize_with = "whole_number")]
    pub latency_ms: u64,
    /// Region code the plan runs in.
    pub region: String,
    /// Endpoint class the plan targets.
    pub endpoint: String,
    /// Stockout probability, 0..=1.
    pub stockout_risk: f64,
    /// Expected delay in minutes.
    #[serde(deserialize_with = "whole_number")]
    pub delay_minutes: u64,
    /// Free-form strategy label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Simulator inputs. Not inspected by the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    /// Simulator KPI expectations. Not inspected by the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_expectations: Option<Value>,
}

impl Plan {
    /// The plan id, or `"unknown"`.
    pub fn plan_id(&self) -> &str {
        self.id.as_deref().unwrap_or(UNKNOWN_PLAN_ID)
    }
}

fn whole_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let n = serde_json::Number::deserialize(deserializer)?;
    if let Some(v) = n.as_u64() {
        return Ok(v);
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(D::Error::custom(format!(
            "expected a non-negative whole number, got {n}"
        ))),
    }
}
