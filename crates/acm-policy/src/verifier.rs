//! # Constraint Verifier
//!
//! Evaluates a [`Plan`] against the constraints of a [`PinnedPolicy`].
//!
//! Every predicate is evaluated and every failure is collected, so one call
//! yields the complete remediation list. Violations are emitted in the fixed
//! order of [`ViolationCode::ALL`].
//!
//! Integers (cost, latency, delay) compare as integers. SLA and stockout
//! risk compare as reals with no rounding; messages render them rounded.

use serde::{Deserialize, Serialize};

use crate::document::{Constraints, PolicyDocument};
use crate::error::PolicyError;
use crate::lock::{PinnedPolicy, PolicyLock};
use crate::plan::Plan;

/// Region code that never counts as egress.
pub const EU_REGION: &str = "EU";

/// Named constraint predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// `cost_usd <= budget_cap_usd`.
    BudgetCapUsd,
    /// `sla_pct >= min_sla_percent`.
    MinSlaPercent,
    /// `latency_ms <= max_latency_ms`.
    MaxLatencyMs,
    /// `region` is an allowed jurisdiction.
    JurisdictionNotAllowed,
    /// Region is EU, or non-EU egress is allowed.
    NonEuEgressNotAllowed,
    /// `endpoint` is a permitted endpoint.
    EndpointNotPermitted,
    /// `stockout_risk <= max_stockout_risk`.
    MaxStockoutRisk,
    /// `delay_minutes <= max_delay_minutes`.
    MaxDelayMinutes,
}

impl ViolationCode {
    /// All codes in reporting order.
    pub const ALL: [ViolationCode; 8] = [
        Self::BudgetCapUsd,
        Self::MinSlaPercent,
        Self::MaxLatencyMs,
        Self::JurisdictionNotAllowed,
        Self::NonEuEgressNotAllowed,
        Self::EndpointNotPermitted,
        Self::MaxStockoutRisk,
        Self::MaxDelayMinutes,
    ];

    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetCapUsd => "budget_cap_usd",
            Self::MinSlaPercent => "min_sla_percent",
            Self::MaxLatencyMs => "max_latency_ms",
            Self::JurisdictionNotAllowed => "jurisdiction_not_allowed",
            Self::NonEuEgressNotAllowed => "non_eu_egress_not_allowed",
            Self::EndpointNotPermitted => "endpoint_not_permitted",
            Self::MaxStockoutRisk => "max_stockout_risk",
            Self::MaxDelayMinutes => "max_delay_minutes",
        }
    }

    /// Dotted path of the policy field the predicate reads.
    pub fn policy_path(&self) -> &'static str {
        match self {
            Self::BudgetCapUsd => "constraints.budget_cap_usd",
            Self::MinSlaPercent => "constraints.min_sla_percent",
            Self::MaxLatencyMs => "constraints.max_latency_ms",
            Self::JurisdictionNotAllowed => "constraints.allowed_jurisdictions",
            Self::NonEuEgressNotAllowed => "constraints.data_egress_rules.non_eu_egress_allowed",
            Self::EndpointNotPermitted => "constraints.data_egress_rules.permitted_endpoints",
            Self::MaxStockoutRisk => "constraints.risk_thresholds.max_stockout_risk",
            Self::MaxDelayMinutes => "constraints.risk_thresholds.max_delay_minutes",
        }
    }

    /// Evaluate this predicate. `None` when satisfied, otherwise the message.
    fn check(&self, plan: &Plan, c: &Constraints) -> Option<String> {
        match self {
            Self::BudgetCapUsd => (plan.cost_usd > c.budget_cap_usd).then(|| {
                format!("Cost {} exceeds cap {}", plan.cost_usd, c.budget_cap_usd)
            }),
            Self::MinSlaPercent => (plan.sla_pct < f64::from(c.min_sla_percent)).then(|| {
                format!(
                    "SLA {}% below minimum {}%",
                    display_real(plan.sla_pct),
                    c.min_sla_percent
                )
            }),
            Self::MaxLatencyMs => (plan.latency_ms > c.max_latency_ms).then(|| {
                format!(
                    "Latency {}ms exceeds max {}ms",
                    plan.latency_ms, c.max_latency_ms
                )
            }),
            Self::JurisdictionNotAllowed => (!c.allowed_jurisdictions.contains(&plan.region))
                .then(|| {
                    format!(
                        "Region {} not in {}",
                        plan.region,
                        display_list(&c.allowed_jurisdictions)
                    )
                }),
            Self::NonEuEgressNotAllowed => {
                (plan.region != EU_REGION && !c.data_egress_rules.non_eu_egress_allowed).then(|| {
                    format!(
                        "Non-EU egress not allowed while region is {}",
                        plan.region
                    )
                })
            }
            Self::EndpointNotPermitted => (!c
                .data_egress_rules
                .permitted_endpoints
                .contains(&plan.endpoint))
            .then(|| {
                format!(
                    "Endpoint {} not permitted; allowed {}",
                    plan.endpoint,
                    display_list(&c.data_egress_rules.permitted_endpoints)
                )
            }),
            Self::MaxStockoutRisk => {
                (plan.stockout_risk > c.risk_thresholds.max_stockout_risk).then(|| {
                    format!(
                        "Stockout risk {} exceeds max {}",
                        display_real(plan.stockout_risk),
                        display_real(c.risk_thresholds.max_stockout_risk)
                    )
                })
            }
            Self::MaxDelayMinutes => {
                (plan.delay_minutes > c.risk_thresholds.max_delay_minutes).then(|| {
                    format!(
                        "Delay {}min exceeds max {}min",
                        plan.delay_minutes, c.risk_thresholds.max_delay_minutes
                    )
                })
            }
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Which predicate failed.
    pub code: ViolationCode,
    /// Policy field it was checked against.
    pub policy_path: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Verdict outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    /// No violations.
    Pass,
    /// At least one violation.
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// Result of verifying one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// PASS iff `violations` is empty.
    pub status: VerdictStatus,
    /// Failed predicates in [`ViolationCode::ALL`] order.
    pub violations: Vec<Violation>,
    /// Policy hash the verdict was computed under.
    pub policy_sha256: String,
}

impl Verdict {
    /// Whether the plan passed.
    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    /// Codes of the failed predicates, in order.
    pub fn codes(&self) -> Vec<ViolationCode> {
        self.violations.iter().map(|v| v.code).collect()
    }
}

/// Verify a plan against a pinned policy. Total and side-effect free.
pub fn verify(plan: &Plan, policy: &PinnedPolicy) -> Verdict {
    let constraints = &policy.document().constraints;
    let violations: Vec<Violation> = ViolationCode::ALL
        .iter()
        .filter_map(|code| {
            code.check(plan, constraints).map(|message| Violation {
                code: *code,
                policy_path: code.policy_path().to_string(),
                message,
            })
        })
        .collect();
    let status = if violations.is_empty() {
        VerdictStatus::Pass
    } else {
        VerdictStatus::Fail
    };
    Verdict {
        status,
        violations,
        policy_sha256: policy.policy_sha256().to_string(),
    }
}

/// Pin `doc` against `lock`, then verify.
///
/// # Errors
///
/// [`PolicyError::HashMismatch`] before any predicate runs when the lock
/// disagrees with the document.
pub fn verify_pinned(
    plan: &Plan,
    doc: &PolicyDocument,
    lock: Option<&PolicyLock>,
) -> Result<Verdict, PolicyError> {
    let pinned = PinnedPolicy::pin(doc.clone(), lock)?;
    Ok(verify(plan, &pinned))
}

/// Real number rounded to four places for messages, trailing zeros trimmed.
fn display_real(x: f64) -> String {
    let s = format!("{:.4}", x);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn display_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}
