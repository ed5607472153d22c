//! End-to-end policy pipeline: load from disk, pin, verify.

use acm_policy::{
    compute_integrity_hash, read_lock, verify, verify_pinned, write_lock, LockStatus,
    PinnedPolicy, Plan, PolicyDocument, PolicyError, PolicyLock, VerdictStatus, ViolationCode,
};
use proptest::prelude::*;

const BASE_YAML: &str = r#"
version: "2025.1"
description: Mitigation guardrails
constraints:
  budget_cap_usd: 1000
  allowed_jurisdictions: ["EU"]
  pii_handling: masked
  min_sla_percent: 95
  max_latency_ms: 200
  data_egress_rules:
    non_eu_egress_allowed: false
    permitted_endpoints: ["private"]
  risk_thresholds:
    max_stockout_risk: 0.1
    max_delay_minutes: 30
hash_include:
  - version
  - constraints.budget_cap_usd
  - constraints.allowed_jurisdictions
  - constraints.min_sla_percent
  - constraints.max_latency_ms
  - constraints.data_egress_rules
  - constraints.risk_thresholds
"#;

fn example_plan() -> Plan {
    serde_json::from_str(
        r#"{"id":"P-42","cost_usd":500,"sla_pct":99,"latency_ms":100,"region":"EU",
            "endpoint":"private","stockout_risk":0.05,"delay_minutes":10}"#,
    )
    .unwrap()
}

fn doc() -> PolicyDocument {
    PolicyDocument::from_yaml_str(BASE_YAML).unwrap()
}

#[test]
fn example_plan_passes() {
    let pinned = PinnedPolicy::pin(doc(), None).unwrap();
    let verdict = verify(&example_plan(), &pinned);
    assert_eq!(verdict.status, VerdictStatus::Pass);
    assert!(verdict.violations.is_empty());
}

#[test]
fn example_plan_over_budget_fails_with_budget_only() {
    let mut plan = example_plan();
    plan.cost_usd = 5000;
    let verdict = verify(&plan, &PinnedPolicy::pin(doc(), None).unwrap());
    assert_eq!(verdict.status, VerdictStatus::Fail);
    assert_eq!(verdict.codes(), vec![ViolationCode::BudgetCapUsd]);
}

#[test]
fn lock_round_trip_through_disk_pins_the_verdict_hash() {
    let dir = tempfile::tempdir().unwrap();
    let policy_path = dir.path().join("base.yaml");
    let lock_path = dir.path().join("policy.lock");
    std::fs::write(&policy_path, BASE_YAML).unwrap();

    let loaded = PolicyDocument::load(&policy_path).unwrap();
    let hash = compute_integrity_hash(&loaded).unwrap();
    write_lock(&lock_path, &PolicyLock::new(hash.clone())).unwrap();

    let lock = read_lock(&lock_path).unwrap();
    let pinned = PinnedPolicy::pin(loaded, lock.as_ref()).unwrap();
    assert_eq!(pinned.lock_status(), LockStatus::Ok);
    assert_eq!(verify(&example_plan(), &pinned).policy_sha256, hash);
}

#[test]
fn drifted_policy_is_refused_before_any_predicate() {
    let original = doc();
    let lock = PolicyLock::new(compute_integrity_hash(&original).unwrap());
    let drifted =
        PolicyDocument::from_yaml_str(&BASE_YAML.replace("budget_cap_usd: 1000", "budget_cap_usd: 9000"))
            .unwrap();

    let mut plan = example_plan();
    plan.cost_usd = 5000;
    match verify_pinned(&plan, &drifted, Some(&lock)) {
        Err(PolicyError::HashMismatch { recomputed, locked }) => {
            assert_eq!(locked, lock.policy_sha256);
            assert_ne!(recomputed, locked);
        }
        other => panic!("expected HashMismatch, got {other:?}"),
    }
}

#[test]
fn editing_unreferenced_field_keeps_hash() {
    let edited = PolicyDocument::from_yaml_str(
        &BASE_YAML.replace("pii_handling: masked", "pii_handling: tokenized"),
    )
    .unwrap();
    assert_eq!(
        compute_integrity_hash(&doc()).unwrap(),
        compute_integrity_hash(&edited).unwrap()
    );
}

fn arb_plan() -> impl Strategy<Value = Plan> {
    (
        0u64..3000,
        80.0f64..100.0,
        0u64..500,
        prop::sample::select(vec!["EU", "US", "UK"]),
        prop::sample::select(vec!["private", "public"]),
        0.0f64..0.3,
        0u64..60,
    )
        .prop_map(|(cost, sla, lat, region, endpoint, risk, delay)| Plan {
            id: Some("prop".into()),
            cost_usd: cost,
            sla_pct: sla,
            latency_ms: lat,
            region: region.into(),
            endpoint: endpoint.into(),
            stockout_risk: risk,
            delay_minutes: delay,
            strategy: None,
            inputs: None,
            kpi_expectations: None,
        })
}

proptest! {
    #[test]
    fn verify_is_deterministic(plan in arb_plan()) {
        let pinned = PinnedPolicy::pin(doc(), None).unwrap();
        let a = verify(&plan, &pinned);
        let b = verify(&plan.clone(), &pinned);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.is_pass(), a.violations.is_empty());
    }

    #[test]
    fn violations_follow_fixed_order(plan in arb_plan()) {
        let verdict = verify(&plan, &PinnedPolicy::pin(doc(), None).unwrap());
        let positions: Vec<usize> = verdict
            .codes()
            .iter()
            .map(|c| ViolationCode::ALL.iter().position(|x| x == c).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_predicate_flip_reports_only_that_code(idx in 0usize..8) {
        let mut plan = example_plan();
        let expected = ViolationCode::ALL[idx];
        match expected {
            ViolationCode::BudgetCapUsd => plan.cost_usd = 1001,
            ViolationCode::MinSlaPercent => plan.sla_pct = 94.5,
            ViolationCode::MaxLatencyMs => plan.latency_ms = 201,
            ViolationCode::MaxStockoutRisk => plan.stockout_risk = 0.11,
            ViolationCode::MaxDelayMinutes => plan.delay_minutes = 31,
            ViolationCode::EndpointNotPermitted => plan.endpoint = "public".into(),
            // Region and egress share a field; flip the policy side instead.
            ViolationCode::JurisdictionNotAllowed | ViolationCode::NonEuEgressNotAllowed => {}
        }
        let policy_yaml = match expected {
            ViolationCode::JurisdictionNotAllowed => {
                plan.region = "EU".into();
                BASE_YAML.replace(r#"allowed_jurisdictions: ["EU"]"#, r#"allowed_jurisdictions: ["UK"]"#)
            }
            ViolationCode::NonEuEgressNotAllowed => {
                plan.region = "UK".into();
                BASE_YAML.replace(r#"allowed_jurisdictions: ["EU"]"#, r#"allowed_jurisdictions: ["EU", "UK"]"#)
            }
            _ => BASE_YAML.to_string(),
        };
        let pinned = PinnedPolicy::pin(PolicyDocument::from_yaml_str(&policy_yaml).unwrap(), None).unwrap();
        prop_assert_eq!(verify(&plan, &pinned).codes(), vec![expected]);
    }

    #[test]
    fn hash_stable_under_unrelated_key_reordering(swap in any::<bool>(), extra in "[a-z]{1,8}") {
        let base: serde_json::Value = serde_yaml::from_str(BASE_YAML).unwrap();
        let mut reordered = serde_json::Map::new();
        let obj = base.as_object().unwrap();
        let mut keys: Vec<&String> = obj.keys().collect();
        if swap {
            keys.reverse();
        }
        for k in keys {
            reordered.insert(k.clone(), obj[k].clone());
        }
        reordered.insert(format!("x_{extra}"), serde_json::json!({"note": extra}));
        let a = PolicyDocument::from_value(base.clone()).unwrap();
        let b = PolicyDocument::from_value(serde_json::Value::Object(reordered)).unwrap();
        prop_assert_eq!(compute_integrity_hash(&a).unwrap(), compute_integrity_hash(&b).unwrap());
    }

    #[test]
    fn hash_changes_when_referenced_value_changes(cap in 0u64..100_000) {
        prop_assume!(cap != 1000);
        let changed = PolicyDocument::from_yaml_str(
            &BASE_YAML.replace("budget_cap_usd: 1000", &format!("budget_cap_usd: {cap}")),
        )
        .unwrap();
        prop_assert_ne!(compute_integrity_hash(&doc()).unwrap(), compute_integrity_hash(&changed).unwrap());
    }
}
