//! # Lineage Subcommand
//!
//! Writes `artifacts/lineage_<key>.json` describing which plan, policy and
//! datasets produced a verify/simulate result, where `key` is the first 16
//! hex digits of `sha256("<plan_id>|<policy_sha256>|<timestamp>")`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use acm_core::{sha256_bytes, Timestamp};
use acm_policy::plan::UNKNOWN_PLAN_ID;

use crate::config::AcmConfig;
use crate::output::{absolute, read_json};

/// Environment variable naming the twin snapshot dataset.
pub const SNAPSHOT_ENV: &str = "SNAPSHOT_PATH";

/// Arguments for the lineage subcommand.
#[derive(Args, Debug)]
pub struct LineageArgs {
    /// Combined `{verify, simulation}` JSON.
    pub combined: PathBuf,
    /// Plan JSON the result was produced for.
    pub plan: PathBuf,
}

#[derive(Serialize)]
struct Datasets {
    twin_snapshot_path: String,
    plan_path: String,
    policy_base_path: String,
    policy_lock_path: String,
}

#[derive(Serialize)]
struct LineageRecord {
    timestamp: Timestamp,
    plan_id: String,
    policy_sha256: Option<String>,
    verify_status: Option<String>,
    violations: Value,
    simulation: Option<Value>,
    datasets: Datasets,
}

/// Execute the lineage subcommand. Prints the written path.
pub fn run_lineage(args: &LineageArgs, config: &AcmConfig) -> Result<u8> {
    let combined: Value = read_json(&args.combined)?;
    let plan: Value = read_json(&args.plan)?;

    let verify = combined.get("verify").cloned().unwrap_or(Value::Null);
    let simulation = combined
        .get("simulation")
        .filter(|s| !is_empty(s))
        .cloned();

    let plan_id = ["plan_id", "id"]
        .iter()
        .find_map(|k| plan.get(*k).and_then(Value::as_str))
        .unwrap_or(UNKNOWN_PLAN_ID)
        .to_string();
    let snapshot = std::env::var(SNAPSHOT_ENV).unwrap_or_else(|_| "twin_snapshot.json".into());

    let record = LineageRecord {
        timestamp: Timestamp::now(),
        plan_id,
        policy_sha256: verify.get("policy_sha256").and_then(Value::as_str).map(String::from),
        verify_status: verify.get("status").and_then(Value::as_str).map(String::from),
        violations: verify
            .get("violations")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())),
        simulation,
        datasets: Datasets {
            twin_snapshot_path: absolute(Path::new(&snapshot)),
            plan_path: absolute(&args.plan),
            policy_base_path: absolute(&config.policy_path),
            policy_lock_path: absolute(&config.lock_path),
        },
    };

    let key_src = format!(
        "{}|{}|{}",
        record.plan_id,
        record.policy_sha256.as_deref().unwrap_or(""),
        record.timestamp
    );
    let key = sha256_bytes(key_src.as_bytes()).to_hex();
    let out_path = config.artifacts_dir.join(format!("lineage_{}.json", &key[..16]));

    std::fs::create_dir_all(&config.artifacts_dir)
        .with_context(|| format!("failed to create {}", config.artifacts_dir.display()))?;
    let body = serde_json::to_string_pretty(&record)?;
    std::fs::write(&out_path, body)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    tracing::info!(path = %out_path.display(), plan_id = %record.plan_id, "lineage record written");

    crate::output::emit(&serde_json::json!({ "path": out_path.display().to_string() }))?;
    Ok(0)
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
