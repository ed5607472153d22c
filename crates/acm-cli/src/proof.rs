//! # Proof Subcommand
//!
//! Verifies every plan in a bundle under the pinned policy and appends one
//! `decision_proof` entry tying together the bundle bytes, the optional
//! simulation output, the policy hash, and the attestation token digest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use acm_core::sha256_bytes;
use acm_gate::token_digest;
use acm_ledger::EntryType;
use acm_policy::{verify, Plan, VerdictStatus, Violation};

use crate::config::AcmConfig;
use crate::output::emit;
use crate::verify::pin_policy;

/// Recorded when no attestation token accompanies the proof.
pub const NO_ATTESTATION: &str = "attest:none";

/// Arguments for the proof subcommand.
#[derive(Args, Debug)]
pub struct ProofArgs {
    /// Plan bundle JSON (`{"plans": [...]}`).
    pub bundle: PathBuf,

    /// Simulation output JSON; its `results` become the twin deltas.
    #[arg(long)]
    pub sim: Option<PathBuf>,

    /// Attestation token file; only its digest is recorded.
    #[arg(long)]
    pub attestation: Option<PathBuf>,
}

#[derive(Deserialize)]
struct PlanBundle {
    plans: Vec<Plan>,
}

#[derive(Serialize)]
struct PlanOutcome {
    plan_id: String,
    status: VerdictStatus,
    violations: Vec<Violation>,
}

#[derive(Serialize)]
struct SolverSnapshot {
    checked_plans: Vec<String>,
    result: &'static str,
    verdicts: Vec<PlanOutcome>,
}

#[derive(Serialize)]
struct DecisionProof {
    bundle_file: String,
    bundle_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sim_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sim_sha256: Option<String>,
    twin_deltas: Value,
    policy_hash: String,
    attestation_digest: String,
    solver: SolverSnapshot,
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Execute the proof subcommand.
pub fn run_proof(args: &ProofArgs, config: &AcmConfig) -> Result<u8> {
    let bundle_bytes = read_bytes(&args.bundle)?;
    let bundle: PlanBundle = serde_json::from_slice(&bundle_bytes)
        .with_context(|| format!("failed to parse plan bundle {}", args.bundle.display()))?;

    let (sim_file, sim_sha256, twin_deltas) = match &args.sim {
        Some(path) => {
            let bytes = read_bytes(path)?;
            let sim: Value = serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse simulation {}", path.display()))?;
            (
                Some(file_name(path)),
                Some(sha256_bytes(&bytes).to_hex()),
                sim.get("results").cloned().unwrap_or(Value::Null),
            )
        }
        None => (None, None, Value::Null),
    };

    let attestation_digest = match &args.attestation {
        Some(path) => {
            let token = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            token_digest(&token)
        }
        None => NO_ATTESTATION.to_string(),
    };

    let Some(pinned) = pin_policy(config)? else {
        return Ok(2);
    };

    let verdicts: Vec<PlanOutcome> = bundle
        .plans
        .iter()
        .map(|plan| {
            let verdict = verify(plan, &pinned);
            PlanOutcome {
                plan_id: plan.plan_id().to_string(),
                status: verdict.status,
                violations: verdict.violations,
            }
        })
        .collect();
    let all_pass = verdicts.iter().all(|v| v.status == VerdictStatus::Pass);

    let proof = DecisionProof {
        bundle_file: file_name(&args.bundle),
        bundle_sha256: sha256_bytes(&bundle_bytes).to_hex(),
        sim_file,
        sim_sha256,
        twin_deltas,
        policy_hash: pinned.policy_sha256().to_string(),
        attestation_digest,
        solver: SolverSnapshot {
            checked_plans: verdicts.iter().map(|v| v.plan_id.clone()).collect(),
            result: if all_pass { "SAT" } else { "UNSAT" },
            verdicts,
        },
    };

    let ledger = config.open_ledger()?;
    let entry = ledger.append_record(EntryType::DecisionProof, &proof)?;
    emit(&json!({
        "entry_digest": entry.entry_digest,
        "chain_head": entry.chain_head,
    }))?;
    Ok(0)
}
