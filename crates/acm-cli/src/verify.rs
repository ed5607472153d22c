//! # Verify Subcommand
//!
//! Loads the policy, checks the pin, and prints the verdict for one plan.
//! A hash mismatch prints a refusal line and exits 2; PASS and FAIL both
//! exit 0 since the `status` field is the signal.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::json;

use acm_ledger::EntryType;
use acm_policy::{read_lock, verify, PinnedPolicy, Plan, PolicyDocument, PolicyError, Verdict};

use crate::config::AcmConfig;
use crate::output::{emit, read_json};

/// Arguments for the verify subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Plan JSON file.
    pub plan: PathBuf,

    /// Append a `plan_verdict` entry to the ledger.
    #[arg(long)]
    pub record: bool,
}

#[derive(Serialize)]
struct PlanVerdictRecord<'a> {
    plan_id: &'a str,
    verdict: &'a Verdict,
}

/// Pin the configured policy, or print the mismatch refusal line.
///
/// `Ok(None)` means the refusal was printed and the caller should exit 2.
pub fn pin_policy(config: &AcmConfig) -> Result<Option<PinnedPolicy>> {
    let doc = PolicyDocument::load(&config.policy_path)?;
    let lock = read_lock(&config.lock_path)?;
    match PinnedPolicy::pin(doc, lock.as_ref()) {
        Ok(pinned) => Ok(Some(pinned)),
        Err(PolicyError::HashMismatch { recomputed, locked }) => {
            emit(&json!({
                "status": "FAIL",
                "reason": "policy_hash_mismatch",
                "recomputed": recomputed,
                "locked": locked,
            }))?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Execute the verify subcommand.
pub fn run_verify(args: &VerifyArgs, config: &AcmConfig) -> Result<u8> {
    let plan: Plan = read_json(&args.plan)?;
    let Some(pinned) = pin_policy(config)? else {
        return Ok(2);
    };

    let verdict = verify(&plan, &pinned);
    tracing::info!(
        plan_id = plan.plan_id(),
        status = %verdict.status,
        violations = verdict.violations.len(),
        "plan verified"
    );

    if args.record {
        let ledger = config.open_ledger()?;
        let entry = ledger.append_record(
            EntryType::PlanVerdict,
            &PlanVerdictRecord {
                plan_id: plan.plan_id(),
                verdict: &verdict,
            },
        )?;
        tracing::info!(chain_head = %entry.chain_head, "verdict recorded");
    }

    emit(&verdict)?;
    Ok(0)
}
