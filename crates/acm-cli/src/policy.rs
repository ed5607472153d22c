//! # Policy Subcommand
//!
//! `acm policy validate` reports every structural issue, `acm policy hash`
//! prints the integrity hash, and `acm policy lock` pins it (or, with
//! `--check`, compares the live document against the pin).

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use acm_policy::{
    check_lock, compute_integrity_hash, read_lock, validate_structure, write_lock, LockStatus,
    PolicyDocument, PolicyLock, StructureIssue,
};

use crate::config::AcmConfig;
use crate::output::{emit, read_text};

/// Policy subcommand arguments.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

/// Policy operations.
#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Check the policy document shape. Exit 0 when valid, 1 otherwise.
    Validate,
    /// Print the policy integrity hash.
    Hash,
    /// Write the lock file, or compare against it with --check.
    Lock {
        /// Compare instead of writing. Exit 0 OK, 2 MISMATCH, 1 ABSENT.
        #[arg(long)]
        check: bool,
    },
}

/// Execute the policy subcommand.
pub fn run_policy(args: &PolicyArgs, config: &AcmConfig) -> Result<u8> {
    match &args.command {
        PolicyCommand::Validate => run_validate(config),
        PolicyCommand::Hash => run_hash(config),
        PolicyCommand::Lock { check } => run_lock(config, *check),
    }
}

fn run_validate(config: &AcmConfig) -> Result<u8> {
    let text = read_text(&config.policy_path)?;
    let issues = match serde_yaml::from_str::<serde_json::Value>(&text) {
        Ok(value) => validate_structure(&value),
        Err(e) => vec![StructureIssue {
            path: "$".to_string(),
            message: format!("not parseable: {e}"),
        }],
    };
    for issue in &issues {
        tracing::warn!(path = %issue.path, "{}", issue.message);
    }
    let valid = issues.is_empty();
    emit(&json!({ "valid": valid, "issues": issues }))?;
    Ok(if valid { 0 } else { 1 })
}

fn run_hash(config: &AcmConfig) -> Result<u8> {
    let doc = PolicyDocument::load(&config.policy_path)?;
    let hash = compute_integrity_hash(&doc)?;
    emit(&json!({ "hash": hash }))?;
    Ok(0)
}

fn run_lock(config: &AcmConfig, check: bool) -> Result<u8> {
    let doc = PolicyDocument::load(&config.policy_path)?;
    if check {
        let lock = read_lock(&config.lock_path)?;
        let result = check_lock(&doc, lock.as_ref())?;
        emit(&result)?;
        return Ok(match result.status {
            LockStatus::Ok => 0,
            LockStatus::Mismatch => 2,
            LockStatus::Absent => 1,
        });
    }

    let hash = compute_integrity_hash(&doc)?;
    write_lock(&config.lock_path, &PolicyLock::new(hash.clone()))
        .with_context(|| format!("writing {}", config.lock_path.display()))?;
    emit(&json!({
        "policy_sha256": hash,
        "lock_path": config.lock_path.display().to_string(),
    }))?;
    Ok(0)
}
