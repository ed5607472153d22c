//! # Runbook Subcommand
//!
//! Asks the gate for a release under the configured retry policy. Only the
//! decision is printed, never the value.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use acm_gate::RetryingClient;

use crate::config::AcmConfig;
use crate::output::emit;

/// Arguments for the runbook subcommand.
#[derive(Args, Debug)]
pub struct RunbookArgs {
    /// Name of the secret the runbook needs.
    pub secret_name: String,
    /// File holding the attestation token.
    pub token_file: PathBuf,
}

/// Execute the runbook subcommand. Exit 0 when released, 2 when blocked.
pub fn run_runbook(args: &RunbookArgs, config: &AcmConfig) -> Result<u8> {
    let client = RetryingClient::new(config.retry.clone());
    let outcome = client.run(|attempt| {
        tracing::debug!(attempt, secret_name = %args.secret_name, "runbook gate attempt");
        let token = match std::fs::read_to_string(&args.token_file) {
            Ok(t) => t,
            Err(e) => return (false, format!("gate_error:Read error: {e}")),
        };
        let decision = config
            .build_gate()
            .map_err(anyhow::Error::from)
            .and_then(|gate| gate.release(&args.secret_name, &token).map_err(Into::into));
        match decision {
            Ok(d) if d.is_released() => (true, "released:true".to_string()),
            Ok(_) => (false, "released:false".to_string()),
            Err(e) => (false, format!("gate_error:{e}")),
        }
    });

    if !outcome.ok {
        tracing::warn!(
            secret_name = %args.secret_name,
            attempts = outcome.attempts,
            "runbook blocked after retries: {}",
            outcome.message
        );
    }
    emit(&json!({
        "secret_name": args.secret_name,
        "released": outcome.ok,
        "attempts": outcome.attempts,
        "message": outcome.message,
    }))?;
    Ok(if outcome.ok { 0 } else { 2 })
}
