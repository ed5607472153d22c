//! # Get-Secret Subcommand
//!
//! Attestation-gated release of one secret. Prints one JSON line:
//! `{secret_name, released, value}` or `{secret_name, released: false, error}`.
//!
//! | Exit | Meaning                 |
//! |------|-------------------------|
//! | 0    | released                |
//! | 1    | bad usage (clap)        |
//! | 2    | token file unreadable   |
//! | 3    | denied                  |
//! | 4    | gate or config error    |

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use acm_gate::ReleaseDecision;

use crate::config::AcmConfig;
use crate::output::emit;

/// Exit code: released.
pub const EXIT_RELEASED: u8 = 0;
/// Exit code: token unreadable.
pub const EXIT_TOKEN_READ: u8 = 2;
/// Exit code: denied.
pub const EXIT_DENIED: u8 = 3;
/// Exit code: gate failure.
pub const EXIT_GATE_ERROR: u8 = 4;

/// Arguments for the get-secret subcommand.
#[derive(Args, Debug)]
pub struct GetSecretArgs {
    /// Name of the secret to release.
    pub secret_name: String,
    /// File holding the attestation token.
    pub token_file: PathBuf,
}

/// Print the failure line `{secret_name, released: false, error}`.
pub fn emit_failure(secret_name: &str, error: &str) -> Result<()> {
    emit(&json!({
        "secret_name": secret_name,
        "released": false,
        "error": error,
    }))
}

/// Execute the get-secret subcommand.
pub fn run_get_secret(args: &GetSecretArgs, config: &AcmConfig) -> Result<u8> {
    let name = args.secret_name.as_str();
    let token = match std::fs::read_to_string(&args.token_file) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(file = %args.token_file.display(), "token read failed: {e}");
            emit_failure(name, &format!("Read error: {e}"))?;
            return Ok(EXIT_TOKEN_READ);
        }
    };

    let decision = config
        .build_gate()
        .map_err(anyhow::Error::from)
        .and_then(|gate| gate.release(name, &token).map_err(anyhow::Error::from));

    match decision {
        Ok(ReleaseDecision::Released { value, .. }) => {
            emit(&json!({
                "secret_name": name,
                "released": true,
                "value": value.expose(),
            }))?;
            Ok(EXIT_RELEASED)
        }
        Ok(ReleaseDecision::Denied { reason, .. }) => {
            emit(&json!({
                "secret_name": name,
                "released": false,
                "value": null,
                "reason": reason,
            }))?;
            Ok(EXIT_DENIED)
        }
        Err(e) => {
            tracing::error!("secret gate error: {e:#}");
            emit_failure(name, &format!("Secret gate error: {e}"))?;
            Ok(EXIT_GATE_ERROR)
        }
    }
}
