//! Token inspection. Reads claims without verifying anything.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use acm_core::Timestamp;
use acm_gate::{extract_claims, AttestationToken};

use crate::config::AcmConfig;
use crate::output::{emit, read_text};

/// Token subcommand arguments.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token operations.
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Print issuer and attestation type claims. The signature is not checked.
    Inspect {
        /// File holding the token.
        token_file: PathBuf,
    },
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs, _config: &AcmConfig) -> Result<u8> {
    match &args.command {
        TokenCommand::Inspect { token_file } => {
            let text = read_text(token_file)?;
            let strict = AttestationToken::parse(&text);
            if let Err(e) = &strict {
                tracing::warn!(file = %token_file.display(), "token does not parse strictly: {e}");
            }
            let claims = extract_claims(&text);
            emit(&json!({
                "timestamp": Timestamp::now(),
                "file": token_file.display().to_string(),
                "iss": claims.issuer(),
                "x-ms-attestation-type": claims.attestation_type(),
                "parse_ok": strict.is_ok(),
            }))?;
            Ok(0)
        }
    }
}
