//! # acm CLI entry point
//!
//! Parses command-line arguments, resolves configuration and dispatches to
//! subcommand handlers. Every path ends in exactly one JSON line on stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use acm_cli::config::AcmConfig;
use acm_cli::get_secret::{emit_failure, run_get_secret, GetSecretArgs, EXIT_GATE_ERROR};
use acm_cli::ledger::{run_ledger, LedgerArgs};
use acm_cli::lineage::{run_lineage, LineageArgs};
use acm_cli::output::emit;
use acm_cli::policy::{run_policy, PolicyArgs};
use acm_cli::proof::{run_proof, ProofArgs};
use acm_cli::runbook::{run_runbook, RunbookArgs};
use acm_cli::token::{run_token, TokenArgs};
use acm_cli::verify::{run_verify, VerifyArgs};

/// Attested Control Mesh CLI
///
/// Policy-pinned plan verification, attestation-gated secret release and a
/// hash-chained decision ledger.
#[derive(Parser, Debug)]
#[command(name = "acm", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit stderr diagnostics as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to configuration file (overrides `ACM_CONFIG`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Policy structure check, integrity hash and lock pinning.
    Policy(PolicyArgs),

    /// Verify a plan against the pinned policy.
    Verify(VerifyArgs),

    /// Release a secret if the attestation token satisfies the gate.
    #[command(name = "get-secret")]
    GetSecret(GetSecretArgs),

    /// Inspect attestation token claims (unverified).
    Token(TokenArgs),

    /// Ledger head and chain audit.
    Ledger(LedgerArgs),

    /// Record a decision proof for a plan bundle.
    Proof(ProofArgs),

    /// Write a lineage record for a verified plan.
    Lineage(LineageArgs),

    /// Call the secret gate under bounded retry.
    Runbook(RunbookArgs),
}

fn init_tracing(verbose: u8, log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            if !e.use_stderr() {
                // --help / --version
                return ExitCode::SUCCESS;
            }
            let rendered = e.render().to_string();
            let _ = emit(&json!({ "status": "ERROR", "error": rendered.trim_end() }));
            return ExitCode::from(1);
        }
    };

    init_tracing(cli.verbose, cli.log_json);
    tracing::debug!("acm CLI starting");

    let config = match AcmConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return match &cli.command {
                Commands::GetSecret(args) => {
                    let _ = emit_failure(&args.secret_name, &format!("Config error: {e}"));
                    ExitCode::from(EXIT_GATE_ERROR)
                }
                _ => {
                    let _ = emit(&json!({ "status": "ERROR", "error": e.to_string() }));
                    ExitCode::from(1)
                }
            };
        }
    };
    tracing::debug!(
        policy = %config.policy_path.display(),
        ledger_dir = %config.ledger_dir.display(),
        "resolved configuration"
    );

    let result = match cli.command {
        Commands::Policy(args) => run_policy(&args, &config),
        Commands::Verify(args) => run_verify(&args, &config),
        Commands::GetSecret(args) => run_get_secret(&args, &config),
        Commands::Token(args) => run_token(&args, &config),
        Commands::Ledger(args) => run_ledger(&args, &config),
        Commands::Proof(args) => run_proof(&args, &config),
        Commands::Lineage(args) => run_lineage(&args, &config),
        Commands::Runbook(args) => run_runbook(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            let _ = emit(&json!({ "status": "ERROR", "error": format!("{e:#}") }));
            ExitCode::from(1)
        }
    }
}
