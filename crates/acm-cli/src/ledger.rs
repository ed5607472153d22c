//! Ledger head and replay audit.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::config::AcmConfig;
use crate::output::emit;

/// Ledger subcommand arguments.
#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

/// Ledger operations.
#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Print the current chain head and entry count.
    Head,
    /// Replay the chain. Exit 0 when intact, 1 when broken.
    Verify,
}

/// Execute the ledger subcommand.
pub fn run_ledger(args: &LedgerArgs, config: &AcmConfig) -> Result<u8> {
    let ledger = config.open_ledger()?;
    match &args.command {
        LedgerCommand::Head => {
            let entries = ledger.entries()?;
            emit(&json!({
                "head_digest": entries.last().map(|e| e.chain_head.as_str()),
                "entries": entries.len(),
            }))?;
            Ok(0)
        }
        LedgerCommand::Verify => {
            let report = ledger.audit()?;
            emit(&report)?;
            Ok(if report.ok { 0 } else { 1 })
        }
    }
}
