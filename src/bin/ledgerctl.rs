//! `ledgerctl`: a thin CLI over the library for local inspection and offline
//! verification. Business logic lives in `decision_ledger`; this binary only
//! parses arguments, reads/writes files, and flattens errors for a human.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use decision_ledger::canonical::{hash_canonical, to_canonical_string};
use decision_ledger::receipt::{verify_anchor_receipt, verify_decision_receipt_offline, AnchorReceipt, DecisionReceiptV1};

#[derive(Parser)]
#[command(name = "ledgerctl", about = "Inspect and verify decision-ledger artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SHA-256 hash of a file's canonical JSON encoding.
    Hash { file: PathBuf },
    /// Rewrite a JSON file to its canonical form on stdout.
    Normalize { file: PathBuf },
    /// Verify a decision receipt (v1) exported by the library, offline.
    VerifyReceipt { file: PathBuf },
    /// Verify a bare anchor receipt against its own pinned head, offline.
    VerifyAnchor { file: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Hash { file } => {
            let value = read_json(&file)?;
            println!("{}", hash_canonical(&value)?);
        }
        Command::Normalize { file } => {
            let value = read_json(&file)?;
            println!("{}", to_canonical_string(&value)?);
        }
        Command::VerifyReceipt { file } => {
            let receipt: DecisionReceiptV1 = read_typed(&file)?;
            let result = verify_decision_receipt_offline(&receipt)?;
            if result.ok {
                println!("OK");
            } else {
                log::error!("receipt verification failed: {:?}", result.reason);
                println!("FAILED: {}", result.reason.unwrap_or_default());
                std::process::exit(1);
            }
        }
        Command::VerifyAnchor { file } => {
            let receipt: AnchorReceipt = read_typed(&file)?;
            let result = verify_anchor_receipt(&receipt)?;
            if result.ok {
                println!("OK");
            } else {
                log::error!("anchor receipt verification failed: {:?}", result.reason);
                println!("FAILED: {}", result.reason.unwrap_or_default());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn read_json(path: &PathBuf) -> Result<serde_json::Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing JSON from {}", path.display()))
}

fn read_typed<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
