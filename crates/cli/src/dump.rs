//! Key dump command implementation
//!
//! Runs the three recovery stages in order and prints the recovered keys.
//! Every secret owner (master key, decoded scalars, WIF strings) lives inside
//! [`execute`] and is wiped before it returns.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walletdump_crypto::{CryptoError, EccContext, MasterKey, Network};
use walletdump_wallet::{export_all, load, verify_and_decrypt, ExportReport, StoreError};
use zeroize::Zeroizing;

use crate::config::OutputFormat;
use crate::{EXIT_FAILURE, EXIT_WRONG_KEY};

/// Header line printed before the text dump
pub const TEXT_HEADER: &str = "Master key accepted - dumping private keys (WIF):";

/// Footer line printed after the text dump
pub const TEXT_FOOTER: &str = "Done.";

/// Failures that end a dump run
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("Master key must be 64 hex chars (32 bytes)")]
    InvalidMasterKey(#[source] CryptoError),

    #[error("Failed to open wallet: {source}\nCould not load wallet from: {}", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Master key did NOT decrypt wallet keys (wrong key)")]
    WrongKey,

    #[error("None of the wallet's {0} private keys could be exported")]
    AllFailed(usize),
}

impl DumpError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DumpError::WrongKey => EXIT_WRONG_KEY,
            DumpError::InvalidMasterKey(_) | DumpError::Store { .. } | DumpError::AllFailed(_) => {
                EXIT_FAILURE
            }
        }
    }
}

/// Map any error from [`execute`] to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DumpError>()
        .map(DumpError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

#[derive(Serialize)]
struct JsonKey<'a> {
    key_id: String,
    wif: &'a str,
}

#[derive(Serialize)]
struct JsonDump<'a> {
    network: &'a str,
    keys: Vec<JsonKey<'a>>,
    skipped: usize,
}

/// Execute the dump.
///
/// Recovered keys go to `out`; per-key export warnings go to `warnings`.
pub fn execute(
    wallet_path: &Path,
    master_key_hex: &str,
    network: Network,
    format: OutputFormat,
    out: &mut dyn Write,
    warnings: &mut dyn Write,
) -> Result<()> {
    let mut master_key = MasterKey::from_hex(master_key_hex).map_err(|e| {
        debug!(error = %e, "Rejected master key argument");
        DumpError::InvalidMasterKey(e)
    })?;

    let ecc = EccContext::acquire().context("Failed to initialize secp256k1 context")?;

    let store = load(wallet_path).map_err(|source| DumpError::Store {
        path: wallet_path.to_path_buf(),
        source,
    })?;

    let keys = verify_and_decrypt(&ecc, &store, &mut master_key, true)
        .map_err(|_| DumpError::WrongKey)?;
    drop(master_key);

    let total = keys.len();
    let report = export_all(&ecc, keys, network);

    for warning in &report.warnings {
        writeln!(
            warnings,
            "Could not get private key for {}: {}",
            warning.key_id(),
            warning
        )
        .context("Failed to write warning")?;
    }

    match format {
        OutputFormat::Text => write_text(&report, out)?,
        OutputFormat::Json => write_json(&report, out)?,
    }
    out.flush().context("Failed to flush output")?;

    info!(
        network = %report.network,
        exported = report.exported.len(),
        skipped = report.warnings.len(),
        "Dump finished"
    );

    if report.all_failed() {
        warn!(total, "Every recovered key failed export");
        return Err(DumpError::AllFailed(total).into());
    }

    Ok(())
}

fn write_text(report: &ExportReport, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", TEXT_HEADER).context("Failed to write output")?;
    for key in &report.exported {
        writeln!(out, "KeyID: {}  WIF: {}", key.key_id(), key.wif())
            .context("Failed to write output")?;
    }
    // A run that ends in failure does not claim to be done
    if !report.all_failed() {
        writeln!(out, "{}", TEXT_FOOTER).context("Failed to write output")?;
    }
    Ok(())
}

fn write_json(report: &ExportReport, out: &mut dyn Write) -> Result<()> {
    let dump = JsonDump {
        network: report.network.as_str(),
        keys: report
            .exported
            .iter()
            .map(|key| JsonKey {
                key_id: key.key_id().to_string(),
                wif: key.wif(),
            })
            .collect(),
        skipped: report.warnings.len(),
    };

    let text = Zeroizing::new(serde_json::to_string_pretty(&dump)?);
    writeln!(out, "{}", text.as_str()).context("Failed to write output")?;
    Ok(())
}
