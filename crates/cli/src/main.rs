//! wallet-dump-masterkey
//!
//! Dumps the private keys of an encrypted Bitcoin Core wallet as WIF, given
//! the wallet's 32-byte master key instead of its passphrase.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;
use walletdump::{
    default_network, execute, exit_code_for, DumpError, OutputFormat, EXIT_FAILURE, EXIT_SUCCESS,
};
use walletdump_crypto::Network;
use zeroize::Zeroizing;

/// Dump wallet private keys using a raw master key
#[derive(Parser)]
#[command(name = "wallet-dump-masterkey")]
#[command(author = "walletdump contributors")]
#[command(version)]
#[command(about = "Dump wallet private keys (WIF) using the wallet's master key", long_about = None)]
struct Cli {
    /// Wallet directory or wallet file (Berkeley DB, SQLite or bitcoin-wallet dump)
    wallet_path: PathBuf,

    /// Master key as 64 hex characters
    master_key: String,

    /// Network whose WIF version byte is used (main|test|testnet4|signet|regtest)
    #[arg(long, default_value_t = default_network())]
    network: Network,

    /// Output format (text|json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// The logging level (trace|debug|info|warn|error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// The logging format (json|plain)
    #[arg(long, default_value = "plain")]
    log_format: String,

    /// Disable colored logs
    #[arg(long, default_value = "false")]
    log_no_color: bool,
}

fn main() {
    let code = run();
    std::process::exit(code);
}

/// Runs the tool and returns the exit code.
///
/// `process::exit` skips destructors, so every secret is owned here and
/// dropped before this returns.
fn run() -> i32 {
    // clap's own usage exit code (2) would collide with the wrong-key code
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    init_tracing(&cli.log_level, &cli.log_format, cli.log_no_color);

    let master_key_hex = Zeroizing::new(cli.master_key);
    debug!(wallet = %cli.wallet_path.display(), network = %cli.network, "Starting dump");

    let stdout = io::stdout();
    let stderr = io::stderr();
    let result = execute(
        &cli.wallet_path,
        &master_key_hex,
        cli.network,
        cli.format,
        &mut stdout.lock(),
        &mut stderr.lock(),
    );

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            if e.downcast_ref::<DumpError>().is_some() {
                eprintln!("{}", e);
            } else {
                eprintln!("Error: {:#}", e);
            }
            exit_code_for(&e)
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str, no_color: bool) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // Logs share stderr with warnings; stdout carries only the dump
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_ansi(!no_color);

    match log_format {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}
