//! walletdump command line driver
//!
//! Wires the keystore reader, decryption verifier and key exporter into the
//! `wallet-dump-masterkey` binary and owns the process exit code contract.

pub mod config;
pub mod dump;

pub use config::{default_network, OutputFormat, WALLETDUMP_NETWORK_ENV};
pub use dump::{execute, exit_code_for, DumpError};

/// Keys were dumped, or the wallet held none.
pub const EXIT_SUCCESS: i32 = 0;

/// Usage errors, unreadable wallets and failed exports.
pub const EXIT_FAILURE: i32 = 1;

/// The master key did not decrypt the wallet's keys.
pub const EXIT_WRONG_KEY: i32 = 2;
