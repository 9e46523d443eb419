//! Command line configuration

use clap::ValueEnum;
use walletdump_crypto::Network;

/// Environment variable for the default network.
///
/// When set to one of `main`, `test`, `testnet4`, `signet` or `regtest`, it
/// replaces `regtest` as the default for `--network`. An explicit flag still wins.
///
/// # Example
///
/// ```bash
/// WALLETDUMP_NETWORK=signet wallet-dump-masterkey ~/.bitcoin/signet/wallets/w1 <hex>
/// ```
pub const WALLETDUMP_NETWORK_ENV: &str = "WALLETDUMP_NETWORK";

/// How the recovered keys are printed on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One `KeyID: ...  WIF: ...` line per key
    #[default]
    Text,
    /// A single pretty-printed JSON object
    Json,
}

/// Returns the default network for WIF encoding.
///
/// Resolution order:
/// 1. `WALLETDUMP_NETWORK` environment variable (if set and valid)
/// 2. `regtest`
pub fn default_network() -> Network {
    std::env::var(WALLETDUMP_NETWORK_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}
