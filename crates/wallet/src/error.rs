//! Wallet error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a wallet key database
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing exists at the wallet location
    #[error("wallet not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The wallet exists but could not be opened or read
    #[error("wallet unreadable: {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bad magic, version, framing, checksum or record encoding
    #[error("wallet corrupt: {0}")]
    Corrupt(String),

    /// A recognised container this tool does not read
    #[error("unsupported wallet format: {0}")]
    Unsupported(String),

    /// The wallet declares descriptor mode but holds no descriptor keys
    #[error("no key manager found in wallet (descriptor wallet without descriptor keys)")]
    NoKeyManager,
}

impl StoreError {
    /// Shorthand for a `Corrupt` error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        StoreError::Corrupt(msg.into())
    }
}

/// Result type for wallet loading
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of the decryption verifier
///
/// Deliberately carries no detail about which record failed or why; that is
/// logged at debug level instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// The master key did not decrypt every encrypted key record
    #[error("master key did not decrypt wallet keys (wrong key)")]
    WrongKey,
}
