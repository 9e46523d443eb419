//! Cryptographic error types

use thiserror::Error;

/// Errors raised by key handling, the wallet crypter and the WIF codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Secret scalar is zero, out of range, or the wrong length
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    /// Bytes are not a valid SEC1 encoded secp256k1 point
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    /// Symmetric key has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Initialization vector has the wrong length
    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    /// Decrypted data did not carry valid PKCS#7 padding
    #[error("decryption failed: invalid padding")]
    InvalidPadding,

    /// Encryption could not complete
    #[error("cipher operation failed: {0}")]
    CipherError(String),

    /// Master key text is not 64 hex characters
    #[error("master key must be 64 hex chars (32 bytes): {0}")]
    InvalidMasterKeyHex(String),

    /// The secp256k1 self-test run at context start failed
    #[error("secp256k1 context self-test failed")]
    EccSelfTestFailed,

    /// WIF string contains characters outside the base58 alphabet
    #[error("invalid WIF base58 encoding: {0}")]
    WifBase58(String),

    /// WIF checksum does not match the payload
    #[error("invalid WIF checksum")]
    WifChecksum,

    /// Decoded WIF payload has an impossible length
    #[error("invalid WIF length: {0} bytes")]
    WifLength(usize),

    /// Compression marker byte is not 0x01
    #[error("invalid WIF compression flag: {0:#04x}")]
    WifCompressionFlag(u8),

    /// Version byte does not belong to a known network
    #[error("unknown WIF version byte: {0:#04x}")]
    WifVersion(u8),

    /// Network name is not one of main, test, testnet4, signet, regtest
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
