//! Cryptographic primitives for walletdump
//!
//! This crate provides:
//! - secp256k1 secret/public keys and Bitcoin key identifiers (HASH160)
//! - The wallet crypter: AES-256-CBC with per-key IVs derived from the public key
//! - Wallet Import Format (WIF) encoding and decoding
//! - Secure containers that zeroize key material on drop
//! - A scoped guard for the process-wide secp256k1 context

pub mod crypter;
pub mod ecc;
pub mod error;
pub mod hash;
pub mod secp256k1;
pub mod secure;
pub mod wif;

// Crypter exports
pub use crypter::{
    decrypt_secret, encrypt_secret, iv_for_pubkey, ENCRYPTED_SECRET_SIZE, WALLET_CRYPTO_IV_SIZE,
    WALLET_CRYPTO_KEY_SIZE,
};

// Context guard
pub use ecc::EccContext;

// Error exports
pub use error::{CryptoError, CryptoResult};

// secp256k1 exports
pub use secp256k1::{KeyId, PublicKey, SecretKey, SECRET_KEY_SIZE};

// Secure memory exports
pub use secure::{ExposeSecret, MasterKey, SecretArray, SecretBytes};

// WIF exports
pub use wif::{decode_wif, encode_wif, Network, WifKey};
