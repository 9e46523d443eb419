//! Secure memory handling for cryptographic material
//!
//! This module provides memory-safe containers for key material with:
//! - Automatic zeroing on drop via `zeroize`
//! - Debug output masking to prevent log exposure
//! - No `Clone` on the master key, so the only copy is the one the caller owns
//!
//! # Example
//!
//! ```rust
//! use walletdump_crypto::secure::MasterKey;
//!
//! let mut key = MasterKey::from_hex(&"11".repeat(32)).unwrap();
//! key.wipe();
//! assert!(key.is_wiped());
//! ```

mod material;
mod secret;

pub use material::{MasterKey, MASTER_KEY_SIZE};
pub use secrecy::ExposeSecret;
pub use secret::{into_secret_bytes, SecretArray, SecretBytes};
