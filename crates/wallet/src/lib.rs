//! Wallet key recovery for walletdump
//!
//! The recovery pipeline runs in three stages, each depending only on the
//! ones before it:
//!
//! 1. **Keystore Reader** ([`load`]): reads a wallet file (Berkeley DB,
//!    SQLite or a `bitcoin-wallet dump` text file) into a [`KeyStore`]
//! 2. **Decryption Verifier** ([`verify_and_decrypt`]): checks a candidate
//!    master key against every encrypted key and recovers the scalars
//! 3. **Key Exporter** ([`export_all`]): renders the recovered keys as WIF
//!
//! # Example
//!
//! ```rust,ignore
//! use walletdump_crypto::{EccContext, MasterKey, Network};
//! use walletdump_wallet::{export_all, load, verify_and_decrypt};
//!
//! let ecc = EccContext::acquire()?;
//! let store = load(Path::new("/backups/wallet.dat"))?;
//! let mut master_key = MasterKey::from_hex(hex)?;
//! let keys = verify_and_decrypt(&ecc, &store, &mut master_key, true)?;
//! let report = export_all(&ecc, keys, Network::Main);
//! ```

pub mod error;
pub mod export;
pub mod format;
pub mod reader;
pub mod record;
pub mod serialize;
pub mod verifier;

pub use error::{StoreError, StoreResult, VerifyError};
pub use export::{export_all, ExportReport, ExportWarning, ExportedKey};
pub use format::{ContainerFormat, RawEntry};
pub use reader::{load, resolve_wallet_file, KeyStore, WALLET_FILE_NAME};
pub use record::{
    EncryptedKeyRecord, KeyManagerKind, MasterKeyRecord, PlaintextKeyRecord, WalletRecord,
};
pub use verifier::{verify_and_decrypt, DecodedKeys, DecodedPrivateKey};
