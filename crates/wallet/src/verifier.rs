//! Decryption Verifier
//!
//! Decides whether a candidate master key is the wallet's key by decrypting
//! every encrypted key record with it. One master key decrypts all records or
//! none: a single failed record rejects the key, and nothing recovered before
//! the failure is returned.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};
use walletdump_crypto::{
    decrypt_secret, CryptoError, EccContext, ExposeSecret, KeyId, MasterKey, SecretArray,
    SecretKey, SECRET_KEY_SIZE,
};

use crate::error::VerifyError;
use crate::reader::KeyStore;
use crate::record::EncryptedKeyRecord;

/// A recovered private key
///
/// The scalar is wiped on drop. The network tag is applied at export time.
#[derive(Debug)]
pub struct DecodedPrivateKey {
    secret: SecretArray<SECRET_KEY_SIZE>,
    compressed: bool,
}

impl DecodedPrivateKey {
    pub fn new(secret: SecretArray<SECRET_KEY_SIZE>, compressed: bool) -> Self {
        Self { secret, compressed }
    }

    /// The raw 32-byte scalar
    pub fn secret(&self) -> &[u8; SECRET_KEY_SIZE] {
        self.secret.expose_secret()
    }

    /// Whether the matching public key serializes compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

/// Recovered keys by key id, in ascending raw key id order
pub type DecodedKeys = BTreeMap<KeyId, DecodedPrivateKey>;

/// Why one record did not decrypt; logged, never returned
#[derive(Debug)]
enum Rejection {
    Cipher(CryptoError),
    Length(usize),
    InvalidScalar,
    PublicKeyMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Cipher(e) => write!(f, "{}", e),
            Rejection::Length(len) => write!(f, "decrypted secret is {} bytes", len),
            Rejection::InvalidScalar => write!(f, "decrypted secret is not a valid scalar"),
            Rejection::PublicKeyMismatch => write!(f, "derived public key does not match"),
        }
    }
}

/// Wipes the master key when dropped, whichever way the verifier returns
struct WipeOnExit<'a>(&'a mut MasterKey);

impl Drop for WipeOnExit<'_> {
    fn drop(&mut self) {
        self.0.wipe();
    }
}

fn decrypt_record(
    master_key: &MasterKey,
    record: &EncryptedKeyRecord,
) -> Result<DecodedPrivateKey, Rejection> {
    let plaintext = decrypt_secret(record.ciphertext(), master_key.expose(), &record.iv())
        .map_err(Rejection::Cipher)?;
    let plaintext = plaintext.expose_secret();
    if plaintext.len() != SECRET_KEY_SIZE {
        return Err(Rejection::Length(plaintext.len()));
    }

    let secret = SecretKey::from_slice(plaintext).map_err(|_| Rejection::InvalidScalar)?;
    let compressed = record.pubkey().is_compressed();
    if secret.public_key(compressed) != *record.pubkey() {
        return Err(Rejection::PublicKeyMismatch);
    }

    Ok(DecodedPrivateKey::new(secret.to_bytes(), compressed))
}

fn plaintext_keys(store: &KeyStore, keys: &mut DecodedKeys) {
    for record in store.plaintext_keys() {
        if keys.contains_key(&record.key_id()) {
            debug!(key_id = %record.key_id(), "Plaintext key shadowed by encrypted record");
            continue;
        }
        let secret = SecretArray::copy_from(record.secret());
        keys.insert(
            record.key_id(),
            DecodedPrivateKey::new(secret, record.pubkey().is_compressed()),
        );
    }
}

/// Verify `master_key` against the store and decrypt every key
///
/// With no encrypted records the key cannot be falsified: it is accepted when
/// `accept_no_keys` is set (returning only the store's plaintext keys) and
/// rejected otherwise. `master_key` is wiped before this returns, on every
/// path.
///
/// # Errors
///
/// Returns `VerifyError::WrongKey` when any record fails to decrypt or
/// decrypts to a key whose public key differs from the stored one.
pub fn verify_and_decrypt(
    _ecc: &EccContext,
    store: &KeyStore,
    master_key: &mut MasterKey,
    accept_no_keys: bool,
) -> Result<DecodedKeys, VerifyError> {
    let guard = WipeOnExit(master_key);
    let mut keys = DecodedKeys::new();

    if store.encrypted_count() == 0 {
        if !accept_no_keys {
            debug!("No encrypted keys to check the master key against");
            return Err(VerifyError::WrongKey);
        }
        plaintext_keys(store, &mut keys);
        info!(plaintext = keys.len(), "Wallet has no encrypted keys");
        return Ok(keys);
    }

    for record in store.encrypted_keys() {
        match decrypt_record(&*guard.0, record) {
            Ok(key) => {
                keys.insert(record.key_id(), key);
            }
            Err(reason) => {
                debug!(key_id = %record.key_id(), %reason, "Key record did not decrypt");
                if !keys.is_empty() {
                    warn!(
                        decrypted = keys.len(),
                        "Some keys decrypted but not all; the wallet is probably corrupted"
                    );
                }
                // `keys` drops here and wipes every scalar recovered so far
                return Err(VerifyError::WrongKey);
            }
        }
    }

    let encrypted = keys.len();
    plaintext_keys(store, &mut keys);
    info!(
        encrypted,
        plaintext = keys.len() - encrypted,
        "Master key accepted"
    );
    Ok(keys)
}
