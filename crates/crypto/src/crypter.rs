//! AES-256-CBC wallet crypter
//!
//! Encrypted wallet keys are the 32-byte secret scalar encrypted under the
//! wallet master key with AES-256-CBC and PKCS#7 padding. The IV is not
//! stored: it is the first 16 bytes of the double SHA-256 of the serialized
//! public key the secret belongs to.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha256d;
use crate::secure::{into_secret_bytes, SecretBytes};

/// AES-256 key length
pub const WALLET_CRYPTO_KEY_SIZE: usize = 32;

/// IV (initialization vector) length for AES-256-CBC
pub const WALLET_CRYPTO_IV_SIZE: usize = 16;

/// Ciphertext length of a well-formed encrypted secret: 32 bytes plus one padding block
pub const ENCRYPTED_SECRET_SIZE: usize = 48;

const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Derive the IV used for the secret belonging to `pubkey`
pub fn iv_for_pubkey(pubkey: &[u8]) -> [u8; WALLET_CRYPTO_IV_SIZE] {
    let digest = sha256d(pubkey);
    let mut iv = [0u8; WALLET_CRYPTO_IV_SIZE];
    iv.copy_from_slice(&digest[..WALLET_CRYPTO_IV_SIZE]);
    iv
}

fn check_params(key: &[u8], iv: &[u8]) -> CryptoResult<()> {
    if key.len() != WALLET_CRYPTO_KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: WALLET_CRYPTO_KEY_SIZE,
            actual: key.len(),
        });
    }
    if iv.len() != WALLET_CRYPTO_IV_SIZE {
        return Err(CryptoError::InvalidIvLength {
            expected: WALLET_CRYPTO_IV_SIZE,
            actual: iv.len(),
        });
    }
    Ok(())
}

/// Encrypt secret data using AES-256-CBC with PKCS#7 padding
///
/// # Arguments
///
/// * `secret` - The plaintext to encrypt
/// * `key` - 32-byte master key
/// * `iv` - 16-byte initialization vector
///
/// # Returns
///
/// Ciphertext bytes, always a non-empty multiple of 16
pub fn encrypt_secret(secret: &[u8], key: &[u8], iv: &[u8]) -> CryptoResult<Vec<u8>> {
    check_params(key, iv)?;

    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| CryptoError::CipherError(e.to_string()))?;

    let padded_len = (secret.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut buf = Zeroizing::new(vec![0u8; padded_len]);
    buf[..secret.len()].copy_from_slice(secret);

    let ciphertext = cipher
        .encrypt_padded_mut::<Pkcs7>(buf.as_mut_slice(), secret.len())
        .map_err(|_| CryptoError::CipherError("padding buffer too small".to_string()))?;

    Ok(ciphertext.to_vec())
}

/// Decrypt secret data using AES-256-CBC with PKCS#7 padding
///
/// # Arguments
///
/// * `ciphertext` - The encrypted data
/// * `key` - 32-byte master key
/// * `iv` - 16-byte initialization vector (same as used for encryption)
///
/// # Returns
///
/// Decrypted secret as SecretBytes. Fails with `InvalidPadding` when the
/// ciphertext length is not a positive multiple of the block size or the
/// padding is malformed, which is what a wrong key usually produces.
pub fn decrypt_secret(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> CryptoResult<SecretBytes> {
    check_params(key, iv)?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidPadding);
    }

    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| CryptoError::CipherError(e.to_string()))?;

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    let plaintext = cipher
        .decrypt_padded_mut::<Pkcs7>(buf.as_mut_slice())
        .map_err(|_| CryptoError::InvalidPadding)?;

    Ok(into_secret_bytes(plaintext.to_vec()))
}
