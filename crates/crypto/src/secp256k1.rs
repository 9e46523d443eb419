//! secp256k1 keys for wallet key recovery
//!
//! This module provides the three key types the recovery pipeline moves around:
//! - `SecretKey`: a 32-byte scalar, zeroized on drop
//! - `PublicKey`: a point together with the SEC1 form (compressed or not) it was stored in
//! - `KeyId`: HASH160 of the serialized public key, the wallet's lookup key
//!
//! Uses the k256 crate for secp256k1 curve operations.

use std::fmt;
use std::str::FromStr;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::hash::hash160;
use crate::secure::SecretArray;

/// Length of a secp256k1 secret scalar
pub const SECRET_KEY_SIZE: usize = 32;

/// Length of a compressed SEC1 public key
pub const COMPRESSED_PUBKEY_SIZE: usize = 33;

/// Length of an uncompressed SEC1 public key
pub const UNCOMPRESSED_PUBKEY_SIZE: usize = 65;

/// Key identifier length (RIPEMD-160 output)
pub const KEY_ID_SIZE: usize = 20;

/// secp256k1 secret key (32 bytes scalar)
///
/// The inner k256 key zeroizes its scalar on drop.
#[derive(Clone)]
pub struct SecretKey(k256::SecretKey);

impl SecretKey {
    /// Generate a new random secret key
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self(k256::SecretKey::random(rng))
    }

    /// Load from a raw 32-byte big-endian scalar.
    ///
    /// Fails for the wrong length, zero, or values not below the group order.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidSecretKey);
        }
        k256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSecretKey)
    }

    /// Serialize to bytes (32 bytes scalar) in a zeroizing container
    pub fn to_bytes(&self) -> SecretArray<SECRET_KEY_SIZE> {
        let mut field_bytes = self.0.to_bytes();
        let mut out = [0u8; SECRET_KEY_SIZE];
        out.copy_from_slice(&field_bytes);
        zeroize::Zeroize::zeroize(field_bytes.as_mut_slice());
        SecretArray::new(out)
    }

    /// Derive the public key, serialized compressed or uncompressed
    pub fn public_key(&self, compressed: bool) -> PublicKey {
        PublicKey {
            inner: self.0.public_key(),
            compressed,
        }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// secp256k1 public key plus the SEC1 form it is serialized in
///
/// The serialization form matters: Bitcoin hashes the exact bytes, so the
/// compressed and uncompressed forms of one point have different key ids.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
    compressed: bool,
}

impl PublicKey {
    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 public key
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let compressed = match bytes.len() {
            COMPRESSED_PUBKEY_SIZE => true,
            UNCOMPRESSED_PUBKEY_SIZE => false,
            _ => return Err(CryptoError::InvalidPublicKey),
        };
        if compressed && !matches!(bytes[0], 0x02 | 0x03) {
            return Err(CryptoError::InvalidPublicKey);
        }
        if !compressed && bytes[0] != 0x04 {
            return Err(CryptoError::InvalidPublicKey);
        }
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(|inner| Self { inner, compressed })
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Serialize in the stored SEC1 form (33 or 65 bytes)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner
            .to_encoded_point(self.compressed)
            .as_bytes()
            .to_vec()
    }

    /// Whether this key serializes in compressed form
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// HASH160 of the serialized key
    pub fn key_id(&self) -> KeyId {
        KeyId(hash160(&self.to_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "PublicKey({})", hex::encode(&bytes[..8]))
    }
}

/// Key identifier: RIPEMD160(SHA256(serialized public key))
///
/// Ordering is raw byte order. `Display` follows Bitcoin Core's `uint160`
/// text form, which prints the bytes reversed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub [u8; KEY_ID_SIZE]);

impl KeyId {
    /// Raw identifier bytes
    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self)
    }
}

impl FromStr for KeyId {
    type Err = hex::FromHexError;

    /// Parse the reversed-hex display form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; KEY_ID_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn secret_one() -> SecretKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        SecretKey::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_generator_point_serialization() {
        let secret = secret_one();
        assert_eq!(
            hex::encode(secret.public_key(true).to_bytes()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        let uncompressed = secret.public_key(false).to_bytes();
        assert_eq!(uncompressed.len(), UNCOMPRESSED_PUBKEY_SIZE);
        assert_eq!(uncompressed[0], 0x04);
    }

    #[test]
    fn test_key_id_depends_on_compression() {
        let secret = secret_one();
        let compressed = secret.public_key(true).key_id();
        let uncompressed = secret.public_key(false).key_id();

        assert_eq!(
            hex::encode(compressed.as_bytes()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert_eq!(
            hex::encode(uncompressed.as_bytes()),
            "91b24bf9f5288532960ac687abb035127b1d28a5"
        );
    }

    #[test]
    fn test_key_id_display_is_reversed() {
        let id = secret_one().public_key(true).key_id();
        assert_eq!(id.to_string(), "d63b43f123a3b3d1541c9454d4969119e8761e75");
        assert_eq!(id.to_string().parse::<KeyId>().unwrap(), id);
    }

    #[test]
    fn test_reject_invalid_scalars() {
        assert!(SecretKey::from_slice(&[0u8; 32]).is_err());
        assert!(SecretKey::from_slice(&[0xFF; 32]).is_err());
        assert!(SecretKey::from_slice(&[1u8; 31]).is_err());
    }

    #[test]
    fn test_public_key_parse_roundtrip() {
        let keypair = SecretKey::generate(&mut rand::thread_rng());
        for compressed in [true, false] {
            let pubkey = keypair.public_key(compressed);
            let restored = PublicKey::from_slice(&pubkey.to_bytes()).unwrap();
            assert_eq!(restored, pubkey);
            assert_eq!(restored.is_compressed(), compressed);
        }
    }

    #[test]
    fn test_reject_malformed_public_keys() {
        let pubkey = secret_one().public_key(true).to_bytes();

        // Wrong length
        assert!(PublicKey::from_slice(&pubkey[..32]).is_err());

        // Compressed length with uncompressed prefix
        let mut bad_prefix = pubkey.clone();
        bad_prefix[0] = 0x04;
        assert!(PublicKey::from_slice(&bad_prefix).is_err());

        // x coordinate not on the curve
        let mut off_curve = pubkey;
        off_curve[1..].copy_from_slice(&[0xFF; 32]);
        assert!(PublicKey::from_slice(&off_curve).is_err());
    }

    #[test]
    fn test_secret_bytes_roundtrip() {
        let secret = SecretKey::generate(&mut rand::thread_rng());
        let bytes = secret.to_bytes();
        let restored = SecretKey::from_slice(bytes.expose_secret()).unwrap();
        assert_eq!(restored.public_key(true), secret.public_key(true));
    }

    #[test]
    fn test_debug_output_redacted() {
        let debug = format!("{:?}", secret_one());
        assert!(debug.contains("[REDACTED]"));
    }
}
