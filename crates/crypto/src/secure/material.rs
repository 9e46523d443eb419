//! Master key container with automatic memory zeroing
//!
//! `MasterKey` holds the 32-byte symmetric key that decrypts every encrypted
//! key record in a wallet. It ensures that:
//! - The key is zeroized when the struct is dropped
//! - Debug output doesn't expose the actual bytes
//! - The struct cannot be accidentally cloned
//! - A holder can wipe it early and later confirm the wipe happened

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

/// Size of the wallet master key in bytes
pub const MASTER_KEY_SIZE: usize = 32;

/// Memory-safe container for the wallet master key.
///
/// This struct intentionally does NOT implement `Clone`; the verifier borrows
/// it mutably and wipes it in place.
///
/// # Example
///
/// ```rust
/// use walletdump_crypto::secure::MasterKey;
///
/// let mut key = MasterKey::from_slice(&[7u8; 32]).unwrap();
/// assert_eq!(key.expose()[0], 7);
///
/// key.wipe();
/// assert!(key.is_wiped());
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_SIZE],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn new(bytes: [u8; MASTER_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Create a master key from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != MASTER_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: MASTER_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = Self::new([0u8; MASTER_KEY_SIZE]);
        key.bytes.copy_from_slice(bytes);
        Ok(key)
    }

    /// Parse a master key from exactly 64 hex characters.
    ///
    /// Both cases are accepted. The decode buffer is wiped on every path.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        if text.len() != MASTER_KEY_SIZE * 2 {
            return Err(CryptoError::InvalidMasterKeyHex(format!(
                "expected {} characters, got {}",
                MASTER_KEY_SIZE * 2,
                text.len()
            )));
        }
        let mut buf = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
        hex::decode_to_slice(text, buf.as_mut_slice())
            .map_err(|e| CryptoError::InvalidMasterKeyHex(e.to_string()))?;
        Self::from_slice(buf.as_slice())
    }

    /// Borrow the key bytes.
    ///
    /// # Security
    ///
    /// The returned reference should be used immediately and not stored.
    #[inline]
    pub fn expose(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.bytes
    }

    /// Overwrite the key with zeros in place.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }

    /// Whether every byte of the key is zero.
    pub fn is_wiped(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

// Custom Debug implementation to prevent exposing the key in logs
impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .field("wiped", &self.is_wiped())
            .finish()
    }
}
