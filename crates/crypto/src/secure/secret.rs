//! Secret wrapper utilities for consistent secret handling
//!
//! Provides type aliases and small containers around the `secrecy` crate for
//! decrypted key bytes moving through the recovery pipeline.

use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroize;

/// A secret byte vector that is zeroized on drop.
///
/// Used for variable-length plaintext such as the output of the wallet
/// crypter, before its length has been checked.
///
/// # Example
///
/// ```rust
/// use walletdump_crypto::secure::SecretBytes;
/// use secrecy::ExposeSecret;
///
/// let secret = SecretBytes::new(Box::new(vec![1, 2, 3, 4]));
/// assert_eq!(secret.expose_secret(), &vec![1, 2, 3, 4]);
/// ```
pub type SecretBytes = SecretBox<Vec<u8>>;

/// A fixed-size secret byte array.
///
/// Unlike `SecretBytes`, this is for fixed-size secrets like scalars.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SecretArray<const N: usize> {
    inner: [u8; N],
}

impl<const N: usize> SecretArray<N> {
    /// Create a new secret array from bytes.
    pub fn new(bytes: [u8; N]) -> Self {
        Self { inner: bytes }
    }

    /// Copy a slice of exactly `N` bytes into a new secret array.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != N {
            return None;
        }
        let mut out = Self { inner: [0u8; N] };
        out.inner.copy_from_slice(bytes);
        Some(out)
    }

    /// Copy `bytes` straight into a new secret array.
    ///
    /// The copy is written into the container itself, so no bare array
    /// holding the secret is left behind.
    pub fn copy_from(bytes: &[u8; N]) -> Self {
        let mut out = Self { inner: [0u8; N] };
        out.inner.copy_from_slice(bytes);
        out
    }
}

impl<const N: usize> ExposeSecret<[u8; N]> for SecretArray<N> {
    fn expose_secret(&self) -> &[u8; N] {
        &self.inner
    }
}

impl<const N: usize> std::fmt::Debug for SecretArray<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretArray")
            .field("length", &N)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

// Don't implement Clone to prevent accidental copies

/// Wrap an owned buffer so it is wiped when dropped.
pub fn into_secret_bytes(bytes: Vec<u8>) -> SecretBytes {
    SecretBox::new(Box::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_bytes() {
        let secret = into_secret_bytes(vec![1, 2, 3, 4, 5]);
        assert_eq!(secret.expose_secret(), &vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_secret_array() {
        let arr = [0xABu8; 32];
        let secret = SecretArray::new(arr);
        assert_eq!(secret.expose_secret(), &arr);
    }

    #[test]
    fn test_secret_array_from_slice_checks_length() {
        assert!(SecretArray::<4>::from_slice(&[1, 2, 3]).is_none());
        let secret = SecretArray::<3>::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(secret.expose_secret(), &[1, 2, 3]);
    }

    #[test]
    fn test_secret_array_copy_from_leaves_source_intact() {
        let source = [0x5Cu8; 32];
        let secret = SecretArray::copy_from(&source);
        assert_eq!(secret.expose_secret(), &source);
        assert_eq!(source, [0x5Cu8; 32]);
    }

    #[test]
    fn test_secret_array_debug() {
        let secret = SecretArray::new([0xABu8; 32]);
        let debug = format!("{:?}", secret);

        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("length"));
        assert!(!debug.contains("171")); // 0xAB = 171
    }
}
