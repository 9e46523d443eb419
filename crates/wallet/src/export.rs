//! Key Exporter
//!
//! Serializes recovered keys as WIF strings in ascending key id order. A key
//! whose public key cannot be re-derived to its key id is skipped with a
//! warning; the rest of the export continues.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};
use walletdump_crypto::{encode_wif, EccContext, KeyId, Network, SecretKey};
use zeroize::Zeroizing;

use crate::verifier::{DecodedKeys, DecodedPrivateKey};

/// One exported key
///
/// The WIF string is secret: it is wiped on drop and redacted from `Debug`.
pub struct ExportedKey {
    key_id: KeyId,
    wif: Zeroizing<String>,
}

impl ExportedKey {
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn wif(&self) -> &str {
        &self.wif
    }
}

impl fmt::Debug for ExportedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedKey")
            .field("key_id", &self.key_id)
            .field("wif", &"[REDACTED]")
            .finish()
    }
}

/// Non-fatal, per-key export failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    /// The recovered bytes are not a valid secp256k1 scalar
    #[error("invalid private key")]
    InvalidScalar(KeyId),

    /// The scalar's public key hashes to a different key id
    #[error("private key does not match key id")]
    KeyIdMismatch(KeyId),
}

impl ExportWarning {
    pub fn key_id(&self) -> KeyId {
        match self {
            ExportWarning::InvalidScalar(id) | ExportWarning::KeyIdMismatch(id) => *id,
        }
    }
}

/// Result of exporting a set of recovered keys
#[derive(Debug)]
pub struct ExportReport {
    pub network: Network,
    pub exported: Vec<ExportedKey>,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    /// Keys were present but none could be exported
    pub fn all_failed(&self) -> bool {
        self.exported.is_empty() && !self.warnings.is_empty()
    }
}

fn export_one(
    key_id: KeyId,
    key: &DecodedPrivateKey,
    network: Network,
) -> Result<Zeroizing<String>, ExportWarning> {
    let secret =
        SecretKey::from_slice(key.secret()).map_err(|_| ExportWarning::InvalidScalar(key_id))?;
    if secret.public_key(key.is_compressed()).key_id() != key_id {
        return Err(ExportWarning::KeyIdMismatch(key_id));
    }
    Ok(encode_wif(key.secret(), key.is_compressed(), network))
}

/// Export every recovered key as WIF for `network`
///
/// Consumes `keys`; each scalar is wiped as soon as its entry is processed.
pub fn export_all(_ecc: &EccContext, keys: DecodedKeys, network: Network) -> ExportReport {
    let mut exported = Vec::with_capacity(keys.len());
    let mut warnings = Vec::new();

    for (key_id, key) in keys {
        match export_one(key_id, &key, network) {
            Ok(wif) => exported.push(ExportedKey { key_id, wif }),
            Err(warning) => {
                warn!(key_id = %key_id, %warning, "Skipping key");
                warnings.push(warning);
            }
        }
    }

    info!(
        network = %network,
        exported = exported.len(),
        skipped = warnings.len(),
        "Exported keys"
    );
    ExportReport {
        network,
        exported,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletdump_crypto::{decode_wif, ExposeSecret, SecretArray};

    fn decoded(byte: u8, compressed: bool) -> (KeyId, DecodedPrivateKey) {
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        (
            secret.public_key(compressed).key_id(),
            DecodedPrivateKey::new(secret.to_bytes(), compressed),
        )
    }

    #[test]
    fn test_export_in_key_id_order() {
        let ecc = EccContext::acquire().unwrap();
        let keys: DecodedKeys = [decoded(1, true), decoded(2, false), decoded(3, true)]
            .into_iter()
            .collect();

        let report = export_all(&ecc, keys, Network::Main);
        assert_eq!(report.exported.len(), 3);
        assert!(report.warnings.is_empty());

        let ids: Vec<KeyId> = report.exported.iter().map(|k| k.key_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_wif_decodes_back_to_scalar() {
        let ecc = EccContext::acquire().unwrap();
        let (id, key) = decoded(7, false);
        let report = export_all(&ecc, DecodedKeys::from([(id, key)]), Network::Regtest);

        let wif = decode_wif(report.exported[0].wif()).unwrap();
        assert_eq!(wif.secret.expose_secret(), &[7u8; 32]);
        assert!(!wif.compressed);
        assert_eq!(wif.network.wif_version(), Network::Regtest.wif_version());
    }

    #[test]
    fn test_known_wif_for_secret_one() {
        let ecc = EccContext::acquire().unwrap();
        let mut one = [0u8; 32];
        one[31] = 1;
        let secret = SecretKey::from_slice(&one).unwrap();
        let keys = DecodedKeys::from([(
            secret.public_key(true).key_id(),
            DecodedPrivateKey::new(SecretArray::new(one), true),
        )]);

        let report = export_all(&ecc, keys, Network::Main);
        assert_eq!(
            report.exported[0].key_id().to_string(),
            "d63b43f123a3b3d1541c9454d4969119e8761e75"
        );
        assert_eq!(
            report.exported[0].wif(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn test_mismatched_key_skipped() {
        let ecc = EccContext::acquire().unwrap();
        let (good_id, good) = decoded(1, true);
        let (other_id, _) = decoded(2, true);
        // Scalar 3 filed under the key id of scalar 2
        let (_, wrong) = decoded(3, true);

        let keys = DecodedKeys::from([(good_id, good), (other_id, wrong)]);
        let report = export_all(&ecc, keys, Network::Main);

        assert_eq!(report.exported.len(), 1);
        assert_eq!(report.warnings, vec![ExportWarning::KeyIdMismatch(other_id)]);
        assert!(!report.all_failed());
    }

    #[test]
    fn test_invalid_scalar_skipped() {
        let ecc = EccContext::acquire().unwrap();
        let (id, _) = decoded(1, true);
        let keys = DecodedKeys::from([(id, DecodedPrivateKey::new(SecretArray::new([0u8; 32]), true))]);

        let report = export_all(&ecc, keys, Network::Main);
        assert!(report.all_failed());
        assert_eq!(report.warnings[0].key_id(), id);
        assert_eq!(report.warnings[0].to_string(), "invalid private key");
    }

    #[test]
    fn test_compression_flag_changes_key_id() {
        let ecc = EccContext::acquire().unwrap();
        let (compressed_id, _) = decoded(5, true);
        // Uncompressed scalar filed under the compressed key id
        let (_, uncompressed) = decoded(5, false);
        let report = export_all(
            &ecc,
            DecodedKeys::from([(compressed_id, uncompressed)]),
            Network::Main,
        );
        assert_eq!(report.warnings, vec![ExportWarning::KeyIdMismatch(compressed_id)]);
    }

    #[test]
    fn test_debug_redacts_wif() {
        let ecc = EccContext::acquire().unwrap();
        let (id, key) = decoded(1, true);
        let report = export_all(&ecc, DecodedKeys::from([(id, key)]), Network::Main);
        let debug = format!("{:?}", report);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(report.exported[0].wif()));
    }
}
