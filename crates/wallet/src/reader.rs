//! Keystore Reader
//!
//! Loads the key records of one wallet file into a `KeyStore`. The container
//! format and the key manager family are each chosen once, at load time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walletdump_crypto::KeyId;
use zeroize::Zeroizing;

use crate::error::{StoreError, StoreResult};
use crate::format::{read_entries, ContainerFormat, RawEntry};
use crate::record::{
    EncryptedKeyRecord, KeyManagerKind, MasterKeyRecord, PlaintextKeyRecord, WalletRecord,
    WALLET_FLAG_DESCRIPTORS,
};

/// File name looked up when the wallet location is a directory
pub const WALLET_FILE_NAME: &str = "wallet.dat";

/// Key records of one key manager family
#[derive(Debug, Default)]
struct KeyRecords {
    encrypted: BTreeMap<KeyId, EncryptedKeyRecord>,
    plaintext: BTreeMap<KeyId, PlaintextKeyRecord>,
}

impl KeyRecords {
    fn is_empty(&self) -> bool {
        self.encrypted.is_empty() && self.plaintext.is_empty()
    }

    fn add_encrypted(&mut self, record: EncryptedKeyRecord) {
        let key_id = record.key_id();
        if self.encrypted.insert(key_id, record).is_some() {
            warn!(key_id = %key_id, "Duplicate encrypted key record, keeping the later one");
        }
    }

    fn add_plaintext(&mut self, record: PlaintextKeyRecord) {
        let key_id = record.key_id();
        if self.plaintext.insert(key_id, record).is_some() {
            warn!(key_id = %key_id, "Duplicate plaintext key record, keeping the later one");
        }
    }
}

/// The key records loaded from one wallet
///
/// Lifecycle: load, query, discard. Plaintext records hold secrets and wipe
/// them when the store drops.
#[derive(Debug)]
pub struct KeyStore {
    kind: KeyManagerKind,
    format: ContainerFormat,
    encrypted: BTreeMap<KeyId, EncryptedKeyRecord>,
    plaintext: BTreeMap<KeyId, PlaintextKeyRecord>,
    master_keys: Vec<MasterKeyRecord>,
    flags: u64,
}

impl KeyStore {
    /// Build a store from raw records, selecting the key manager family
    ///
    /// Selection order: any legacy key record picks `Legacy` (descriptor
    /// records are then ignored), else any descriptor key record picks
    /// `Descriptor`, else a wallet flagged as descriptor wallet has no key
    /// manager, else the wallet is an empty legacy wallet.
    pub fn from_entries(format: ContainerFormat, entries: &[RawEntry]) -> StoreResult<Self> {
        let mut legacy = KeyRecords::default();
        let mut descriptor = KeyRecords::default();
        let mut master_keys = Vec::new();
        let mut flags = 0u64;
        let mut ignored: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let record = WalletRecord::decode(&entry.key, &entry.value)?;
            let records = match record.key_manager() {
                Some(KeyManagerKind::Descriptor) => &mut descriptor,
                _ => &mut legacy,
            };
            match record {
                WalletRecord::EncryptedKey { record, .. } => records.add_encrypted(record),
                WalletRecord::PlaintextKey { record, .. } => records.add_plaintext(record),
                WalletRecord::MasterKey(mkey) => master_keys.push(mkey),
                WalletRecord::Flags(value) => flags = value,
                WalletRecord::Other(type_name) => *ignored.entry(type_name).or_default() += 1,
            }
        }

        if !ignored.is_empty() {
            debug!(?ignored, "Ignored wallet records not needed for key recovery");
        }

        let (kind, records) = if !legacy.is_empty() {
            if !descriptor.is_empty() {
                warn!(
                    legacy = legacy.encrypted.len() + legacy.plaintext.len(),
                    descriptor = descriptor.encrypted.len() + descriptor.plaintext.len(),
                    "Wallet holds legacy and descriptor keys, legacy preferred"
                );
            }
            (KeyManagerKind::Legacy, legacy)
        } else if !descriptor.is_empty() {
            (KeyManagerKind::Descriptor, descriptor)
        } else if flags & WALLET_FLAG_DESCRIPTORS != 0 {
            return Err(StoreError::NoKeyManager);
        } else {
            (KeyManagerKind::Legacy, legacy)
        };

        Ok(Self {
            kind,
            format,
            encrypted: records.encrypted,
            plaintext: records.plaintext,
            master_keys,
            flags,
        })
    }

    /// Key manager family the records were taken from
    pub fn kind(&self) -> KeyManagerKind {
        self.kind
    }

    /// Container format of the source file
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Wallet flags (0 if the wallet has no `flags` record)
    pub fn flags(&self) -> u64 {
        self.flags
    }

    /// Encrypted key records in ascending key id order
    pub fn encrypted_keys(&self) -> impl Iterator<Item = &EncryptedKeyRecord> {
        self.encrypted.values()
    }

    /// Plaintext key records in ascending key id order
    pub fn plaintext_keys(&self) -> impl Iterator<Item = &PlaintextKeyRecord> {
        self.plaintext.values()
    }

    pub fn encrypted_count(&self) -> usize {
        self.encrypted.len()
    }

    pub fn plaintext_count(&self) -> usize {
        self.plaintext.len()
    }

    /// Passphrase-encrypted master key records (metadata only)
    pub fn master_key_records(&self) -> &[MasterKeyRecord] {
        &self.master_keys
    }

    /// Whether the store holds no key records at all
    pub fn is_empty(&self) -> bool {
        self.encrypted.is_empty() && self.plaintext.is_empty()
    }
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    if source.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_path_buf())
    } else {
        StoreError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Map a wallet location to the wallet file
///
/// A directory means `<dir>/wallet.dat`; anything else is the file itself.
pub fn resolve_wallet_file(location: &Path) -> StoreResult<PathBuf> {
    let meta = fs::metadata(location).map_err(|e| io_error(location, e))?;
    if !meta.is_dir() {
        return Ok(location.to_path_buf());
    }

    let file = location.join(WALLET_FILE_NAME);
    let meta = fs::metadata(&file).map_err(|e| io_error(&file, e))?;
    if meta.is_dir() {
        return Err(StoreError::Unreadable {
            path: file,
            source: io::Error::new(io::ErrorKind::Other, "wallet file is a directory"),
        });
    }
    Ok(file)
}

/// Load the wallet at `location` read-only
pub fn load(location: &Path) -> StoreResult<KeyStore> {
    let path = resolve_wallet_file(location)?;
    let data = Zeroizing::new(fs::read(&path).map_err(|e| io_error(&path, e))?);

    let (format, entries) = read_entries(&path, &data)?;
    let store = KeyStore::from_entries(format, &entries)?;

    info!(
        path = %path.display(),
        format = %format,
        key_manager = %store.kind(),
        encrypted = store.encrypted_count(),
        plaintext = store.plaintext_count(),
        master_keys = store.master_key_records().len(),
        "Loaded wallet"
    );
    Ok(store)
}
