//! Wallet record decoding
//!
//! Turns one raw `(key, value)` pair into a typed record. Key records are
//! validated here (public key on the curve, DER framing, integrity hash);
//! secrets are never decrypted at this stage.

use std::fmt;

use walletdump_crypto::hash::sha256d;
use walletdump_crypto::{
    encrypt_secret, iv_for_pubkey, CryptoResult, ExposeSecret, KeyId, MasterKey, PublicKey,
    SecretArray, SecretKey, SECRET_KEY_SIZE, WALLET_CRYPTO_IV_SIZE,
};
use zeroize::Zeroizing;

use crate::error::{StoreError, StoreResult};
use crate::format::RawEntry;
use crate::serialize::{write_string, write_var_bytes, RecordReader};

/// Wallet flag set on descriptor wallets
pub const WALLET_FLAG_DESCRIPTORS: u64 = 1 << 34;

/// Record type strings
pub mod record_type {
    pub const CRYPTED_KEY: &str = "ckey";
    pub const KEY: &str = "key";
    pub const MASTER_KEY: &str = "mkey";
    pub const DESCRIPTOR_CRYPTED_KEY: &str = "walletdescriptorckey";
    pub const DESCRIPTOR_KEY: &str = "walletdescriptorkey";
    pub const FLAGS: &str = "flags";
}

/// Descriptor identifier (uint256) owning a descriptor key record
pub type DescriptorId = [u8; 32];

/// Family of key records a wallet keeps its keys in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyManagerKind {
    /// `ckey` / `key` records
    Legacy,
    /// `walletdescriptorckey` / `walletdescriptorkey` records
    Descriptor,
}

impl KeyManagerKind {
    fn of(descriptor_id: &Option<DescriptorId>) -> Self {
        match descriptor_id {
            Some(_) => KeyManagerKind::Descriptor,
            None => KeyManagerKind::Legacy,
        }
    }
}

impl fmt::Display for KeyManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyManagerKind::Legacy => write!(f, "legacy"),
            KeyManagerKind::Descriptor => write!(f, "descriptor"),
        }
    }
}

/// A private key encrypted under the wallet master key
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedKeyRecord {
    key_id: KeyId,
    pubkey: PublicKey,
    ciphertext: Vec<u8>,
}

impl EncryptedKeyRecord {
    pub fn new(pubkey: PublicKey, ciphertext: Vec<u8>) -> Self {
        Self {
            key_id: pubkey.key_id(),
            pubkey,
            ciphertext,
        }
    }

    /// Encrypt `secret` under `master_key` the way the wallet does
    pub fn seal(master_key: &MasterKey, secret: &SecretKey, compressed: bool) -> CryptoResult<Self> {
        let pubkey = secret.public_key(compressed);
        let iv = iv_for_pubkey(&pubkey.to_bytes());
        let ciphertext = encrypt_secret(
            secret.to_bytes().expose_secret(),
            master_key.expose(),
            &iv,
        )?;
        Ok(Self::new(pubkey, ciphertext))
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// IV derived from the stored public key
    pub fn iv(&self) -> [u8; WALLET_CRYPTO_IV_SIZE] {
        iv_for_pubkey(&self.pubkey.to_bytes())
    }
}

impl fmt::Debug for EncryptedKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKeyRecord")
            .field("key_id", &self.key_id)
            .field("compressed", &self.pubkey.is_compressed())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// An unencrypted private key record
pub struct PlaintextKeyRecord {
    key_id: KeyId,
    pubkey: PublicKey,
    secret: SecretArray<SECRET_KEY_SIZE>,
}

impl PlaintextKeyRecord {
    pub fn new(pubkey: PublicKey, secret: SecretArray<SECRET_KEY_SIZE>) -> Self {
        Self {
            key_id: pubkey.key_id(),
            pubkey,
            secret,
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    /// The raw 32-byte scalar, unchecked
    pub fn secret(&self) -> &[u8; SECRET_KEY_SIZE] {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for PlaintextKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextKeyRecord")
            .field("key_id", &self.key_id)
            .field("compressed", &self.pubkey.is_compressed())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Passphrase-encrypted master key (`mkey`), kept as metadata only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKeyRecord {
    pub id: u32,
    pub crypted_key: Vec<u8>,
    pub salt: Vec<u8>,
    pub derivation_method: u32,
    pub derive_iterations: u32,
    pub other_params: Vec<u8>,
}

/// One decoded wallet record
#[derive(Debug)]
pub enum WalletRecord {
    EncryptedKey {
        descriptor_id: Option<DescriptorId>,
        record: EncryptedKeyRecord,
    },
    PlaintextKey {
        descriptor_id: Option<DescriptorId>,
        record: PlaintextKeyRecord,
    },
    MasterKey(MasterKeyRecord),
    Flags(u64),
    /// Any record type the key dump does not need
    Other(String),
}

impl WalletRecord {
    /// Decode a raw record
    pub fn decode(key: &[u8], value: &[u8]) -> StoreResult<Self> {
        let mut key_reader = RecordReader::new(key);
        let type_name = key_reader.read_string()?;
        let mut value_reader = RecordReader::new(value);

        decode_fields(type_name, &mut key_reader, &mut value_reader).map_err(|e| match e {
            StoreError::Corrupt(msg) => StoreError::Corrupt(format!("{} record: {}", type_name, msg)),
            other => other,
        })
    }

    /// Serialize back into a raw record
    pub fn encode(&self) -> RawEntry {
        let mut key = Vec::new();
        let mut value = Zeroizing::new(Vec::new());
        match self {
            WalletRecord::EncryptedKey {
                descriptor_id,
                record,
            } => {
                match descriptor_id {
                    Some(id) => {
                        write_string(&mut key, record_type::DESCRIPTOR_CRYPTED_KEY);
                        key.extend_from_slice(id);
                    }
                    None => write_string(&mut key, record_type::CRYPTED_KEY),
                }
                write_var_bytes(&mut key, &record.pubkey.to_bytes());
                write_var_bytes(&mut value, &record.ciphertext);
            }
            WalletRecord::PlaintextKey {
                descriptor_id,
                record,
            } => {
                match descriptor_id {
                    Some(id) => {
                        write_string(&mut key, record_type::DESCRIPTOR_KEY);
                        key.extend_from_slice(id);
                    }
                    None => write_string(&mut key, record_type::KEY),
                }
                let pubkey = record.pubkey.to_bytes();
                write_var_bytes(&mut key, &pubkey);
                let der = encode_der_secret(record.secret(), &pubkey);
                write_var_bytes(&mut value, &der);
                value.extend_from_slice(&key_hash(&pubkey, &der));
            }
            WalletRecord::MasterKey(mkey) => {
                write_string(&mut key, record_type::MASTER_KEY);
                key.extend_from_slice(&mkey.id.to_le_bytes());
                write_var_bytes(&mut value, &mkey.crypted_key);
                write_var_bytes(&mut value, &mkey.salt);
                value.extend_from_slice(&mkey.derivation_method.to_le_bytes());
                value.extend_from_slice(&mkey.derive_iterations.to_le_bytes());
                write_var_bytes(&mut value, &mkey.other_params);
            }
            WalletRecord::Flags(flags) => {
                write_string(&mut key, record_type::FLAGS);
                value.extend_from_slice(&flags.to_le_bytes());
            }
            WalletRecord::Other(name) => write_string(&mut key, name),
        }
        RawEntry { key, value }
    }

    /// Key manager family this record belongs to, if any
    pub fn key_manager(&self) -> Option<KeyManagerKind> {
        match self {
            WalletRecord::EncryptedKey { descriptor_id, .. }
            | WalletRecord::PlaintextKey { descriptor_id, .. } => {
                Some(KeyManagerKind::of(descriptor_id))
            }
            _ => None,
        }
    }
}

fn decode_fields(
    type_name: &str,
    key: &mut RecordReader<'_>,
    value: &mut RecordReader<'_>,
) -> StoreResult<WalletRecord> {
    match type_name {
        record_type::CRYPTED_KEY | record_type::DESCRIPTOR_CRYPTED_KEY => {
            let descriptor_id = if type_name == record_type::DESCRIPTOR_CRYPTED_KEY {
                Some(key.read_array::<32>()?)
            } else {
                None
            };
            let pubkey = parse_pubkey(key.read_var_bytes()?)?;
            let ciphertext = value.read_var_bytes()?.to_vec();
            Ok(WalletRecord::EncryptedKey {
                descriptor_id,
                record: EncryptedKeyRecord::new(pubkey, ciphertext),
            })
        }
        record_type::KEY | record_type::DESCRIPTOR_KEY => {
            let descriptor = type_name == record_type::DESCRIPTOR_KEY;
            let descriptor_id = if descriptor {
                Some(key.read_array::<32>()?)
            } else {
                None
            };
            let pubkey_bytes = key.read_var_bytes()?;
            let pubkey = parse_pubkey(pubkey_bytes)?;
            let der = value.read_var_bytes()?;

            // Legacy records may omit the hash or store it as zeros
            let hash = if descriptor || value.remaining() >= 32 {
                Some(value.read_array::<32>()?)
            } else {
                None
            };
            match hash {
                Some(hash) if descriptor || hash != [0u8; 32] => {
                    if key_hash(pubkey_bytes, der) != hash {
                        return Err(StoreError::corrupt("private key integrity hash mismatch"));
                    }
                }
                _ => {}
            }

            let secret = parse_der_secret(der)?;
            Ok(WalletRecord::PlaintextKey {
                descriptor_id,
                record: PlaintextKeyRecord::new(pubkey, secret),
            })
        }
        record_type::MASTER_KEY => {
            let id = key.read_u32_le()?;
            Ok(WalletRecord::MasterKey(MasterKeyRecord {
                id,
                crypted_key: value.read_var_bytes()?.to_vec(),
                salt: value.read_var_bytes()?.to_vec(),
                derivation_method: value.read_u32_le()?,
                derive_iterations: value.read_u32_le()?,
                other_params: value.read_var_bytes()?.to_vec(),
            }))
        }
        record_type::FLAGS => Ok(WalletRecord::Flags(value.read_u64_le()?)),
        other => Ok(WalletRecord::Other(other.to_string())),
    }
}

fn parse_pubkey(bytes: &[u8]) -> StoreResult<PublicKey> {
    PublicKey::from_slice(bytes).map_err(|_| {
        StoreError::corrupt(format!("invalid public key {}", hex::encode(bytes)))
    })
}

/// Integrity hash stored next to plaintext keys
fn key_hash(pubkey: &[u8], der: &[u8]) -> [u8; 32] {
    let mut buf = Zeroizing::new(Vec::with_capacity(pubkey.len() + der.len()));
    buf.extend_from_slice(pubkey);
    buf.extend_from_slice(der);
    sha256d(&buf)
}

/// Extract the 32-byte secret from a DER `ECPrivateKey`
///
/// Accepts what Bitcoin Core's importer accepts: a SEQUENCE with a long-form
/// length, version 1, and an OCTET STRING of at most 32 bytes. Trailing
/// parameters and public key are ignored.
pub fn parse_der_secret(der: &[u8]) -> StoreResult<SecretArray<SECRET_KEY_SIZE>> {
    let bad = |what: &str| StoreError::corrupt(format!("malformed DER private key: {}", what));

    if der.first() != Some(&0x30) {
        return Err(bad("missing SEQUENCE"));
    }
    let len_byte = *der.get(1).ok_or_else(|| bad("missing length"))?;
    if len_byte & 0x80 == 0 {
        return Err(bad("short-form length"));
    }
    let len_bytes = usize::from(len_byte & 0x7f);
    if !(1..=2).contains(&len_bytes) {
        return Err(bad("length of length out of range"));
    }
    let len_field = der.get(2..2 + len_bytes).ok_or_else(|| bad("truncated length"))?;
    let len = len_field
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    let body = der
        .get(2 + len_bytes..2 + len_bytes + len)
        .ok_or_else(|| bad("truncated body"))?;

    if body.get(..3) != Some(&[0x02, 0x01, 0x01][..]) {
        return Err(bad("unexpected version"));
    }
    if body.get(3) != Some(&0x04) {
        return Err(bad("missing OCTET STRING"));
    }
    let secret_len = usize::from(*body.get(4).ok_or_else(|| bad("truncated OCTET STRING"))?);
    if secret_len > SECRET_KEY_SIZE {
        return Err(bad("secret longer than 32 bytes"));
    }
    let secret = body
        .get(5..5 + secret_len)
        .ok_or_else(|| bad("truncated secret"))?;

    let mut out = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
    out[SECRET_KEY_SIZE - secret_len..].copy_from_slice(secret);
    SecretArray::from_slice(out.as_slice()).ok_or_else(|| bad("secret length"))
}

/// Encode a secret as a compact SEC1 `ECPrivateKey` with the secp256k1 OID
/// and the public key attached
pub fn encode_der_secret(secret: &[u8; SECRET_KEY_SIZE], pubkey: &[u8]) -> Zeroizing<Vec<u8>> {
    const SECP256K1_OID: [u8; 9] = [0xa0, 0x07, 0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x0a];

    let mut body = Zeroizing::new(Vec::with_capacity(128));
    body.extend_from_slice(&[0x02, 0x01, 0x01, 0x04, SECRET_KEY_SIZE as u8]);
    body.extend_from_slice(secret);
    body.extend_from_slice(&SECP256K1_OID);
    body.extend_from_slice(&[0xa1, (pubkey.len() + 3) as u8, 0x03, (pubkey.len() + 1) as u8, 0x00]);
    body.extend_from_slice(pubkey);

    let mut der = Zeroizing::new(Vec::with_capacity(body.len() + 3));
    der.extend_from_slice(&[0x30, 0x81, body.len() as u8]);
    der.extend_from_slice(&body);
    der
}
