//! Wallet container formats
//!
//! A wallet file is sniffed once and handed to the matching container reader.
//! Every reader yields the same thing: the wallet's raw `(key, value)` pairs
//! in file order.
//!
//! # Available Formats
//!
//! - **dump**: text export written by `bitcoin-wallet dump`
//! - **bdb**: legacy Berkeley DB btree `wallet.dat`, read without libdb
//! - **sqlite**: descriptor wallet database, opened read-only

pub mod bdb;
pub mod dump;
pub mod sqlite;

use std::fmt;
use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{StoreError, StoreResult};

pub use bdb::BerkeleyDbFile;
pub use dump::{write_dump, DumpFile};
pub use sqlite::SqliteFile;

/// Header of an SQLite 3 database
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// One serialized wallet record
///
/// Values of plaintext key records hold private keys, so the value buffer is
/// wiped on drop.
#[derive(Clone)]
pub struct RawEntry {
    pub key: Vec<u8>,
    pub value: Zeroizing<Vec<u8>>,
}

impl RawEntry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value: Zeroizing::new(value),
        }
    }
}

impl fmt::Debug for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEntry")
            .field("key", &hex::encode(&self.key))
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Container format of a wallet file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Text dump (`BITCOIN_CORE_WALLET_DUMP`)
    Dump,
    /// Berkeley DB btree
    BerkeleyDb,
    /// SQLite database
    Sqlite,
}

impl ContainerFormat {
    /// Identify the container from the leading bytes of the file
    pub fn sniff(data: &[u8]) -> StoreResult<Self> {
        if data.starts_with(SQLITE_MAGIC) {
            return Ok(ContainerFormat::Sqlite);
        }
        if data.starts_with(dump::DUMP_MAGIC.as_bytes()) {
            return Ok(ContainerFormat::Dump);
        }
        if bdb::has_btree_magic(data) {
            return Ok(ContainerFormat::BerkeleyDb);
        }
        Err(StoreError::corrupt("unrecognised wallet file format"))
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Dump => write!(f, "dump"),
            ContainerFormat::BerkeleyDb => write!(f, "bdb"),
            ContainerFormat::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Trait for container reader implementations
pub trait EntrySource {
    /// Parse the whole file into raw records, in file order
    ///
    /// `data` is the file's content; readers that need their own handle on
    /// the file open `path` instead.
    fn entries(&self, path: &Path, data: &[u8]) -> StoreResult<Vec<RawEntry>>;

    /// The format this reader handles
    fn format(&self) -> ContainerFormat;
}

/// Pick the reader for a sniffed format
pub fn source_for(format: ContainerFormat) -> StoreResult<Box<dyn EntrySource>> {
    match format {
        ContainerFormat::Dump => Ok(Box::new(DumpFile)),
        ContainerFormat::BerkeleyDb => Ok(Box::new(BerkeleyDbFile)),
        ContainerFormat::Sqlite => Ok(Box::new(SqliteFile)),
    }
}

/// Sniff `data`, the content of `path`, and read every raw record from it
pub fn read_entries(path: &Path, data: &[u8]) -> StoreResult<(ContainerFormat, Vec<RawEntry>)> {
    let format = ContainerFormat::sniff(data)?;
    let source = source_for(format)?;
    let entries = source.entries(path, data)?;
    Ok((source.format(), entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_sqlite() {
        let mut data = SQLITE_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 84]);
        assert_eq!(
            ContainerFormat::sniff(&data).unwrap(),
            ContainerFormat::Sqlite
        );
        assert_eq!(
            source_for(ContainerFormat::Sqlite).unwrap().format(),
            ContainerFormat::Sqlite
        );
    }

    #[test]
    fn test_sniff_dump() {
        let data = b"BITCOIN_CORE_WALLET_DUMP,1\n";
        assert_eq!(ContainerFormat::sniff(data).unwrap(), ContainerFormat::Dump);
    }

    #[test]
    fn test_sniff_garbage() {
        assert!(matches!(
            ContainerFormat::sniff(b"not a wallet at all"),
            Err(StoreError::Corrupt(_))
        ));
        assert!(ContainerFormat::sniff(&[]).is_err());
    }

    #[test]
    fn test_raw_entry_debug_hides_value() {
        let entry = RawEntry::new(b"key".to_vec(), vec![0xAB; 4]);
        let debug = format!("{:?}", entry);
        assert!(debug.contains("value_len"));
        assert!(!debug.contains("abab"));
    }
}
