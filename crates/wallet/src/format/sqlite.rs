//! Read-only SQLite wallet reader
//!
//! Descriptor wallets are SQLite databases with a single table,
//! `main(key BLOB PRIMARY KEY, value BLOB)`, holding the same serialized
//! records a Berkeley DB wallet does. The database is opened read-only and
//! never written.

use std::io;
use std::path::Path;

use rusqlite::{ErrorCode, OpenFlags};
use tracing::debug;

use super::{ContainerFormat, EntrySource, RawEntry};
use crate::error::{StoreError, StoreResult};

/// Table holding the wallet records
pub const RECORD_TABLE: &str = "main";

/// Reader for SQLite `wallet.dat` files
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFile;

impl EntrySource for SqliteFile {
    fn entries(&self, path: &Path, _data: &[u8]) -> StoreResult<Vec<RawEntry>> {
        read_sqlite(path)
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Sqlite
    }
}

fn unreadable(path: &Path, err: rusqlite::Error) -> StoreError {
    StoreError::Unreadable {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, err.to_string()),
    }
}

fn query_error(path: &Path, err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::PermissionDenied
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked,
        ) => unreadable(path, err),
        _ => StoreError::corrupt(format!("sqlite wallet: {}", err)),
    }
}

/// Read every `(key, value)` row of the wallet's record table, in row order
pub fn read_sqlite(path: &Path) -> StoreResult<Vec<RawEntry>> {
    let conn = rusqlite::Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unreadable(path, e))?;

    let mut stmt = conn
        .prepare(&format!("SELECT key, value FROM {}", RECORD_TABLE))
        .map_err(|e| query_error(path, e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RawEntry::new(
                row.get::<_, Vec<u8>>(0)?,
                row.get::<_, Vec<u8>>(1)?,
            ))
        })
        .map_err(|e| query_error(path, e))?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.map_err(|e| query_error(path, e))?);
    }

    debug!(records = entries.len(), "Read SQLite wallet");
    Ok(entries)
}

/// Writer for synthetic SQLite wallets used in tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) fn write_sqlite_wallet(path: &Path, entries: &[RawEntry]) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE main(key BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL);",
        )
        .unwrap();
        for entry in entries {
            conn.execute(
                "INSERT INTO main (key, value) VALUES (?1, ?2)",
                rusqlite::params![entry.key, entry.value.as_slice()],
            )
            .unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::write_sqlite_wallet;
    use super::*;

    fn sample() -> Vec<RawEntry> {
        vec![
            RawEntry::new(b"\x04ckey\x01".to_vec(), vec![0xAA; 48]),
            RawEntry::new(b"\x05flags".to_vec(), vec![0; 8]),
            RawEntry::new(b"\x07version".to_vec(), vec![0x9c, 0x5d, 0x03, 0x00]),
        ]
    }

    #[test]
    fn test_reads_rows_in_insert_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        write_sqlite_wallet(&path, &sample());

        let entries = SqliteFile.entries(&path, &[]).unwrap();
        assert_eq!(entries.len(), 3);
        for (read, written) in entries.iter().zip(sample()) {
            assert_eq!(read.key, written.key);
            assert_eq!(read.value.as_slice(), written.value.as_slice());
        }
    }

    #[test]
    fn test_missing_record_table_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE other(x INTEGER);").unwrap();
        drop(conn);

        assert!(matches!(read_sqlite(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_text_value_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE main(key BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL);
             INSERT INTO main VALUES (x'01', 42);",
        )
        .unwrap();
        drop(conn);

        assert!(matches!(read_sqlite(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_header_only_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        let mut data = super::super::SQLITE_MAGIC.to_vec();
        data.resize(4096, 0);
        std::fs::write(&path, data).unwrap();

        assert!(matches!(
            read_sqlite(&path),
            Err(StoreError::Corrupt(_) | StoreError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_read_only_open_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.dat");
        write_sqlite_wallet(&path, &sample());
        let before = std::fs::read(&path).unwrap();

        read_sqlite(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
