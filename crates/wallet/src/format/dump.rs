//! Text dump reader
//!
//! Layout, one record per line:
//!
//! ```text
//! BITCOIN_CORE_WALLET_DUMP,1
//! format,bdb
//! <hex key>,<hex value>
//! ...
//! checksum,<hex sha256d of every preceding line, newlines included>
//! ```

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;
use walletdump_crypto::hash::sha256d;
use zeroize::Zeroizing;

use super::{ContainerFormat, EntrySource, RawEntry};
use crate::error::{StoreError, StoreResult};

/// First field of the header line
pub const DUMP_MAGIC: &str = "BITCOIN_CORE_WALLET_DUMP";

/// The only dump version written by Bitcoin Core
pub const DUMP_VERSION: u32 = 1;

const CHECKSUM_KEY: &str = "checksum";
const FORMAT_KEY: &str = "format";
const KNOWN_FORMATS: [&str; 3] = ["bdb", "bdb_ro", "sqlite"];

/// Reader for `bitcoin-wallet dump` files
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpFile;

impl EntrySource for DumpFile {
    fn entries(&self, _path: &Path, data: &[u8]) -> StoreResult<Vec<RawEntry>> {
        parse_dump(data)
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Dump
    }
}

fn split_field(line: &str, lineno: usize) -> StoreResult<(&str, &str)> {
    line.split_once(',')
        .ok_or_else(|| StoreError::corrupt(format!("dump line {}: missing ','", lineno)))
}

fn decode_hex(field: &str, lineno: usize) -> StoreResult<Vec<u8>> {
    hex::decode(field)
        .map_err(|e| StoreError::corrupt(format!("dump line {}: invalid hex: {}", lineno, e)))
}

/// Parse a dump file into raw records, verifying header and checksum
pub fn parse_dump(data: &[u8]) -> StoreResult<Vec<RawEntry>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| StoreError::corrupt("dump file is not valid UTF-8"))?;

    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut lines = text.split_inclusive('\n');

    // Header
    let header = lines
        .next()
        .ok_or_else(|| StoreError::corrupt("empty dump file"))?;
    offset += header.len();
    let (magic, version) = split_field(header.trim_end_matches('\n'), 1)?;
    if magic != DUMP_MAGIC || !header.ends_with('\n') {
        return Err(StoreError::corrupt("dump header magic mismatch"));
    }
    if version.parse::<u32>().ok() != Some(DUMP_VERSION) {
        return Err(StoreError::corrupt(format!(
            "unsupported dump version '{}', expected {}",
            version, DUMP_VERSION
        )));
    }

    // Format line
    let format_line = lines
        .next()
        .ok_or_else(|| StoreError::corrupt("dump file missing format line"))?;
    offset += format_line.len();
    let (key, db_format) = split_field(format_line.trim_end_matches('\n'), 2)?;
    if key != FORMAT_KEY || !format_line.ends_with('\n') {
        return Err(StoreError::corrupt("dump file missing format line"));
    }
    if !KNOWN_FORMATS.contains(&db_format) {
        return Err(StoreError::corrupt(format!(
            "unknown dump database format '{}'",
            db_format
        )));
    }

    for (index, line) in lines.enumerate() {
        let lineno = index + 3;
        let body = line.strip_suffix('\n');
        let (key, value) = split_field(body.unwrap_or(line), lineno)?;

        if key == CHECKSUM_KEY {
            let expected = sha256d(&data[..offset]);
            let stored = decode_hex(value, lineno)?;
            if stored.as_slice() != expected.as_slice() {
                return Err(StoreError::corrupt("dump checksum mismatch"));
            }
            offset += line.len();
            if offset != data.len() {
                return Err(StoreError::corrupt("unexpected data after dump checksum"));
            }
            debug!(records = entries.len(), format = db_format, "Parsed wallet dump");
            return Ok(entries);
        }

        if body.is_none() {
            return Err(StoreError::corrupt(format!(
                "dump line {}: unterminated record",
                lineno
            )));
        }
        let key = decode_hex(key, lineno)?;
        let value = decode_hex(value, lineno)?;
        entries.push(RawEntry::new(key, value));
        offset += line.len();
    }

    Err(StoreError::corrupt("dump file missing checksum"))
}

/// Render raw records as a dump file, checksum included
///
/// `db_format` is the format tag written on the second line (`bdb` or
/// `sqlite`). The output can hold unencrypted private keys, so it wipes
/// itself on drop.
pub fn write_dump(db_format: &str, entries: &[RawEntry]) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::new());
    // Writing to a String cannot fail
    let _ = writeln!(out, "{},{}", DUMP_MAGIC, DUMP_VERSION);
    let _ = writeln!(out, "{},{}", FORMAT_KEY, db_format);
    for entry in entries {
        let _ = writeln!(
            out,
            "{},{}",
            hex::encode(&entry.key),
            hex::encode(entry.value.as_slice())
        );
    }
    let checksum = sha256d(out.as_bytes());
    let _ = writeln!(out, "{},{}", CHECKSUM_KEY, hex::encode(checksum));
    out
}
