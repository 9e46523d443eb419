//! Bitcoin Core record serialization
//!
//! Wallet records are keyed by a CompactSize-prefixed type string followed by
//! type-specific fields. Integers are little endian, byte vectors carry a
//! CompactSize length prefix.

use crate::error::{StoreError, StoreResult};

/// Largest vector length Bitcoin Core will deserialize
pub const MAX_SERIALIZED_SIZE: u64 = 0x0200_0000;

/// Cursor over one serialized key or value
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> StoreResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(StoreError::corrupt(format!(
                "record truncated: need {} bytes at offset {}, have {}",
                len,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> StoreResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> StoreResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> StoreResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> StoreResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> StoreResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize, rejecting non-canonical encodings
    pub fn read_compact_size(&mut self) -> StoreResult<u64> {
        let first = self.read_u8()?;
        let (value, min) = match first {
            0xfd => (u64::from(self.read_u16_le()?), 0xfd),
            0xfe => (u64::from(self.read_u32_le()?), 0x1_0000),
            0xff => (self.read_u64_le()?, 0x1_0000_0000),
            n => return Ok(u64::from(n)),
        };
        if value < min {
            return Err(StoreError::corrupt("non-canonical CompactSize"));
        }
        Ok(value)
    }

    /// Read a CompactSize-prefixed byte vector
    pub fn read_var_bytes(&mut self) -> StoreResult<&'a [u8]> {
        let len = self.read_compact_size()?;
        if len > MAX_SERIALIZED_SIZE {
            return Err(StoreError::corrupt(format!("vector length {} too large", len)));
        }
        // Lossless: bounded by MAX_SERIALIZED_SIZE above
        self.read_bytes(len as usize)
    }

    /// Read a CompactSize-prefixed UTF-8 string
    pub fn read_string(&mut self) -> StoreResult<&'a str> {
        let bytes = self.read_var_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| StoreError::corrupt("record type is not UTF-8"))
    }
}

pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_var_bytes(out, s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_compact_size(&mut out, value);
        out
    }

    #[test]
    fn test_compact_size_boundaries() {
        for (value, len) in [
            (0u64, 1usize),
            (0xfc, 1),
            (0xfd, 3),
            (0xffff, 3),
            (0x1_0000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
        ] {
            let bytes = compact(value);
            assert_eq!(bytes.len(), len, "encoded length of {value:#x}");
            assert_eq!(RecordReader::new(&bytes).read_compact_size().unwrap(), value);
        }
    }

    #[test]
    fn test_reject_non_canonical_compact_size() {
        // 0x10 encoded with the 0xfd prefix
        let mut reader = RecordReader::new(&[0xfd, 0x10, 0x00]);
        assert!(matches!(
            reader.read_compact_size(),
            Err(StoreError::Corrupt(_))
        ));

        let mut reader = RecordReader::new(&[0xfe, 0xff, 0xff, 0x00, 0x00]);
        assert!(reader.read_compact_size().is_err());
    }

    #[test]
    fn test_read_var_bytes_and_string() {
        let mut buf = Vec::new();
        write_string(&mut buf, "ckey");
        write_var_bytes(&mut buf, &[1, 2, 3]);
        buf.extend_from_slice(&7u32.to_le_bytes());

        let mut reader = RecordReader::new(&buf);
        assert_eq!(reader.read_string().unwrap(), "ckey");
        assert_eq!(reader.read_var_bytes().unwrap(), &[1, 2, 3]);
        assert_eq!(reader.read_u32_le().unwrap(), 7);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncated_vector() {
        let mut reader = RecordReader::new(&[0x05, 1, 2]);
        let err = reader.read_var_bytes().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_oversized_vector() {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, MAX_SERIALIZED_SIZE + 1);
        assert!(RecordReader::new(&buf).read_var_bytes().is_err());
    }
}
