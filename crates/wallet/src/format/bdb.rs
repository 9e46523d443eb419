//! Read-only Berkeley DB btree reader
//!
//! Legacy wallets are Berkeley DB files holding one outer btree whose only
//! record, `main`, points at the metapage of the subdatabase carrying the
//! wallet records. The reader walks pages directly and never writes.
//!
//! Integers in page headers follow the byte order of the metapage magic, so
//! files written on big-endian hosts load too.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use super::{ContainerFormat, EntrySource, RawEntry};
use crate::error::{StoreError, StoreResult};

/// Btree metapage magic
pub const BTREE_MAGIC: u32 = 0x0005_3162;

/// The only btree version this reader understands
pub const BTREE_VERSION: u32 = 9;

const MIN_PAGE_SIZE: usize = 512;
const MAX_PAGE_SIZE: usize = 65536;

// Metapage offsets
const META_MAGIC: usize = 12;
const META_VERSION: usize = 16;
const META_PAGE_SIZE: usize = 20;
const META_ENCRYPT_ALG: usize = 24;
const META_TYPE: usize = 25;
const META_LAST_PGNO: usize = 32;
const META_ROOT: usize = 88;
const META_SIZE: usize = 92;

// Page header offsets
const PAGE_PGNO: usize = 8;
const PAGE_NEXT_PGNO: usize = 16;
const PAGE_ENTRIES: usize = 20;
const PAGE_HF_OFFSET: usize = 22;
const PAGE_TYPE: usize = 25;
const PAGE_HEADER_SIZE: usize = 26;

// Page types
const P_IBTREE: u8 = 3;
const P_LBTREE: u8 = 5;
const P_OVERFLOW: u8 = 7;
const P_BTREEMETA: u8 = 9;

// Item types
const B_KEYDATA: u8 = 1;
const B_OVERFLOW: u8 = 3;
const B_TYPE_MASK: u8 = 0x7f;
const B_DELETE: u8 = 0x80;

const PGNO_INVALID: u32 = 0;
const MAIN_SUBDB: &[u8] = b"main";

/// Whether `data` starts with a btree metapage in either byte order
pub fn has_btree_magic(data: &[u8]) -> bool {
    match data.get(META_MAGIC..META_MAGIC + 4) {
        Some(bytes) => {
            let bytes = [bytes[0], bytes[1], bytes[2], bytes[3]];
            u32::from_le_bytes(bytes) == BTREE_MAGIC || u32::from_be_bytes(bytes) == BTREE_MAGIC
        }
        None => false,
    }
}

/// Reader for Berkeley DB `wallet.dat` files
#[derive(Debug, Clone, Copy, Default)]
pub struct BerkeleyDbFile;

impl EntrySource for BerkeleyDbFile {
    fn entries(&self, _path: &Path, data: &[u8]) -> StoreResult<Vec<RawEntry>> {
        let db = BtreeFile::open(data)?;
        let subdb_meta = db.main_subdb_pgno()?;
        let root = db.meta_root(subdb_meta)?;
        let entries = db.walk(root)?;
        debug!(
            page_size = db.page_size,
            last_pgno = db.last_pgno,
            big_endian = db.big_endian,
            records = entries.len(),
            "Read Berkeley DB wallet"
        );
        Ok(entries)
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::BerkeleyDb
    }
}

/// Raw leaf item before deleted pairs are dropped
struct LeafItem {
    deleted: bool,
    data: Vec<u8>,
}

struct BtreeFile<'a> {
    data: &'a [u8],
    big_endian: bool,
    page_size: usize,
    last_pgno: u32,
}

impl<'a> BtreeFile<'a> {
    fn open(data: &'a [u8]) -> StoreResult<Self> {
        if data.len() < META_SIZE {
            return Err(StoreError::corrupt("Berkeley DB file too short"));
        }
        let magic = [
            data[META_MAGIC],
            data[META_MAGIC + 1],
            data[META_MAGIC + 2],
            data[META_MAGIC + 3],
        ];
        let big_endian = if u32::from_le_bytes(magic) == BTREE_MAGIC {
            false
        } else if u32::from_be_bytes(magic) == BTREE_MAGIC {
            true
        } else {
            return Err(StoreError::corrupt("Berkeley DB btree magic mismatch"));
        };

        let mut db = Self {
            data,
            big_endian,
            page_size: 0,
            last_pgno: 0,
        };

        let version = db.u32_at(data, META_VERSION);
        if version != BTREE_VERSION {
            return Err(StoreError::corrupt(format!(
                "unsupported Berkeley DB btree version {}",
                version
            )));
        }

        let page_size = db.u32_at(data, META_PAGE_SIZE) as usize;
        if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(StoreError::corrupt(format!(
                "invalid Berkeley DB page size {}",
                page_size
            )));
        }

        if data[META_ENCRYPT_ALG] != 0 {
            return Err(StoreError::Unsupported(
                "encrypted Berkeley DB files are not supported".to_string(),
            ));
        }
        if data[META_TYPE] != P_BTREEMETA {
            return Err(StoreError::corrupt("Berkeley DB metapage is not a btree"));
        }

        db.page_size = page_size;
        db.last_pgno = db.u32_at(data, META_LAST_PGNO);
        Ok(db)
    }

    fn u16_at(&self, buf: &[u8], off: usize) -> u16 {
        let bytes = [buf[off], buf[off + 1]];
        if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    }

    fn u32_at(&self, buf: &[u8], off: usize) -> u32 {
        let bytes = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    fn page(&self, pgno: u32) -> StoreResult<&'a [u8]> {
        if pgno > self.last_pgno {
            return Err(StoreError::corrupt(format!(
                "page {} beyond last page {}",
                pgno, self.last_pgno
            )));
        }
        let start = pgno as usize * self.page_size;
        let page = self
            .data
            .get(start..start + self.page_size)
            .ok_or_else(|| StoreError::corrupt(format!("page {} truncated", pgno)))?;
        if self.u32_at(page, PAGE_PGNO) != pgno {
            return Err(StoreError::corrupt(format!("page {} has wrong page number", pgno)));
        }
        Ok(page)
    }

    fn meta_root(&self, pgno: u32) -> StoreResult<u32> {
        let page = self.page(pgno)?;
        if page[PAGE_TYPE] != P_BTREEMETA || self.u32_at(page, META_MAGIC) != BTREE_MAGIC {
            return Err(StoreError::corrupt(format!("page {} is not a btree metapage", pgno)));
        }
        Ok(self.u32_at(page, META_ROOT))
    }

    /// Page number of the `main` subdatabase metapage
    fn main_subdb_pgno(&self) -> StoreResult<u32> {
        let root = self.meta_root(0)?;
        let page = self.page(root)?;
        if page[PAGE_TYPE] != P_LBTREE {
            return Err(StoreError::corrupt("outer database root is not a leaf page"));
        }
        let mut records = Vec::new();
        self.read_leaf(page, &mut records)?;

        let main = records
            .iter()
            .find(|entry| entry.key == MAIN_SUBDB)
            .ok_or_else(|| StoreError::corrupt("no 'main' subdatabase in Berkeley DB file"))?;
        let value: [u8; 4] = main
            .value
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::corrupt("'main' subdatabase entry has wrong length"))?;
        Ok(u32::from_be_bytes(value))
    }

    /// Depth-first walk from `root`, collecting leaf records in key order
    fn walk(&self, root: u32) -> StoreResult<Vec<RawEntry>> {
        let mut entries = Vec::new();
        let mut stack = vec![root];
        let mut visited = HashSet::new();

        while let Some(pgno) = stack.pop() {
            if !visited.insert(pgno) {
                return Err(StoreError::corrupt(format!("page cycle at page {}", pgno)));
            }
            let page = self.page(pgno)?;
            match page[PAGE_TYPE] {
                P_LBTREE => self.read_leaf(page, &mut entries)?,
                P_IBTREE => {
                    let children = self.internal_children(page)?;
                    stack.extend(children.into_iter().rev());
                }
                other => {
                    return Err(StoreError::corrupt(format!(
                        "unexpected page type {} at page {}",
                        other, pgno
                    )))
                }
            }
        }
        Ok(entries)
    }

    fn item_offsets(&self, page: &[u8]) -> StoreResult<Vec<usize>> {
        let count = self.u16_at(page, PAGE_ENTRIES) as usize;
        if PAGE_HEADER_SIZE + count * 2 > self.page_size {
            return Err(StoreError::corrupt("page item index overflows page"));
        }
        Ok((0..count)
            .map(|i| self.u16_at(page, PAGE_HEADER_SIZE + i * 2) as usize)
            .collect())
    }

    fn internal_children(&self, page: &[u8]) -> StoreResult<Vec<u32>> {
        self.item_offsets(page)?
            .into_iter()
            .map(|off| {
                if off + 12 > self.page_size {
                    return Err(StoreError::corrupt("internal item truncated"));
                }
                Ok(self.u32_at(page, off + 4))
            })
            .collect()
    }

    fn read_leaf(&self, page: &[u8], out: &mut Vec<RawEntry>) -> StoreResult<()> {
        let offsets = self.item_offsets(page)?;
        if offsets.len() % 2 != 0 {
            return Err(StoreError::corrupt("leaf page has an unpaired item"));
        }
        for pair in offsets.chunks(2) {
            let key = self.leaf_item(page, pair[0])?;
            let value = self.leaf_item(page, pair[1])?;
            if key.deleted || value.deleted {
                continue;
            }
            out.push(RawEntry::new(key.data, value.data));
        }
        Ok(())
    }

    fn leaf_item(&self, page: &[u8], off: usize) -> StoreResult<LeafItem> {
        if off + 3 > self.page_size {
            return Err(StoreError::corrupt("leaf item truncated"));
        }
        let kind = page[off + 2];
        let deleted = kind & B_DELETE != 0;
        match kind & B_TYPE_MASK {
            B_KEYDATA => {
                let len = self.u16_at(page, off) as usize;
                let data = page
                    .get(off + 3..off + 3 + len)
                    .ok_or_else(|| StoreError::corrupt("leaf item truncated"))?;
                Ok(LeafItem {
                    deleted,
                    data: data.to_vec(),
                })
            }
            B_OVERFLOW => {
                if off + 12 > self.page_size {
                    return Err(StoreError::corrupt("overflow item truncated"));
                }
                let pgno = self.u32_at(page, off + 4);
                let len = self.u32_at(page, off + 8) as usize;
                Ok(LeafItem {
                    deleted,
                    data: self.read_overflow(pgno, len)?,
                })
            }
            other => Err(StoreError::corrupt(format!(
                "unsupported Berkeley DB item type {}",
                other
            ))),
        }
    }

    /// Follow an overflow chain, expecting exactly `len` bytes
    fn read_overflow(&self, first: u32, len: usize) -> StoreResult<Vec<u8>> {
        if len > self.data.len() {
            return Err(StoreError::corrupt("overflow item longer than file"));
        }
        // Sized up front so the buffer is never reallocated (and copied) while growing
        let mut out = Vec::with_capacity(len);
        let mut pgno = first;
        let mut hops = 0u32;

        while pgno != PGNO_INVALID {
            hops += 1;
            if hops > self.last_pgno {
                return Err(StoreError::corrupt("overflow chain cycle"));
            }
            let page = self.page(pgno)?;
            if page[PAGE_TYPE] != P_OVERFLOW {
                return Err(StoreError::corrupt(format!(
                    "page {} in overflow chain is not an overflow page",
                    pgno
                )));
            }
            let chunk = self.u16_at(page, PAGE_HF_OFFSET) as usize;
            let bytes = page
                .get(PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + chunk)
                .ok_or_else(|| StoreError::corrupt("overflow page length overflows page"))?;
            if out.len() + bytes.len() > len {
                return Err(StoreError::corrupt("overflow chain longer than item"));
            }
            out.extend_from_slice(bytes);
            pgno = self.u32_at(page, PAGE_NEXT_PGNO);
        }

        if out.len() != len {
            return Err(StoreError::corrupt("overflow chain shorter than item"));
        }
        Ok(out)
    }
}

/// Builder for synthetic Berkeley DB files used in tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) struct BdbBuilder {
        page_size: usize,
        big_endian: bool,
        per_leaf: usize,
        overflow_over: usize,
        entries: Vec<(Vec<u8>, Vec<u8>, bool)>,
    }

    impl BdbBuilder {
        pub(crate) fn new(page_size: usize) -> Self {
            Self {
                page_size,
                big_endian: false,
                per_leaf: usize::MAX,
                overflow_over: page_size / 4,
                entries: Vec::new(),
            }
        }

        pub(crate) fn big_endian(mut self) -> Self {
            self.big_endian = true;
            self
        }

        /// Split records over leaves of at most `n` pairs under an internal root
        pub(crate) fn per_leaf(mut self, n: usize) -> Self {
            self.per_leaf = n;
            self
        }

        pub(crate) fn entry(mut self, key: &[u8], value: &[u8]) -> Self {
            self.entries.push((key.to_vec(), value.to_vec(), false));
            self
        }

        pub(crate) fn entries(mut self, entries: &[RawEntry]) -> Self {
            for entry in entries {
                self.entries
                    .push((entry.key.clone(), entry.value.to_vec(), false));
            }
            self
        }

        pub(crate) fn deleted_entry(mut self, key: &[u8], value: &[u8]) -> Self {
            self.entries.push((key.to_vec(), value.to_vec(), true));
            self
        }

        fn put_u16(&self, buf: &mut [u8], off: usize, v: u16) {
            let bytes = if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            };
            buf[off..off + 2].copy_from_slice(&bytes);
        }

        fn put_u32(&self, buf: &mut [u8], off: usize, v: u32) {
            let bytes = if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            };
            buf[off..off + 4].copy_from_slice(&bytes);
        }

        fn new_page(&self, pages: &mut Vec<Vec<u8>>) -> usize {
            pages.push(vec![0u8; self.page_size]);
            pages.len() - 1
        }

        fn write_page(&self, page: &mut [u8], pgno: usize, kind: u8, items: &[Vec<u8>]) {
            self.put_u32(page, PAGE_PGNO, pgno as u32);
            self.put_u16(page, PAGE_ENTRIES, items.len() as u16);
            page[PAGE_TYPE] = kind;
            let mut cursor = self.page_size;
            for (i, item) in items.iter().enumerate() {
                cursor -= item.len();
                assert!(cursor >= PAGE_HEADER_SIZE + items.len() * 2, "page overfull");
                page[cursor..cursor + item.len()].copy_from_slice(item);
                self.put_u16(page, PAGE_HEADER_SIZE + i * 2, cursor as u16);
            }
            self.put_u16(page, PAGE_HF_OFFSET, cursor as u16);
        }

        fn write_meta(&self, page: &mut [u8], pgno: usize, root: usize, last_pgno: usize) {
            self.put_u32(page, PAGE_PGNO, pgno as u32);
            self.put_u32(page, META_MAGIC, BTREE_MAGIC);
            self.put_u32(page, META_VERSION, BTREE_VERSION);
            self.put_u32(page, META_PAGE_SIZE, self.page_size as u32);
            page[META_TYPE] = P_BTREEMETA;
            self.put_u32(page, META_LAST_PGNO, last_pgno as u32);
            self.put_u32(page, META_ROOT, root as u32);
        }

        fn keydata(&self, data: &[u8], deleted: bool) -> Vec<u8> {
            let mut item = vec![0u8; 3];
            self.put_u16(&mut item, 0, data.len() as u16);
            item[2] = B_KEYDATA | if deleted { B_DELETE } else { 0 };
            item.extend_from_slice(data);
            item
        }

        fn leaf_item(&self, pages: &mut Vec<Vec<u8>>, data: &[u8], deleted: bool) -> Vec<u8> {
            if data.len() <= self.overflow_over {
                return self.keydata(data, deleted);
            }
            let chunk_size = self.page_size - PAGE_HEADER_SIZE;
            let mut first = 0usize;
            let mut prev: Option<usize> = None;
            for chunk in data.chunks(chunk_size) {
                let pgno = self.new_page(pages);
                let mut page = vec![0u8; self.page_size];
                self.put_u32(&mut page, PAGE_PGNO, pgno as u32);
                self.put_u16(&mut page, PAGE_ENTRIES, 1);
                self.put_u16(&mut page, PAGE_HF_OFFSET, chunk.len() as u16);
                page[PAGE_TYPE] = P_OVERFLOW;
                page[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + chunk.len()].copy_from_slice(chunk);
                pages[pgno] = page;
                match prev {
                    Some(p) => {
                        let mut prev_page = std::mem::take(&mut pages[p]);
                        self.put_u32(&mut prev_page, PAGE_NEXT_PGNO, pgno as u32);
                        pages[p] = prev_page;
                    }
                    None => first = pgno,
                }
                prev = Some(pgno);
            }
            let mut item = vec![0u8; 12];
            item[2] = B_OVERFLOW | if deleted { B_DELETE } else { 0 };
            self.put_u32(&mut item, 4, first as u32);
            self.put_u32(&mut item, 8, data.len() as u32);
            item
        }

        pub(crate) fn build(&self) -> Vec<u8> {
            // 0: outer meta, 1: outer root, 2: subdatabase meta
            let mut pages = vec![vec![0u8; self.page_size]; 3];

            let mut leaves = Vec::new();
            let groups: Vec<&[(Vec<u8>, Vec<u8>, bool)]> = if self.entries.is_empty() {
                vec![&self.entries[..]]
            } else {
                self.entries.chunks(self.per_leaf).collect()
            };
            for group in groups {
                let leaf = self.new_page(&mut pages);
                let mut items = Vec::new();
                for (key, value, deleted) in group {
                    items.push(self.leaf_item(&mut pages, key, *deleted));
                    items.push(self.leaf_item(&mut pages, value, *deleted));
                }
                let mut page = std::mem::take(&mut pages[leaf]);
                self.write_page(&mut page, leaf, P_LBTREE, &items);
                pages[leaf] = page;
                leaves.push(leaf);
            }

            let root = if leaves.len() == 1 {
                leaves[0]
            } else {
                let root = self.new_page(&mut pages);
                let items: Vec<Vec<u8>> = leaves
                    .iter()
                    .map(|&child| {
                        let mut item = vec![0u8; 12];
                        item[2] = B_KEYDATA;
                        self.put_u32(&mut item, 4, child as u32);
                        item
                    })
                    .collect();
                let mut page = std::mem::take(&mut pages[root]);
                self.write_page(&mut page, root, P_IBTREE, &items);
                pages[root] = page;
                root
            };

            let last = pages.len() - 1;
            let outer_items = vec![
                self.keydata(MAIN_SUBDB, false),
                self.keydata(&2u32.to_be_bytes(), false),
            ];
            let mut outer_root = std::mem::take(&mut pages[1]);
            self.write_page(&mut outer_root, 1, P_LBTREE, &outer_items);
            pages[1] = outer_root;

            let mut sub_meta = std::mem::take(&mut pages[2]);
            self.write_meta(&mut sub_meta, 2, root, last);
            pages[2] = sub_meta;

            let mut outer_meta = std::mem::take(&mut pages[0]);
            self.write_meta(&mut outer_meta, 0, 1, last);
            pages[0] = outer_meta;

            pages.concat()
        }
    }
}
