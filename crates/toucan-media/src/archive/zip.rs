// crates/toucan-media/src/archive/zip.rs
//
// Raw zip central-directory parsing for `.otioz` bundles (§4.C / §6). We
// never extract: every referenced entry is resolved to a byte range inside
// a memory-mapped file, computed directly from the central directory's own
// `local_header_offset`, `filename_length`, and `extra_length` fields —
// the same fields the original reads straight off its zip library's
// per-entry struct rather than asking the library to decompress anything.
// An entry whose compression method isn't 0 (stored) can't be sliced this
// way and is reported as `ArchiveCompressed`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use toucan_core::{Error, Result};

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_DIR_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_HEADER_FIXED_SIZE: u64 = 30;
const EOCD_FIXED_SIZE: usize = 22;
const MAX_COMMENT_LEN: usize = 65_535;

#[derive(Clone, Copy, Debug)]
pub struct ZipEntry {
    pub offset: u64,
    pub len: u64,
    pub method: u16,
}

impl ZipEntry {
    pub fn is_stored(&self) -> bool {
        self.method == 0
    }
}

/// A memory-mapped `.otioz` file plus its parsed central directory, indexed
/// by entry name. Shared (via `Arc`) by every Read node built from entries
/// inside it, so the mapping outlives every node that borrows from it.
pub struct ZipArchive {
    pub mmap: Arc<Mmap>,
    pub entries: HashMap<String, ZipEntry>,
}

impl ZipArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::OpenFailed {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::OpenFailed {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        let entries = parse_central_directory(&mmap).map_err(|cause| Error::OpenFailed {
            path: path.to_path_buf(),
            cause,
        })?;
        Ok(Self { mmap: Arc::new(mmap), entries })
    }

    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.get(name).or_else(|| self.entries.get(name.trim_start_matches("./")))
    }

    /// Byte slice for an entry's uncompressed data, already validated by
    /// `parse_central_directory` to be stored (method 0).
    pub fn slice(&self, entry: &ZipEntry) -> &[u8] {
        let start = entry.offset as usize;
        let end = start + entry.len as usize;
        &self.mmap[start..end]
    }
}

fn parse_central_directory(data: &[u8]) -> std::result::Result<HashMap<String, ZipEntry>, String> {
    let eocd_offset = find_eocd(data).ok_or_else(|| "end of central directory record not found".to_string())?;
    let cd_entry_count = LittleEndian::read_u16(&data[eocd_offset + 10..]) as usize;
    let cd_offset = LittleEndian::read_u32(&data[eocd_offset + 16..]) as u64;

    let mut entries = HashMap::with_capacity(cd_entry_count);
    let mut cursor = cd_offset as usize;
    for _ in 0..cd_entry_count {
        if cursor + 46 > data.len() {
            return Err("central directory record truncated".to_string());
        }
        let signature = LittleEndian::read_u32(&data[cursor..]);
        if signature != CENTRAL_DIR_SIGNATURE {
            return Err(format!("unexpected central directory signature at offset {cursor}"));
        }
        let method = LittleEndian::read_u16(&data[cursor + 10..]);
        let uncompressed_size = LittleEndian::read_u32(&data[cursor + 24..]) as u64;
        let filename_len = LittleEndian::read_u16(&data[cursor + 28..]) as usize;
        let extra_len = LittleEndian::read_u16(&data[cursor + 30..]) as usize;
        let comment_len = LittleEndian::read_u16(&data[cursor + 32..]) as usize;
        let local_header_offset = LittleEndian::read_u32(&data[cursor + 42..]) as u64;

        let name_start = cursor + 46;
        let name_end = name_start + filename_len;
        if name_end > data.len() {
            return Err("central directory filename truncated".to_string());
        }
        let name = String::from_utf8_lossy(&data[name_start..name_end]).into_owned();

        // §6: byte range is `local_header_offset + 30 + filename_length +
        // extra_length`, using the *central directory's* filename/extra
        // lengths rather than re-reading the local header — the direct
        // port of the original handing raw `zipInfo` struct fields.
        let data_offset = local_header_offset + LOCAL_HEADER_FIXED_SIZE + filename_len as u64 + extra_len as u64;

        if !name.is_empty() && !name.ends_with('/') {
            entries.insert(name, ZipEntry { offset: data_offset, len: uncompressed_size, method });
        }

        cursor = name_end + extra_len + comment_len;
    }
    Ok(entries)
}

/// Scans backward from the end of the file for the EOCD signature. The
/// comment field means it isn't necessarily the last 22 bytes, so we search
/// the maximum possible window (22 fixed bytes + up to 64KiB of comment).
fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_FIXED_SIZE {
        return None;
    }
    let window_start = data.len().saturating_sub(EOCD_FIXED_SIZE + MAX_COMMENT_LEN);
    let search_region = &data[window_start..];
    for i in (0..=search_region.len().saturating_sub(EOCD_FIXED_SIZE)).rev() {
        if LittleEndian::read_u32(&search_region[i..]) == EOCD_SIGNATURE {
            return Some(window_start + i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal one-entry stored-mode zip in memory so the central
    /// directory parser can be exercised without a fixture file on disk.
    fn build_single_entry_zip(name: &str, content: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let local_header_offset = 0u32;

        // Local file header.
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method (stored)
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&0u32.to_le_bytes()); // crc32
        out.extend_from_slice(&(content.len() as u32).to_le_bytes()); // compressed size
        out.extend_from_slice(&(content.len() as u32).to_le_bytes()); // uncompressed size
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra length
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(content);

        let cd_offset = out.len() as u32;
        out.extend_from_slice(&CENTRAL_DIR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&0u32.to_le_bytes()); // crc32
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra length
        out.extend_from_slice(&0u16.to_le_bytes()); // comment length
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&local_header_offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        out.extend_from_slice(&1u16.to_le_bytes()); // entries on this disk
        out.extend_from_slice(&1u16.to_le_bytes()); // total entries
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment length
        out
    }

    #[test]
    fn parses_single_stored_entry() {
        let content = b"hello world";
        let zip = build_single_entry_zip("content.otio", content);
        let entries = parse_central_directory(&zip).unwrap();
        let entry = entries.get("content.otio").unwrap();
        assert!(entry.is_stored());
        assert_eq!(entry.len, content.len() as u64);
        assert_eq!(&zip[entry.offset as usize..entry.offset as usize + entry.len as usize], content);
    }

    #[test]
    fn finds_eocd_with_trailing_comment() {
        let mut zip = build_single_entry_zip("a.png", b"x");
        // Patch comment length and append a comment, simulating a non-empty
        // archive comment the EOCD search must still find.
        let len = zip.len();
        zip[len - 2] = 5;
        zip[len - 1] = 0;
        zip.extend_from_slice(b"howdy");
        assert!(find_eocd(&zip).is_some());
    }
}
