//! ZIP archive writer
//!
//! Produces a self-contained archive byte stream with a fixed layout:
//!
//! ```text
//! [local header 0][name 0][deflate data 0]
//! [local header 1][name 1][deflate data 1]
//! ...
//! [central record 0][name 0]
//! [central record 1][name 1]
//! ...
//! [end of central directory]
//! ```
//!
//! All multi-byte fields are little-endian. No data descriptors, extra fields
//! or comments are written.

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::crc32::crc32;

/// Local file header signature (`PK\x03\x04`)
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
/// Central directory record signature (`PK\x01\x02`)
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
/// End of central directory signature (`PK\x05\x06`)
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// Size of a local file header without its name
pub const LOCAL_HEADER_SIZE: usize = 30;
/// Size of a central directory record without its name
pub const CENTRAL_HEADER_SIZE: usize = 46;
/// Size of the end of central directory record
pub const END_OF_CENTRAL_DIRECTORY_SIZE: usize = 22;

const VERSION: u16 = 20;
const FLAG_UTF8_NAMES: u16 = 0x0800;
const METHOD_DEFLATE: u16 = 8;
const DOS_TIME: u16 = 0;
/// 1980-01-01
const DOS_DATE: u16 = (1 << 5) | 1;

/// A single file to place in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, forward-slash separated
    pub path: String,
    /// Uncompressed file content
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    /// Create a new archive entry
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Per-entry bookkeeping carried from the local section to the central
/// directory
struct WrittenEntry {
    name: Vec<u8>,
    crc: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_header_offset: u32,
}

/// Stateless ZIP archive builder
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveWriter;

impl ArchiveWriter {
    /// Build an archive containing `entries`, in order
    pub fn build(entries: &[ArchiveEntry]) -> ArchiveResult<Vec<u8>> {
        let count =
            u16::try_from(entries.len()).map_err(|_| ArchiveError::TooManyEntries(entries.len()))?;

        let mut out = Vec::new();
        let mut written = Vec::with_capacity(entries.len());

        for entry in entries {
            let name = normalize_path(&entry.path)?;
            let name_len =
                u16::try_from(name.len()).map_err(|_| ArchiveError::NameTooLong(name.len()))?;

            let compressed = deflate(&entry.content)?;
            let too_large = || ArchiveError::TooLarge(name.clone());

            let record = WrittenEntry {
                name: name.clone().into_bytes(),
                crc: crc32(&entry.content),
                compressed_size: u32::try_from(compressed.len()).map_err(|_| too_large())?,
                uncompressed_size: u32::try_from(entry.content.len())
                    .map_err(|_| too_large())?,
                local_header_offset: u32::try_from(out.len()).map_err(|_| too_large())?,
            };

            put_u32(&mut out, LOCAL_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION);
            put_u16(&mut out, FLAG_UTF8_NAMES);
            put_u16(&mut out, METHOD_DEFLATE);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, record.crc);
            put_u32(&mut out, record.compressed_size);
            put_u32(&mut out, record.uncompressed_size);
            put_u16(&mut out, name_len);
            put_u16(&mut out, 0); // extra field length
            out.extend_from_slice(&record.name);
            out.extend_from_slice(&compressed);

            written.push(record);
        }

        let central_offset = u32::try_from(out.len())
            .map_err(|_| ArchiveError::TooLarge("central directory".to_string()))?;

        for record in &written {
            put_u32(&mut out, CENTRAL_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION); // version made by
            put_u16(&mut out, VERSION); // version needed to extract
            put_u16(&mut out, FLAG_UTF8_NAMES);
            put_u16(&mut out, METHOD_DEFLATE);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, record.crc);
            put_u32(&mut out, record.compressed_size);
            put_u32(&mut out, record.uncompressed_size);
            put_u16(&mut out, record.name.len() as u16); // checked above
            put_u16(&mut out, 0); // extra field length
            put_u16(&mut out, 0); // comment length
            put_u16(&mut out, 0); // disk number start
            put_u16(&mut out, 0); // internal attributes
            put_u32(&mut out, 0); // external attributes
            put_u32(&mut out, record.local_header_offset);
            out.extend_from_slice(&record.name);
        }

        let central_size = u32::try_from(out.len())
            .map_err(|_| ArchiveError::TooLarge("central directory".to_string()))?
            - central_offset;

        put_u32(&mut out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut out, 0); // this disk
        put_u16(&mut out, 0); // disk with central directory
        put_u16(&mut out, count); // entries on this disk
        put_u16(&mut out, count); // total entries
        put_u32(&mut out, central_size);
        put_u32(&mut out, central_offset);
        put_u16(&mut out, 0); // comment length

        Ok(out)
    }
}

/// Convert host separators to `/` and drop leading slashes
fn normalize_path(path: &str) -> ArchiveResult<String> {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ArchiveError::EmptyPath);
    }
    Ok(trimmed.to_string())
}

/// Raw deflate (no zlib or gzip wrapper)
fn deflate(data: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
