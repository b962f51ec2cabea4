//! File formats for depot unlock packages
//!
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
//! This crate provides the pure, I/O-free formats used to assemble an unlock
//! package for a game: identifier parsing, the unlock script, key-bearing VDF
//! files, manifest file names and the ZIP archive that carries them.
//!
//! # Supported Formats
//!
//! - **Unlock script**: `addappid` / `setManifestid` directives, generation and scanning
//! - **Key files**: `key.vdf` / `config.vdf` depot key sections
//! - **Manifest names**: `<depot>_<manifest>.manifest`
//! - **Archive**: deterministic ZIP writer with raw deflate and CRC-32
//!
//! # Design Principles
//!
//! - **Numeric identifiers**: ids are parsed once, so ordering is numeric everywhere
//! - **Determinism**: the same inputs always produce the same bytes

#![warn(missing_docs)]

/// Deterministic ZIP archive construction
///
/// See the [`archive`] module for the exact byte layout.
pub mod archive;
pub mod crc32;
pub mod ids;
pub mod keyfile;
pub mod manifest;
/// Unlock script generation and scanning
pub mod script;

pub use archive::{ArchiveEntry, ArchiveError, ArchiveResult, ArchiveWriter};
pub use ids::{AppId, DepotId, DepotKey, DepotKeys, IdError, ManifestMap, is_hex, parse_id};
pub use keyfile::{KEY_FILE_NAMES, KeyFileScanner, ScanState, is_key_file, scan_key_file};
pub use manifest::{
    MANIFEST_SUFFIX, is_manifest_path, manifest_file_name, parse_manifest_file_name,
};
pub use script::{ScriptInput, ScriptScan, generate, scan};
