//! ZIP archive construction
//!
//! Packaged results are delivered as a standard ZIP file that any archive tool
//! can list and extract. The layout is produced by hand rather than through a
//! general-purpose ZIP library so that the byte stream is fully determined by
//! the entry list: no timestamps, no extra fields, no data descriptors.
//!
//! ```rust
//! use depotgate_formats::archive::{ArchiveEntry, ArchiveWriter};
//!
//! let bytes = ArchiveWriter::build(&[
//!     ArchiveEntry::new("730.lua", b"addappid(730)\n".to_vec()),
//! ])?;
//! assert_eq!(&bytes[..4], b"PK\x03\x04");
//! # Ok::<(), depotgate_formats::archive::ArchiveError>(())
//! ```

pub mod error;
pub mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use writer::{ArchiveEntry, ArchiveWriter};
