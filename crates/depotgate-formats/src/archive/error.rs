//! Error types for archive construction

use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while building a ZIP archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Entry path is empty after normalisation
    #[error("archive entry has an empty path")]
    EmptyPath,

    /// Entry name longer than the 16-bit name length field
    #[error("archive entry name too long: {0} bytes")]
    NameTooLong(usize),

    /// More entries than the end-of-central-directory record can count
    #[error("too many archive entries: {0}")]
    TooManyEntries(usize),

    /// A size or offset does not fit the 32-bit header fields
    #[error("archive exceeds 4 GiB limit while writing '{0}'")]
    TooLarge(String),

    /// Compression failed
    #[error("compression error: {0}")]
    Io(#[from] std::io::Error),
}
