//! Error types for resolution operations

use depotgate_formats::{ArchiveError, IdError};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid app id: {0}")]
    InvalidAppId(#[from] IdError),

    #[error("App {app_id} not found in any source")]
    NotFound { app_id: u64 },

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("All {attempted} candidates failed")]
    AllCandidatesFailed { attempted: usize },

    #[error("Packaging failed: {0}")]
    Packaging(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResolverError {
    /// Whether the next candidate or resolver should be tried after this
    /// error
    ///
    /// Input and packaging errors stop the chain; everything a remote source
    /// can cause does not.
    pub fn should_fall_through(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Http(_)
            | Self::HttpStatus { .. }
            | Self::EmptyResponse(_)
            | Self::Parse(_)
            | Self::Json(_)
            | Self::Zip(_)
            | Self::Timeout(_)
            | Self::AllCandidatesFailed { .. } => true,
            Self::InvalidAppId(_)
            | Self::NotFound { .. }
            | Self::Packaging(_)
            | Self::Archive(_)
            | Self::Config(_) => false,
        }
    }

    /// Whether this error means "the source has nothing for this id" rather
    /// than "the source is broken"
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::EmptyResponse(_) => true,
            Self::HttpStatus { status, .. } => *status == StatusCode::NOT_FOUND,
            Self::Http(e) => e.status() == Some(StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
