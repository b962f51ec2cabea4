//! # depotgate-resolver - Depot key, manifest and DLC resolution
//!
//! Resolves everything needed to unlock a game's content from several
//! independent, frequently failing providers and packages it as a ZIP
//! archive.
//!
//! ## Architecture Overview
//!
//! 1. **Hub** ([`HubResolver`]): bulk key table raced across mirrors and
//!    cached in two tiers, plus per-app manifest and DLC lookups
//! 2. **Repositories** ([`RepositoryResolver`]): one branch per app, read
//!    as a zipball or crawled file by file
//! 3. **Mirrors** ([`AuxiliaryResolver`]): zip archives, key-value APIs and
//!    session APIs, tried in order
//!
//! A keyless hub result is merged with repository keys ([`merge()`]). The
//! [`Orchestrator`] runs the chain and hands the first sufficient result to
//! the [`Packager`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use depotgate_resolver::{Orchestrator, Settings};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Settings::from_env())?;
//!     let report = orchestrator.resolve("730", Path::new("/tmp/730")).await?;
//!
//!     println!(
//!         "{} keys, {} manifests -> {}",
//!         report.key_count,
//!         report.manifest_count,
//!         report.archive_path.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Caching
//!
//! The bulk key table is the only cached resource. Memory hits are checked
//! first, then the persisted file (aged by its modification time). Concurrent
//! misses share a single fetch.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod package;
pub mod racing;
pub mod resolution;
pub mod sources;
pub mod transport;

pub use cache::{CacheStatus, CacheTier, KeyTable, KeyTableCache};
pub use config::{
    CacheSettings, GithubSettings, HubSettings, KEY_TABLE_FILE_NAME, Settings, SourceConfig,
    SourceKind, expand_template,
};
pub use error::{ResolverError, Result};
pub use merge::merge;
pub use orchestrator::Orchestrator;
pub use package::{PackageReport, Packager};
pub use racing::{Won, race};
pub use resolution::{ManifestArtifact, Resolution, Resolved};
pub use sources::{
    AuxiliaryResolver, HubResolver, MirrorStrategy, RepositoryResolver, RepositoryStrategy,
    Resolve, SourceContext, build_strategies,
};
pub use transport::{HttpClient, HttpConfig};
