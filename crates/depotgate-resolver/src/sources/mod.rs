//! Source resolvers
//!
//! Every source implements [`Resolve`]. Configured sources are converted once
//! into closed strategy enums ([`RepositoryStrategy`], [`MirrorStrategy`]) so
//! dispatch never depends on comparing kind strings at resolution time.

use async_trait::async_trait;
use depotgate_formats::AppId;
use std::time::Duration;

use crate::config::{GithubSettings, SourceConfig};
use crate::resolution::Resolution;
use crate::transport::HttpClient;

pub mod auxiliary;
pub mod hub;
pub mod repository;
pub mod scan;

pub use auxiliary::{AuxiliaryResolver, MirrorStrategy};
pub use hub::HubResolver;
pub use repository::{RepositoryResolver, RepositoryStrategy};
pub use scan::ContentScan;

/// Resolve one app id against one source
///
/// Implementations never return errors: anything that goes wrong becomes
/// [`Resolution::Failed`] and the caller moves on to the next source.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Label used in logs and in the result's source field
    fn name(&self) -> &str;

    async fn resolve(&self, app_id: AppId) -> Resolution;
}

/// Shared handles every configured source needs
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub http: HttpClient,
    pub github: GithubSettings,
    /// Per-request timeout for mirror sources
    pub request_timeout: Duration,
}

/// Split sources into repository and mirror strategies, keeping the given
/// order within each group
///
/// Callers pass [`Settings::enabled_sources`](crate::config::Settings::enabled_sources).
pub fn build_strategies<'a>(
    sources: impl IntoIterator<Item = &'a SourceConfig>,
    context: &SourceContext,
) -> (Vec<RepositoryStrategy>, Vec<MirrorStrategy>) {
    let mut repositories = Vec::new();
    let mut mirrors = Vec::new();

    for source in sources {
        if let Some(repository) = RepositoryStrategy::from_config(source, context) {
            repositories.push(repository);
        } else if let Some(mirror) = MirrorStrategy::from_config(source, context) {
            mirrors.push(mirror);
        }
    }

    (repositories, mirrors)
}
