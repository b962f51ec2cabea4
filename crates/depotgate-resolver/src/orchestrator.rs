//! Resolution pipeline
//!
//! Sources are consulted in a fixed order and the first sufficient result is
//! packaged:
//!
//! 1. the hub, accepted when it has both keys and manifests;
//! 2. the repositories, merged with a keyless hub result;
//! 3. the mirrors;
//! 4. whatever partial data the hub produced.

use depotgate_formats::AppId;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStatus, KeyTableCache};
use crate::config::Settings;
use crate::error::{ResolverError, Result};
use crate::merge::merge;
use crate::package::{PackageReport, Packager};
use crate::resolution::{Resolution, Resolved};
use crate::sources::{
    AuxiliaryResolver, HubResolver, RepositoryResolver, Resolve, SourceContext, build_strategies,
};
use crate::transport::{HttpClient, HttpConfig};

/// Entry point tying the resolvers, cache and packager together
#[derive(Debug, Clone)]
pub struct Orchestrator {
    cache: Arc<KeyTableCache>,
    hub: Option<HubResolver>,
    repositories: RepositoryResolver,
    mirrors: AuxiliaryResolver,
    packager: Packager,
}

impl Orchestrator {
    /// Build every resolver from `settings`
    pub fn new(settings: Settings) -> Result<Self> {
        let http = HttpClient::with_config(&HttpConfig::default())?;
        Ok(Self::with_client(settings, http))
    }

    /// Build every resolver sharing an existing client
    pub fn with_client(settings: Settings, http: HttpClient) -> Self {
        let cache = Arc::new(KeyTableCache::new(
            settings.cache.key_table_path(),
            settings.cache.ttl(),
        ));

        let hub = settings.hub.enabled.then(|| {
            HubResolver::new(http.clone(), Arc::clone(&cache), settings.hub.clone())
        });

        let context = SourceContext {
            http,
            github: settings.github.clone(),
            request_timeout: settings.hub.request_timeout(),
        };
        let (repositories, mirrors) = build_strategies(settings.enabled_sources(), &context);
        debug!(
            "Configured {} repositories and {} mirrors",
            repositories.len(),
            mirrors.len()
        );

        Self {
            cache,
            hub,
            repositories: RepositoryResolver::new(repositories),
            mirrors: AuxiliaryResolver::new(mirrors),
            packager: Packager::new(settings.set_manifest_id),
        }
    }

    /// Resolve `app_id` and write `<work_dir>/<app_id>.zip`
    pub async fn resolve(&self, app_id: &str, work_dir: &Path) -> Result<PackageReport> {
        let app_id: AppId = app_id.parse()?;
        let resolved = self.resolve_data(app_id).await?;
        self.packager.package(&resolved, work_dir).await
    }

    /// Run the fallback chain without packaging
    pub async fn resolve_data(&self, app_id: AppId) -> Result<Resolved> {
        info!("Resolving {app_id}");

        let hub = match &self.hub {
            Some(hub) => hub.resolve(app_id).await,
            None => Resolution::Empty,
        };
        debug!("Hub: {hub}");
        if hub.is_complete() {
            return Self::accept(hub, app_id);
        }

        if !self.repositories.is_empty() {
            let repositories = self.repositories.resolve(app_id).await;
            debug!("Repositories: {repositories}");
            let merged = merge(&hub, repositories);
            if merged.is_found() {
                return Self::accept(merged, app_id);
            }
        }

        if !self.mirrors.is_empty() {
            let mirrors = self.mirrors.resolve(app_id).await;
            debug!("Mirrors: {mirrors}");
            if mirrors.is_found() {
                return Self::accept(mirrors, app_id);
            }
        }

        if hub.is_found() {
            info!("Using partial hub result for {app_id}");
            return Self::accept(hub, app_id);
        }

        warn!("{app_id} not found in any source");
        Err(ResolverError::NotFound {
            app_id: app_id.get(),
        })
    }

    fn accept(resolution: Resolution, app_id: AppId) -> Result<Resolved> {
        resolution.into_found().ok_or(ResolverError::NotFound {
            app_id: app_id.get(),
        })
    }

    /// Snapshot of the key table cache
    pub async fn cache_status(&self) -> CacheStatus {
        self.cache.status().await
    }

    /// Drop both key table cache tiers
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Refetch the key table and return its entry count
    pub async fn refresh_cache(&self) -> Result<usize> {
        let Some(hub) = &self.hub else {
            return Err(ResolverError::Config("hub is disabled".to_string()));
        };
        hub.refresh_key_table().await
    }
}
