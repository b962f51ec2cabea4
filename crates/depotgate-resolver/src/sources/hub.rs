//! Primary hub resolver
//!
//! Combines three lookups run concurrently: the bulk key table (through the
//! shared cache), the per-app manifest API and the storefront DLC listing.
//! Keys are filtered to the app id and the depots the manifest API reported.
//! Manifest payloads are then raced per depot over the configured mirrors.

use async_trait::async_trait;
use depotgate_formats::{AppId, DepotId, DepotKeys, ManifestMap, is_hex, parse_id};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{KeyTable, KeyTableCache};
use crate::config::{HubSettings, expand_template};
use crate::error::{ResolverError, Result};
use crate::racing::{fetch_bytes, fetch_key_table};
use crate::resolution::{ManifestArtifact, Resolution, Resolved};
use crate::sources::Resolve;
use crate::transport::HttpClient;

/// Source label of hub results
pub const HUB_SOURCE: &str = "hub";

/// Resolver backed by the primary hub endpoints
#[derive(Debug, Clone)]
pub struct HubResolver {
    http: HttpClient,
    cache: Arc<KeyTableCache>,
    settings: HubSettings,
}

impl HubResolver {
    pub fn new(http: HttpClient, cache: Arc<KeyTableCache>, settings: HubSettings) -> Self {
        Self {
            http,
            cache,
            settings,
        }
    }

    /// Key table through the cache; the flag reports a cache hit
    pub async fn key_table(&self, force_refresh: bool) -> Result<(Arc<KeyTable>, bool)> {
        self.cache
            .get_or_fetch(force_refresh, || self.download_key_table())
            .await
    }

    /// Download the key table again and return its entry count
    pub async fn refresh_key_table(&self) -> Result<usize> {
        self.cache.refresh(|| self.download_key_table()).await
    }

    async fn download_key_table(&self) -> Result<KeyTable> {
        fetch_key_table(
            &self.http,
            &self.settings.key_table_urls,
            self.settings.key_table_timeout(),
        )
        .await
        .map(|won| won.value)
    }

    async fn manifests(&self, app_id: AppId) -> Result<ManifestMap> {
        if self.settings.manifest_api.is_empty() {
            return Ok(ManifestMap::new());
        }
        let url = expand_template(&self.settings.manifest_api, Some(app_id.get()), None, None);
        let body: Value = self
            .http
            .get_json(&url, self.settings.request_timeout())
            .await?;
        parse_manifest_response(&body)
    }

    async fn dlc(&self, app_id: AppId) -> Result<(Option<String>, Vec<u64>)> {
        if self.settings.dlc_api.is_empty() {
            return Ok((None, Vec::new()));
        }
        let url = expand_template(&self.settings.dlc_api, Some(app_id.get()), None, None);
        let body: Value = self
            .http
            .get_json(&url, self.settings.request_timeout())
            .await?;
        Ok(parse_dlc_response(&body, app_id))
    }

    async fn download_payload(&self, depot_id: DepotId, manifest_id: &str) -> Option<ManifestArtifact> {
        let urls: Vec<String> = self
            .settings
            .manifest_download_urls
            .iter()
            .map(|t| expand_template(t, None, Some(depot_id), Some(manifest_id)))
            .collect();

        match fetch_bytes(&self.http, &urls, self.settings.request_timeout()).await {
            Ok(won) => Some(ManifestArtifact::with_payload(
                depot_id,
                manifest_id,
                won.value.to_vec(),
            )),
            Err(e) => {
                warn!("No manifest payload for depot {depot_id} ({manifest_id}): {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Resolve for HubResolver {
    fn name(&self) -> &str {
        HUB_SOURCE
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        if !self.settings.enabled {
            return Resolution::Empty;
        }

        let (table, manifests, dlc) = tokio::join!(
            self.key_table(false),
            self.manifests(app_id),
            self.dlc(app_id)
        );

        let manifest_error = manifests.as_ref().err().map(ToString::to_string);
        let manifests = manifests.unwrap_or_else(|e| {
            if e.is_not_found() {
                debug!("Hub has no manifests for {app_id}: {e}");
            } else {
                warn!("Hub manifest lookup for {app_id} failed: {e}");
            }
            ManifestMap::new()
        });

        let (game_name, dlc_ids) = dlc.unwrap_or_else(|e| {
            debug!("DLC lookup for {app_id} failed: {e}");
            (None, Vec::new())
        });

        let relevant: Vec<DepotId> = std::iter::once(app_id.get())
            .chain(manifests.keys().copied())
            .collect();

        let mut keys = DepotKeys::new();
        let table_error = match table {
            Ok((table, from_cache)) => {
                extract_keys(&table, &relevant, &mut keys);
                let missing: Vec<DepotId> = relevant
                    .iter()
                    .copied()
                    .filter(|id| !keys.contains(*id))
                    .collect();

                if !missing.is_empty() && from_cache {
                    debug!(
                        "{} relevant ids lack keys, refreshing key table",
                        missing.len()
                    );
                    match self.key_table(true).await {
                        Ok((fresh, _)) => extract_keys(&fresh, &missing, &mut keys),
                        Err(e) => warn!("Key table refresh failed: {e}"),
                    }
                }
                None
            }
            Err(e) => {
                warn!("Key table unavailable: {e}");
                Some(e.to_string())
            }
        };

        if let (Some(table_error), Some(manifest_error)) = (&table_error, &manifest_error) {
            return Resolution::failed(format!(
                "key table: {table_error}; manifests: {manifest_error}"
            ));
        }

        let mut resolved = Resolved::new(app_id, HUB_SOURCE);
        resolved.game_name = game_name;
        resolved.dlc_ids = dlc_ids;
        resolved.depot_keys = keys;

        if !self.settings.manifest_download_urls.is_empty() {
            let downloads = manifests
                .iter()
                .map(|(depot_id, manifest_id)| self.download_payload(*depot_id, manifest_id));
            resolved.artifacts = join_all(downloads).await.into_iter().flatten().collect();
        }
        resolved.manifests = manifests;

        info!(
            "Hub resolved {app_id}: {} keys, {} manifests, {} payloads, {} DLC",
            resolved.depot_keys.len(),
            resolved.manifests.len(),
            resolved.artifacts.len(),
            resolved.dlc_ids.len()
        );
        Resolution::found(resolved)
    }
}

/// Copy keys for `ids` out of the bulk table, skipping non-hex values
fn extract_keys(table: &KeyTable, ids: &[DepotId], keys: &mut DepotKeys) {
    for &id in ids {
        if let Some(key) = table.get(&id.to_string()) {
            if is_hex(key) {
                keys.insert(id, key.as_str());
            }
        }
    }
}

/// Parse a manifest API body: `{"depots": {..}}` or a flat object, values as
/// strings or numbers
pub fn parse_manifest_response(body: &Value) -> Result<ManifestMap> {
    let object = body
        .get("depots")
        .and_then(Value::as_object)
        .or_else(|| body.as_object())
        .ok_or_else(|| ResolverError::Parse("manifest response is not an object".to_string()))?;

    let mut manifests = ManifestMap::new();
    for (depot, manifest) in object {
        let Ok(depot_id) = parse_id(depot) else {
            continue;
        };
        let manifest_id = match manifest {
            Value::String(s) if parse_id(s).is_ok() => s.clone(),
            Value::Number(n) if n.is_u64() => n.to_string(),
            _ => continue,
        };
        manifests.insert(depot_id, manifest_id);
    }
    Ok(manifests)
}

/// Parse a storefront `appdetails` body into the game name and DLC ids
pub fn parse_dlc_response(body: &Value, app_id: AppId) -> (Option<String>, Vec<u64>) {
    let Some(data) = body
        .get(app_id.to_string())
        .filter(|entry| entry.get("success").and_then(Value::as_bool) == Some(true))
        .and_then(|entry| entry.get("data"))
    else {
        return (None, Vec::new());
    };

    let name = data.get("name").and_then(Value::as_str).map(str::to_string);
    let dlc = data
        .get("dlc")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| match id {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => parse_id(s).ok(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    (name, dlc)
}
