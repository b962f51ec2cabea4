//! Auxiliary multi-source resolver
//!
//! Last resort after the hub and the repositories. Mirrors are tried in
//! configured order and the first one with at least one key or manifest
//! artifact wins.

use async_trait::async_trait;
use depotgate_formats::{AppId, DepotId, parse_id};
use futures::future::join_all;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{SourceConfig, SourceKind, expand_template};
use crate::error::{ResolverError, Result};
use crate::resolution::{ManifestArtifact, Resolution, Resolved};
use crate::sources::hub::parse_manifest_response;
use crate::sources::scan::ContentScan;
use crate::sources::{Resolve, SourceContext};
use crate::transport::HttpClient;

/// Mirror URL for an app: the template with `{app_id}` substituted, or
/// `suffix` appended to the base
fn app_url(base: &str, app_id: AppId, suffix: &str) -> String {
    if base.contains("{app_id}") {
        expand_template(base, Some(app_id.get()), None, None)
    } else {
        format!("{}/{app_id}{suffix}", base.trim_end_matches('/'))
    }
}

/// Mirror serving one zip archive per app
#[derive(Debug, Clone)]
pub struct ZipMirror {
    name: String,
    base: String,
    http: HttpClient,
    timeout: Duration,
}

#[async_trait]
impl Resolve for ZipMirror {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let url = app_url(&self.base, app_id, ".zip");
        let (status, body) = match self.http.get_raw(&url, self.timeout).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: request failed: {e}", self.name);
                return Resolution::failed(e);
            }
        };

        if status == StatusCode::NOT_FOUND {
            debug!("{}: no archive for {app_id}", self.name);
            return Resolution::Empty;
        }
        if status != StatusCode::OK {
            warn!("{}: returned {status}", self.name);
            return Resolution::failed(ResolverError::HttpStatus { status, url });
        }

        let mut scan = ContentScan::new();
        if let Err(e) = scan.add_zip(&body) {
            warn!("{}: unreadable archive: {e}", self.name);
            return Resolution::failed(e);
        }

        if scan.keys.is_empty() && scan.artifacts.is_empty() {
            debug!("{}: archive for {app_id} holds no keys or manifests", self.name);
            return Resolution::Empty;
        }
        Resolution::found(scan.into_resolved(app_id, self.name.clone()))
    }
}

/// REST endpoint answering with a depot -> manifest map
#[derive(Debug, Clone)]
pub struct KeyValueMirror {
    name: String,
    base: String,
    http: HttpClient,
    timeout: Duration,
}

#[async_trait]
impl Resolve for KeyValueMirror {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let url = app_url(&self.base, app_id, "");
        let manifests = match self
            .http
            .get_json::<Value>(&url, self.timeout)
            .await
            .and_then(|body| parse_manifest_response(&body))
        {
            Ok(manifests) => manifests,
            Err(e) if e.is_not_found() => {
                debug!("{}: nothing for {app_id}", self.name);
                return Resolution::Empty;
            }
            Err(e) => {
                warn!("{}: lookup failed: {e}", self.name);
                return Resolution::failed(e);
            }
        };

        let mut resolved = Resolved::new(app_id, self.name.clone());
        for (depot_id, manifest_id) in manifests {
            resolved.add_artifact(ManifestArtifact::placeholder(depot_id, manifest_id));
        }
        Resolution::found(resolved)
    }
}

#[derive(Debug, Deserialize)]
struct Session {
    token: String,
}

/// Token-based API that lists depots and serves manifests one by one
#[derive(Debug, Clone)]
pub struct SessionMirror {
    name: String,
    base: String,
    http: HttpClient,
    timeout: Duration,
}

impl SessionMirror {
    async fn open_session(&self) -> Result<String> {
        let session: Session = self
            .http
            .post_json(&format!("{}/session", self.base), self.timeout)
            .await?;
        if session.token.is_empty() {
            return Err(ResolverError::Parse("empty session token".to_string()));
        }
        Ok(session.token)
    }

    async fn list_depots(&self, token: &str, app_id: AppId) -> Result<Vec<(DepotId, String)>> {
        let url = format!("{}/apps/{app_id}/depots", self.base);
        let body: Vec<Value> = self.http.get_json_bearer(&url, token, self.timeout).await?;
        Ok(body.iter().filter_map(depot_entry).collect())
    }

    async fn download(&self, token: &str, depot_id: DepotId, manifest_id: String) -> Option<ManifestArtifact> {
        let url = format!("{}/depots/{depot_id}/manifests/{manifest_id}", self.base);
        match self.http.get_bytes_bearer(&url, token, self.timeout).await {
            Ok(body) => Some(ManifestArtifact::with_payload(depot_id, manifest_id, body.to_vec())),
            Err(e) => {
                warn!("{}: skipping depot {depot_id}: {e}", self.name);
                None
            }
        }
    }
}

/// `{ "depot_id": .., "manifest_id": .. }` with ids as numbers or strings
fn depot_entry(entry: &Value) -> Option<(DepotId, String)> {
    let depot_id = match entry.get("depot_id")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => parse_id(s).ok()?,
        _ => return None,
    };
    let manifest_id = match entry.get("manifest_id")? {
        Value::Number(n) => n.as_u64()?.to_string(),
        Value::String(s) if parse_id(s).is_ok() => s.clone(),
        _ => return None,
    };
    Some((depot_id, manifest_id))
}

#[async_trait]
impl Resolve for SessionMirror {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let token = match self.open_session().await {
            Ok(token) => token,
            Err(e) => {
                warn!("{}: session failed: {e}", self.name);
                return Resolution::failed(e);
            }
        };

        let depots = match self.list_depots(&token, app_id).await {
            Ok(depots) => depots,
            Err(e) if e.is_not_found() => {
                debug!("{}: no depots for {app_id}", self.name);
                return Resolution::Empty;
            }
            Err(e) => {
                warn!("{}: depot listing failed: {e}", self.name);
                return Resolution::failed(e);
            }
        };

        let downloads = depots
            .into_iter()
            .map(|(depot_id, manifest_id)| self.download(&token, depot_id, manifest_id));

        let mut resolved = Resolved::new(app_id, self.name.clone());
        for artifact in join_all(downloads).await.into_iter().flatten() {
            resolved.add_artifact(artifact);
        }
        Resolution::found(resolved)
    }
}

/// Closed set of mirror strategies
#[derive(Debug, Clone)]
pub enum MirrorStrategy {
    ZipMirror(ZipMirror),
    KeyValueApi(KeyValueMirror),
    SessionApi(SessionMirror),
}

impl MirrorStrategy {
    /// Strategy for a mirror source; `None` for repository kinds
    pub fn from_config(source: &SourceConfig, context: &SourceContext) -> Option<Self> {
        let name = source.name.clone();
        let base = source.base_location.trim_end_matches('/').to_string();
        let http = context.http.clone();
        let timeout = context.request_timeout;

        match source.kind {
            SourceKind::ZipMirror => Some(Self::ZipMirror(ZipMirror {
                name,
                base,
                http,
                timeout,
            })),
            SourceKind::KeyValueApi => Some(Self::KeyValueApi(KeyValueMirror {
                name,
                base,
                http,
                timeout,
            })),
            SourceKind::SessionApi => Some(Self::SessionApi(SessionMirror {
                name,
                base,
                http,
                timeout,
            })),
            SourceKind::Branch | SourceKind::EncryptedTree | SourceKind::DecryptedTree => None,
        }
    }
}

#[async_trait]
impl Resolve for MirrorStrategy {
    fn name(&self) -> &str {
        match self {
            Self::ZipMirror(m) => m.name(),
            Self::KeyValueApi(m) => m.name(),
            Self::SessionApi(m) => m.name(),
        }
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        match self {
            Self::ZipMirror(m) => m.resolve(app_id).await,
            Self::KeyValueApi(m) => m.resolve(app_id).await,
            Self::SessionApi(m) => m.resolve(app_id).await,
        }
    }
}

/// Tries every mirror in order until one finds something
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryResolver {
    mirrors: Vec<MirrorStrategy>,
}

impl AuxiliaryResolver {
    pub fn new(mirrors: Vec<MirrorStrategy>) -> Self {
        Self { mirrors }
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

#[async_trait]
impl Resolve for AuxiliaryResolver {
    fn name(&self) -> &str {
        "mirrors"
    }

    async fn resolve(&self, app_id: AppId) -> Resolution {
        let mut failures = Vec::new();

        for mirror in &self.mirrors {
            match mirror.resolve(app_id).await {
                Resolution::Found(resolved) => {
                    info!("Mirror {} resolved {app_id}", mirror.name());
                    return Resolution::Found(resolved);
                }
                Resolution::Empty => {}
                Resolution::Failed { reason } => {
                    failures.push(format!("{}: {reason}", mirror.name()));
                }
            }
        }

        if failures.is_empty() {
            Resolution::Empty
        } else {
            Resolution::failed(failures.join("; "))
        }
    }
}
