//! Configuration structures for the resolver
//!
//! Settings are loaded once, from TOML, and are read-only while a resolution
//! runs. Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ResolverError, Result};

/// File name of the persisted key table inside the cache directory
pub const KEY_TABLE_FILE_NAME: &str = "depot_keys.json";

/// Top-level resolver settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Key table cache
    pub cache: CacheSettings,

    /// Primary hub endpoints
    pub hub: HubSettings,

    /// Version-control hosting endpoints used by repository sources
    pub github: GithubSettings,

    /// Repository and mirror sources, in fallback order
    pub sources: Vec<SourceConfig>,

    /// Emit `setManifestid` pins in generated scripts
    pub set_manifest_id: bool,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ResolverError::Config(e.to_string()))
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Default settings with environment overrides applied
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// Override fields from `DEPOTGATE_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("DEPOTGATE_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        if let Some(hours) = std::env::var("DEPOTGATE_CACHE_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.cache.ttl_hours = hours;
        }
        if let Ok(api_base) = std::env::var("DEPOTGATE_GITHUB_API") {
            self.github.api_base = api_base;
        }
        if let Some(flag) = std::env::var("DEPOTGATE_SET_MANIFEST_ID")
            .ok()
            .and_then(|s| parse_flag(&s))
        {
            self.set_manifest_id = flag;
        }
    }

    /// Enabled sources only, in configured order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Key table cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory; the platform cache directory when unset
    pub dir: Option<PathBuf>,

    /// Entry lifetime in hours, 0 disables caching
    pub ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: 24,
        }
    }
}

impl CacheSettings {
    /// Resolved cache directory
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("depotgate")
        })
    }

    /// Path of the persisted key table
    pub fn key_table_path(&self) -> PathBuf {
        self.dir().join(KEY_TABLE_FILE_NAME)
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

/// Primary hub endpoints
///
/// URL templates may contain `{app_id}`, `{depot_id}` and `{manifest_id}`
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Whether the hub is queried at all
    pub enabled: bool,

    /// Equivalent mirrors of the bulk key table, raced against each other
    pub key_table_urls: Vec<String>,

    /// Per-app manifest lookup, skipped when empty
    pub manifest_api: String,

    /// Per-app DLC lookup, skipped when empty
    pub dlc_api: String,

    /// Equivalent mirrors of manifest payloads, raced per depot
    pub manifest_download_urls: Vec<String>,

    /// Per-candidate timeout for the bulk key table
    pub key_table_timeout_secs: u64,

    /// Per-candidate timeout for smaller single-resource fetches
    pub request_timeout_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key_table_urls: vec![
                "https://raw.githubusercontent.com/SteamAutoCracks/ManifestHub/main/depotkeys.json"
                    .to_string(),
                "https://cdn.jsdelivr.net/gh/SteamAutoCracks/ManifestHub@main/depotkeys.json"
                    .to_string(),
            ],
            manifest_api: String::new(),
            dlc_api: "https://store.steampowered.com/api/appdetails?appids={app_id}".to_string(),
            manifest_download_urls: Vec::new(),
            key_table_timeout_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

impl HubSettings {
    /// Per-candidate timeout for the bulk key table
    pub fn key_table_timeout(&self) -> Duration {
        Duration::from_secs(self.key_table_timeout_secs)
    }

    /// Per-candidate timeout for single-resource fetches
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Version-control hosting endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    /// REST API base
    pub api_base: String,

    /// Raw file base
    pub raw_base: String,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl GithubSettings {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Kind of a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Repository with one branch per app id, fetched as a zipball
    Branch,
    /// Repository tree with encrypted manifests
    EncryptedTree,
    /// Repository tree with decrypted manifests
    DecryptedTree,
    /// Mirror serving a per-app zip archive
    ZipMirror,
    /// REST endpoint returning a depot -> manifest map
    KeyValueApi,
    /// Token-based API listing and serving depot manifests
    SessionApi,
}

/// One configured source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Label used in logs and reports
    pub name: String,

    /// Disabled sources are never tried
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Resolution strategy
    pub kind: SourceKind,

    /// `owner/repo` for repositories, a URL (template) for mirrors
    pub base_location: String,
}

const fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    /// Create an enabled source
    pub fn new(name: impl Into<String>, kind: SourceKind, base_location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind,
            base_location: base_location.into(),
        }
    }
}

/// Substitute `{app_id}`, `{depot_id}` and `{manifest_id}` placeholders
pub fn expand_template(
    template: &str,
    app_id: Option<u64>,
    depot_id: Option<u64>,
    manifest_id: Option<&str>,
) -> String {
    let mut url = template.to_string();
    if let Some(app_id) = app_id {
        url = url.replace("{app_id}", &app_id.to_string());
    }
    if let Some(depot_id) = depot_id {
        url = url.replace("{depot_id}", &depot_id.to_string());
    }
    if let Some(manifest_id) = manifest_id {
        url = url.replace("{manifest_id}", manifest_id);
    }
    url
}
