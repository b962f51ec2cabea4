//! Resolution results
//!
//! Every resolver returns a [`Resolution`]. A `Found` value always carries at
//! least one key or manifest; constructing one through [`Resolution::found`]
//! downgrades an empty result to `Empty`.

use depotgate_formats::{AppId, DepotId, DepotKeys, ManifestMap, manifest_file_name};
use std::fmt;

/// One depot manifest carried into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestArtifact {
    pub depot_id: DepotId,
    pub manifest_id: String,
    /// Binary manifest; `None` for sources that only know the ids
    pub payload: Option<Vec<u8>>,
}

impl ManifestArtifact {
    /// Artifact with a downloaded manifest
    pub fn with_payload(depot_id: DepotId, manifest_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            depot_id,
            manifest_id: manifest_id.into(),
            payload: Some(payload),
        }
    }

    /// Id-only placeholder
    pub fn placeholder(depot_id: DepotId, manifest_id: impl Into<String>) -> Self {
        Self {
            depot_id,
            manifest_id: manifest_id.into(),
            payload: None,
        }
    }

    /// Whether this artifact carries no payload
    pub fn is_placeholder(&self) -> bool {
        self.payload.is_none()
    }

    /// Archive file name
    pub fn file_name(&self) -> String {
        manifest_file_name(self.depot_id, &self.manifest_id)
    }
}

/// Data resolved for one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub app_id: AppId,
    pub game_name: Option<String>,
    pub depot_keys: DepotKeys,
    pub manifests: ManifestMap,
    pub dlc_ids: Vec<u64>,
    pub artifacts: Vec<ManifestArtifact>,
    /// Human-readable label of the source(s) that produced this result
    pub source: String,
}

impl Resolved {
    /// Empty result attributed to `source`
    pub fn new(app_id: AppId, source: impl Into<String>) -> Self {
        Self {
            app_id,
            game_name: None,
            depot_keys: DepotKeys::new(),
            manifests: ManifestMap::new(),
            dlc_ids: Vec::new(),
            artifacts: Vec::new(),
            source: source.into(),
        }
    }

    /// Whether at least one key or manifest is known
    pub fn has_data(&self) -> bool {
        !self.depot_keys.is_empty() || !self.manifests.is_empty()
    }

    /// Record an artifact and its manifest id
    pub fn add_artifact(&mut self, artifact: ManifestArtifact) {
        self.manifests
            .insert(artifact.depot_id, artifact.manifest_id.clone());
        self.artifacts.retain(|a| a.depot_id != artifact.depot_id);
        self.artifacts.push(artifact);
    }

    /// Artifacts that carry a payload
    pub fn payload_artifacts(&self) -> impl Iterator<Item = &ManifestArtifact> {
        self.artifacts.iter().filter(|a| !a.is_placeholder())
    }
}

/// Outcome of one resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Usable data, at least one key or manifest
    Found(Resolved),
    /// The source answered but had nothing for this app
    Empty,
    /// The source could not be used
    Failed { reason: String },
}

impl Resolution {
    /// `Found` if `resolved` carries any data, else `Empty`
    pub fn found(resolved: Resolved) -> Self {
        if resolved.has_data() {
            Self::Found(resolved)
        } else {
            Self::Empty
        }
    }

    /// Failure with a displayable reason
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Found with both keys and manifests
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Found(r) if !r.depot_keys.is_empty() && !r.manifests.is_empty())
    }

    pub fn as_found(&self) -> Option<&Resolved> {
        match self {
            Self::Found(resolved) => Some(resolved),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<Resolved> {
        match self {
            Self::Found(resolved) => Some(resolved),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(r) => write!(
                f,
                "found {} keys, {} manifests via {}",
                r.depot_keys.len(),
                r.manifests.len(),
                r.source
            ),
            Self::Empty => write!(f, "empty"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
