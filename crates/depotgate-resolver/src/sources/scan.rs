//! Content scanning for downloaded archives and files
//!
//! Archives are extracted in memory. Each entry is classified by name:
//! key-bearing VDF files go through the key-file scanner and manifest files
//! become artifacts with their payload. Every other UTF-8 entry is scanned
//! for keyed `addappid` and `setManifestid` lines, whatever its extension.

use depotgate_formats::{
    AppId, DepotKeys, ManifestMap, is_key_file, is_manifest_path, parse_manifest_file_name,
    scan_key_file,
};
use std::io::{Cursor, Read};
use tracing::{debug, trace};
use zip::ZipArchive;

use crate::error::Result;
use crate::resolution::{ManifestArtifact, Resolved};

/// Everything found in a set of files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentScan {
    pub keys: DepotKeys,
    /// Manifest pins from unlock scripts
    pub pinned: ManifestMap,
    pub artifacts: Vec<ManifestArtifact>,
}

impl ContentScan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and scan one file
    pub fn add_file(&mut self, path: &str, content: &[u8]) {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);

        if is_key_file(name) {
            let keys = scan_key_file(&String::from_utf8_lossy(content));
            trace!("{path}: {} keys", keys.len());
            self.keys.extend(keys);
        } else if is_manifest_path(name) {
            match parse_manifest_file_name(name) {
                Some((depot_id, manifest_id)) => {
                    self.artifacts
                        .retain(|a: &ManifestArtifact| a.depot_id != depot_id);
                    self.artifacts.push(ManifestArtifact::with_payload(
                        depot_id,
                        manifest_id,
                        content.to_vec(),
                    ));
                }
                None => debug!("Skipping manifest with unrecognised name: {path}"),
            }
        } else {
            let Ok(text) = std::str::from_utf8(content) else {
                trace!("{path}: not UTF-8, skipped");
                return;
            };
            let scan = depotgate_formats::scan(text);
            if !scan.is_empty() {
                trace!(
                    "{path}: {} keys, {} pins",
                    scan.keys.len(),
                    scan.manifests.len()
                );
            }
            self.keys.extend(scan.keys);
            self.pinned.extend(scan.manifests);
        }
    }

    /// Extract an in-memory zip archive and scan every file entry
    pub fn add_zip(&mut self, bytes: &[u8]) -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let Some(path) = file.enclosed_name() else {
                debug!("Skipping unsafe archive path: {}", file.name());
                continue;
            };
            let path = path.to_string_lossy().into_owned();

            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            self.add_file(&path, &content);
        }

        Ok(())
    }

    /// Whether no keys and no manifests were found
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.pinned.is_empty() && self.artifacts.is_empty()
    }

    /// Turn the scan into a result attributed to `source`
    pub fn into_resolved(self, app_id: AppId, source: impl Into<String>) -> Resolved {
        let mut resolved = Resolved::new(app_id, source);
        resolved.depot_keys = self.keys;
        resolved.manifests = self.pinned;
        for artifact in self.artifacts {
            resolved.add_artifact(artifact);
        }
        resolved
    }
}
