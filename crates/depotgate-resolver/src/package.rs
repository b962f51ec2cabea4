//! Archive packaging
//!
//! Turns a resolved result into `<work_dir>/<app_id>.zip` holding the unlock
//! script and every manifest payload.

use depotgate_formats::{ArchiveEntry, ArchiveWriter, ScriptInput, generate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ResolverError, Result};
use crate::resolution::Resolved;

/// Summary of a written archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub app_id: u64,
    pub game_name: Option<String>,
    pub archive_path: PathBuf,
    pub key_count: usize,
    pub manifest_count: usize,
    pub dlc_count: usize,
    pub source: String,
}

/// Writes resolved results as archives
#[derive(Debug, Clone, Copy, Default)]
pub struct Packager {
    set_manifest_id: bool,
}

impl Packager {
    pub fn new(set_manifest_id: bool) -> Self {
        Self { set_manifest_id }
    }

    /// Archive entries for `resolved`: the script first, then payloads
    pub fn entries(&self, resolved: &Resolved) -> Vec<ArchiveEntry> {
        let script = generate(&ScriptInput {
            app_id: resolved.app_id,
            keys: &resolved.depot_keys,
            manifests: &resolved.manifests,
            dlc_ids: &resolved.dlc_ids,
            set_manifest_id: self.set_manifest_id,
        });

        let mut entries = vec![ArchiveEntry::new(
            format!("{}.lua", resolved.app_id),
            script.into_bytes(),
        )];
        for artifact in resolved.payload_artifacts() {
            if let Some(payload) = &artifact.payload {
                entries.push(ArchiveEntry::new(artifact.file_name(), payload.clone()));
            }
        }
        entries
    }

    /// Build and write the archive into `work_dir`
    pub async fn package(&self, resolved: &Resolved, work_dir: &Path) -> Result<PackageReport> {
        let entries = self.entries(resolved);
        let bytes = ArchiveWriter::build(&entries)?;

        tokio::fs::create_dir_all(work_dir).await.map_err(|e| {
            ResolverError::Packaging(format!("cannot create {}: {e}", work_dir.display()))
        })?;
        let archive_path = work_dir.join(format!("{}.zip", resolved.app_id));
        tokio::fs::write(&archive_path, &bytes).await.map_err(|e| {
            ResolverError::Packaging(format!("cannot write {}: {e}", archive_path.display()))
        })?;
        debug!(
            "Wrote {} entries ({} bytes) to {:?}",
            entries.len(),
            bytes.len(),
            archive_path
        );

        let report = PackageReport {
            app_id: resolved.app_id.get(),
            game_name: resolved.game_name.clone(),
            archive_path,
            key_count: resolved.depot_keys.len(),
            manifest_count: resolved.manifests.len(),
            dlc_count: resolved.dlc_ids.len(),
            source: resolved.source.clone(),
        };
        info!(
            "Packaged {}: {} keys, {} manifests, {} DLC via {}",
            report.app_id, report.key_count, report.manifest_count, report.dlc_count, report.source
        );
        Ok(report)
    }
}
