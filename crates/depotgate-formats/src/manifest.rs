//! Manifest file naming
//!
//! Binary depot manifests are stored as `<depot_id>_<manifest_id>.manifest`,
//! both in source repositories and in the produced archive.

use crate::ids::{DepotId, parse_id};

/// File extension of manifest files, including the dot
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// Archive/file name for a depot manifest
pub fn manifest_file_name(depot_id: DepotId, manifest_id: &str) -> String {
    format!("{depot_id}_{manifest_id}{MANIFEST_SUFFIX}")
}

/// Whether `path` names a manifest file
pub fn is_manifest_path(path: &str) -> bool {
    path.ends_with(MANIFEST_SUFFIX)
}

/// Split a manifest file name (or a path ending in one) into depot and
/// manifest ids
///
/// Returns `None` unless both halves are decimal ids.
pub fn parse_manifest_file_name(path: &str) -> Option<(DepotId, String)> {
    let name = path.rsplit(['/', '\\']).next()?;
    let stem = name.strip_suffix(MANIFEST_SUFFIX)?;
    let (depot, manifest) = stem.split_once('_')?;
    let depot_id = parse_id(depot).ok()?;
    parse_id(manifest).ok()?;
    Some((depot_id, manifest.to_string()))
}
