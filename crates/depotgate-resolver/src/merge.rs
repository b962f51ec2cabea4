//! Hub and repository result merging
//!
//! The hub often knows every manifest of an app but none of its keys, while a
//! repository may hold keys for the same depots. When that happens the two
//! results are combined instead of discarding the hub's manifests.

use tracing::info;

use crate::resolution::{Resolution, Resolved};

/// Combine a keyless hub result with a later result that has keys
///
/// The composite takes manifests, DLC ids, name and artifacts from `hub`, keys
/// from `later`, and appends `later`'s artifacts for depots the hub does not
/// cover. In every other case `later` is returned unchanged.
pub fn merge(hub: &Resolution, later: Resolution) -> Resolution {
    let Some(base) = hub.as_found() else {
        return later;
    };
    if base.manifests.is_empty() || !base.depot_keys.is_empty() {
        return later;
    }
    let extra = match later {
        Resolution::Found(extra) if !extra.depot_keys.is_empty() => extra,
        other => return other,
    };

    let mut merged = Resolved {
        source: format!("{} + {}", base.source, extra.source),
        depot_keys: extra.depot_keys,
        ..base.clone()
    };
    for artifact in extra.artifacts {
        if merged.manifests.contains_key(&artifact.depot_id) {
            continue;
        }
        merged.add_artifact(artifact);
    }

    info!(
        "Merged {} manifests with {} keys ({})",
        merged.manifests.len(),
        merged.depot_keys.len(),
        merged.source
    );
    Resolution::found(merged)
}
