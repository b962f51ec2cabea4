//! Unlock script generation and scanning
//!
//! The unlock script is a line-oriented Lua file consumed by the emulation
//! layer. Three directives are used:
//!
//! ```text
//! addappid(<id>)                          -- register an id without a key
//! addappid(<id>, 1, "<hex key>")          -- register a depot with its key
//! setManifestid(<depot>, "<manifest>", 0) -- pin a depot to a manifest
//! ```
//!
//! Output is fully determined by the inputs: depots are emitted in ascending
//! numeric order and every id appears in at most one `addappid` line.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::ids::{AppId, DepotKeys, ManifestMap, is_hex, parse_id};

/// Script generation input
#[derive(Debug, Clone, Copy)]
pub struct ScriptInput<'a> {
    /// Primary game id, always emitted first
    pub app_id: AppId,
    /// Known depot keys
    pub keys: &'a DepotKeys,
    /// Depot -> manifest map
    pub manifests: &'a ManifestMap,
    /// DLC ids, emitted key-less in the given order
    pub dlc_ids: &'a [u64],
    /// Emit `setManifestid` pins
    pub set_manifest_id: bool,
}

/// Render the unlock script for `input`
pub fn generate(input: &ScriptInput<'_>) -> String {
    let mut out = String::new();
    let mut seen = BTreeSet::new();

    let mut add = |out: &mut String, id: u64| {
        if !seen.insert(id) {
            return;
        }
        match input.keys.get(id) {
            Some(key) => {
                let _ = writeln!(out, "addappid({id}, 1, \"{key}\")");
            }
            None => {
                let _ = writeln!(out, "addappid({id})");
            }
        }
    };

    add(&mut out, input.app_id.get());
    for &depot_id in input.manifests.keys() {
        add(&mut out, depot_id);
    }
    for &dlc_id in input.dlc_ids {
        add(&mut out, dlc_id);
    }

    if input.set_manifest_id {
        for (depot_id, manifest_id) in input.manifests {
            let _ = writeln!(out, "setManifestid({depot_id}, \"{manifest_id}\", 0)");
        }
    }

    out
}

static ADD_APP_ID_WITH_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"(?i)addappid\s*\(\s*(\d+)\s*,\s*\d+\s*,\s*"([0-9a-f]+)"\s*\)"#)
        .expect("static regex is valid")
});

static SET_MANIFEST_ID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"(?i)setmanifestid\s*\(\s*(\d+)\s*,\s*"(\d+)"\s*(?:,[^)]*)?\)"#)
        .expect("static regex is valid")
});

/// Keys and manifest pins recovered from an existing unlock script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptScan {
    /// `addappid(<depot>, <n>, "<key>")` lines
    pub keys: DepotKeys,
    /// `setManifestid(<depot>, "<manifest>", ...)` lines
    pub manifests: ManifestMap,
}

impl ScriptScan {
    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.manifests.is_empty()
    }
}

/// Scan script text for keyed `addappid` and `setManifestid` directives
///
/// Matching is case-insensitive and tolerant of whitespace. Key-less
/// `addappid` lines carry no information and are skipped.
pub fn scan(text: &str) -> ScriptScan {
    let mut result = ScriptScan::default();

    for caps in ADD_APP_ID_WITH_KEY.captures_iter(text) {
        let (Ok(depot_id), key) = (parse_id(&caps[1]), &caps[2]) else {
            continue;
        };
        if is_hex(key) {
            result.keys.insert(depot_id, key);
        }
    }

    for caps in SET_MANIFEST_ID.captures_iter(text) {
        if let Ok(depot_id) = parse_id(&caps[1]) {
            result.manifests.insert(depot_id, caps[2].to_string());
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input<'a>(
        app_id: u64,
        keys: &'a DepotKeys,
        manifests: &'a ManifestMap,
        dlc_ids: &'a [u64],
        set_manifest_id: bool,
    ) -> ScriptInput<'a> {
        ScriptInput {
            app_id: AppId::new(app_id),
            keys,
            manifests,
            dlc_ids,
            set_manifest_id,
        }
    }

    #[test]
    fn test_app_only_is_keyless() {
        let keys = DepotKeys::new();
        let manifests = ManifestMap::new();
        assert_eq!(generate(&input(730, &keys, &manifests, &[], true)), "addappid(730)\n");
    }

    #[test]
    fn test_depots_sorted_numerically_with_keys() {
        let mut keys = DepotKeys::new();
        keys.insert(10, "aa10");
        keys.insert(2, "bb02");
        let mut manifests = ManifestMap::new();
        manifests.insert(10, "1000".to_string());
        manifests.insert(2, "2000".to_string());
        manifests.insert(3, "3000".to_string());

        let text = generate(&input(1, &keys, &manifests, &[], true));
        assert_eq!(
            text,
            "addappid(1)\n\
             addappid(2, 1, \"bb02\")\n\
             addappid(3)\n\
             addappid(10, 1, \"aa10\")\n\
             setManifestid(2, \"2000\", 0)\n\
             setManifestid(3, \"3000\", 0)\n\
             setManifestid(10, \"1000\", 0)\n"
        );
    }

    #[test]
    fn test_primary_not_repeated_when_also_a_depot() {
        let mut keys = DepotKeys::new();
        keys.insert(730, "ffff");
        let mut manifests = ManifestMap::new();
        manifests.insert(730, "1".to_string());
        manifests.insert(731, "2".to_string());

        let text = generate(&input(730, &keys, &manifests, &[731, 740, 740], false));
        assert_eq!(
            text,
            "addappid(730, 1, \"ffff\")\naddappid(731)\naddappid(740)\n"
        );
    }

    #[test]
    fn test_no_pins_without_flag() {
        let keys = DepotKeys::new();
        let mut manifests = ManifestMap::new();
        manifests.insert(5, "55".to_string());
        let text = generate(&input(4, &keys, &manifests, &[], false));
        assert!(!text.contains("setManifestid"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let mut keys = DepotKeys::new();
        keys.insert(228_988, "abcdef");
        let mut manifests = ManifestMap::new();
        manifests.insert(228_988, "6645201662696499616".to_string());
        let dlc = [3_000_000, 228_988];

        let first = generate(&input(228_980, &keys, &manifests, &dlc, true));
        let second = generate(&input(228_980, &keys, &manifests, &dlc, true));
        assert_eq!(first, second);
    }

    #[test]
    fn test_scan_recovers_keys_and_pins() {
        let text = r#"
            addappid(730)
            addappid( 731 , 1 , "ABCDEF0123" ) -- comment
            AddAppId(732,0,"00ff")
            setManifestid(731, "7617088375292372759", 0)
            setmanifestid( 732 ,"42")
            addappid(733, 1, "not-hex")
        "#;

        let result = scan(text);
        assert_eq!(result.keys.get(731), Some("ABCDEF0123"));
        assert_eq!(result.keys.get(732), Some("00ff"));
        assert!(!result.keys.contains(733));
        assert!(!result.keys.contains(730));
        assert_eq!(
            result.manifests.get(&731).map(String::as_str),
            Some("7617088375292372759")
        );
        assert_eq!(result.manifests.get(&732).map(String::as_str), Some("42"));
    }

    #[test]
    fn test_scan_of_generated_script() {
        let mut keys = DepotKeys::new();
        keys.insert(11, "0a0b");
        let mut manifests = ManifestMap::new();
        manifests.insert(11, "99".to_string());
        let text = generate(&input(10, &keys, &manifests, &[], true));

        let result = scan(&text);
        assert_eq!(result.keys, keys);
        assert_eq!(result.manifests, manifests);
    }
}
