//! Identifier types shared by every depotgate component
//!
//! App ids, depot ids and manifest ids all travel as decimal strings on the
//! wire. They are parsed once at the edge into integers so that ordering is
//! numeric ("10" sorts after "2") everywhere downstream.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Depot identifier
pub type DepotId = u64;

/// Depot id -> manifest id, iterated in ascending depot order
pub type ManifestMap = BTreeMap<DepotId, String>;

/// Identifier parsing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Input was empty
    #[error("identifier is empty")]
    Empty,

    /// Input contained something other than ASCII digits
    #[error("identifier '{0}' is not a decimal number")]
    NotNumeric(String),

    /// Input does not fit in 64 bits
    #[error("identifier '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse a strict `^\d+$` decimal identifier.
///
/// Leading/trailing whitespace, signs and separators are rejected.
pub fn parse_id(input: &str) -> Result<u64, IdError> {
    if input.is_empty() {
        return Err(IdError::Empty);
    }
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdError::NotNumeric(input.to_string()));
    }
    input
        .parse::<u64>()
        .map_err(|_| IdError::OutOfRange(input.to_string()))
}

/// Game (application) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(u64);

impl AppId {
    /// Wrap a raw numeric id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id(s).map(Self)
    }
}

impl From<u64> for AppId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Decryption key for a single depot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotKey {
    /// Depot the key unlocks
    pub depot_id: DepotId,
    /// Hex-encoded key
    pub key: String,
}

/// Set of depot keys, unique per depot id
///
/// Inserting a key for a depot that already has one replaces it, so the last
/// writer wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepotKeys(BTreeMap<DepotId, String>);

impl DepotKeys {
    /// Create an empty key set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the key for `depot_id`
    pub fn insert(&mut self, depot_id: DepotId, key: impl Into<String>) {
        self.0.insert(depot_id, key.into());
    }

    /// Look up the key for `depot_id`
    pub fn get(&self, depot_id: DepotId) -> Option<&str> {
        self.0.get(&depot_id).map(String::as_str)
    }

    /// Whether a key is known for `depot_id`
    pub fn contains(&self, depot_id: DepotId) -> bool {
        self.0.contains_key(&depot_id)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another key set into this one; `other` wins on conflicts
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Iterate keys in ascending depot order
    pub fn iter(&self) -> impl Iterator<Item = DepotKey> + '_ {
        self.0.iter().map(|(&depot_id, key)| DepotKey {
            depot_id,
            key: key.clone(),
        })
    }
}

/// Whether `s` is a non-empty string of hex digits
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_accepts_digits() {
        assert_eq!(parse_id("0"), Ok(0));
        assert_eq!(parse_id("730"), Ok(730));
        assert_eq!(parse_id("007"), Ok(7));
    }

    #[test]
    fn test_parse_id_rejects_malformed() {
        assert_eq!(parse_id(""), Err(IdError::Empty));
        assert!(matches!(parse_id(" 730"), Err(IdError::NotNumeric(_))));
        assert!(matches!(parse_id("-1"), Err(IdError::NotNumeric(_))));
        assert!(matches!(parse_id("12a"), Err(IdError::NotNumeric(_))));
        assert!(matches!(
            parse_id("99999999999999999999999"),
            Err(IdError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_app_id_round_trips_through_display() {
        let app: AppId = "1245620".parse().expect("Operation should succeed");
        assert_eq!(app.get(), 1_245_620);
        assert_eq!(app.to_string(), "1245620");
    }

    #[test]
    fn test_depot_keys_last_writer_wins() {
        let mut keys = DepotKeys::new();
        keys.insert(100, "aa");
        keys.insert(100, "bb");
        keys.insert(20, "cc");

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get(100), Some("bb"));

        let order: Vec<u64> = keys.iter().map(|k| k.depot_id).collect();
        assert_eq!(order, vec![20, 100]);
    }

    #[test]
    fn test_is_hex() {
        assert!(is_hex("deadBEEF0123"));
        assert!(!is_hex(""));
        assert!(!is_hex("xyz"));
    }
}
