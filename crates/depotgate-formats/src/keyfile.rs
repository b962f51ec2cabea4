//! Depot key extraction from key-bearing VDF configuration files
//!
//! Repositories ship depot keys in `key.vdf` or `config.vdf` files shaped like:
//!
//! ```text
//! "depots"
//! {
//!     "228988"
//!     {
//!         "DecryptionKey"    "44d8c45ce229a11c4f231a3d2a350eaf80b0d69a8af938ec7ccca720f694b0e8"
//!     }
//! }
//! ```
//!
//! The scanner is a two-state machine fed one line at a time. It does not
//! track braces: once the `depots` marker is seen, every quoted numeric line
//! becomes the current depot and every `DecryptionKey` line is attributed to
//! it.

use crate::ids::{DepotId, DepotKeys, is_hex, parse_id};

/// File names recognised as carrying depot keys
pub const KEY_FILE_NAMES: [&str; 2] = ["key.vdf", "config.vdf"];

/// Whether `file_name` (a bare name, not a path) is a key-bearing file
pub fn is_key_file(file_name: &str) -> bool {
    KEY_FILE_NAMES.contains(&file_name)
}

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Before the `depots` section marker
    #[default]
    Outside,
    /// Inside the `depots` section
    InDepots {
        /// Depot id of the most recent numeric key line
        current: Option<DepotId>,
    },
}

/// Line-driven key file scanner
#[derive(Debug, Clone, Default)]
pub struct KeyFileScanner {
    state: ScanState,
    keys: DepotKeys,
}

impl KeyFileScanner {
    /// Create a scanner in the `Outside` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feed one line
    pub fn feed_line(&mut self, line: &str) {
        let tokens = quoted_tokens(line);

        self.state = match self.state {
            ScanState::Outside => {
                if tokens
                    .first()
                    .is_some_and(|t| t.eq_ignore_ascii_case("depots"))
                {
                    ScanState::InDepots { current: None }
                } else {
                    ScanState::Outside
                }
            }
            ScanState::InDepots { current } => match tokens.as_slice() {
                [id] if parse_id(id).is_ok() => ScanState::InDepots {
                    current: parse_id(id).ok(),
                },
                [field, value, ..] if field.eq_ignore_ascii_case("DecryptionKey") => {
                    if let Some(depot_id) = current {
                        if is_hex(value) {
                            self.keys.insert(depot_id, *value);
                        }
                    }
                    ScanState::InDepots { current }
                }
                _ => ScanState::InDepots { current },
            },
        };
    }

    /// Finish scanning and return every key found
    pub fn finish(self) -> DepotKeys {
        self.keys
    }
}

/// Scan a whole key file
pub fn scan_key_file(text: &str) -> DepotKeys {
    let mut scanner = KeyFileScanner::new();
    for line in text.lines() {
        scanner.feed_line(line);
    }
    scanner.finish()
}

/// Extract the `"..."` tokens of a line, ignoring everything outside quotes
fn quoted_tokens(line: &str) -> Vec<&str> {
    line.split('"').skip(1).step_by(2).collect()
}
