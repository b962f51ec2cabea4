//! Command-line front end for depotgate
//!
//! Exposes the resolver's two public surfaces: resolving an app id into an
//! unlock archive, and inspecting or managing the key table cache.

pub mod commands;

use anyhow::{Context, Result};
use clap::Subcommand;
use depotgate_resolver::Settings;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output format options for the CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl OutputFormat {
    /// Serialize `value` for the JSON formats; `None` for text
    pub fn render_json<T: Serialize>(self, value: &T) -> Result<Option<String>> {
        let rendered = match self {
            Self::Text => return Ok(None),
            Self::Json => serde_json::to_string(value)?,
            Self::JsonPretty => serde_json::to_string_pretty(value)?,
        };
        Ok(Some(rendered))
    }
}

/// Key table cache operations
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Show both cache tiers
    Status,

    /// Remove the cached key table
    Clear,

    /// Download the key table again
    Refresh,
}

/// Load settings from `path` when given, then apply environment overrides
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::from_env());
    };
    let mut settings = Settings::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    settings.apply_env();
    Ok(settings)
}

/// Default output directory for archives
pub fn default_output_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Cannot determine current directory")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[derive(Serialize)]
    struct Sample {
        count: usize,
    }

    #[test]
    fn test_render_json() {
        let sample = Sample { count: 3 };
        assert_eq!(OutputFormat::Text.render_json(&sample).unwrap(), None);
        assert_eq!(
            OutputFormat::Json.render_json(&sample).unwrap().as_deref(),
            Some("{\"count\":3}")
        );
        assert!(
            OutputFormat::JsonPretty
                .render_json(&sample)
                .unwrap()
                .unwrap()
                .contains('\n')
        );
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "set_manifest_id = true\n\n[cache]\nttl_hours = 2").unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.cache.ttl_hours, 2);
        assert!(settings.set_manifest_id);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_settings(Some(missing.as_path())).is_err());
    }
}
