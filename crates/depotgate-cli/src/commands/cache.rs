//! `depotgate cache`

use anyhow::Result;
use depotgate_resolver::{CacheStatus, Orchestrator, Settings};
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

use crate::{CacheCommands, OutputFormat};

pub async fn handle(settings: Settings, command: CacheCommands, format: OutputFormat) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match command {
        CacheCommands::Status => {
            let status = orchestrator.cache_status().await;
            match format.render_json(&status)? {
                Some(json) => println!("{json}"),
                None => print!("{}", format_status(&status)),
            }
        }
        CacheCommands::Clear => {
            orchestrator.clear_cache().await;
            match format.render_json(&json!({ "cleared": true }))? {
                Some(json) => println!("{json}"),
                None => println!("Key table cache cleared"),
            }
        }
        CacheCommands::Refresh => {
            let entries = orchestrator.refresh_cache().await?;
            match format.render_json(&json!({ "entries": entries }))? {
                Some(json) => println!("{json}"),
                None => println!("Key table refreshed: {entries} entries"),
            }
        }
    }
    Ok(())
}

fn format_age(age: Option<Duration>) -> String {
    age.map_or_else(|| "-".to_string(), |age| format!("{}s", age.as_secs()))
}

/// Human-readable cache status
pub fn format_status(status: &CacheStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Memory: {} ({} entries, age {})",
        if status.has_memory_entry { "present" } else { "empty" },
        status.memory_entry_count,
        format_age(status.memory_entry_age)
    );
    let _ = writeln!(
        out,
        "File:   {} ({} entries, age {})",
        if status.has_file_entry { "present" } else { "empty" },
        status.file_entry_count,
        format_age(status.file_entry_age)
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_status() {
        let status = CacheStatus {
            has_file_entry: true,
            file_entry_count: 42,
            file_entry_age: Some(Duration::from_secs(90)),
            ..CacheStatus::default()
        };

        assert_eq!(
            format_status(&status),
            "Memory: empty (0 entries, age -)\nFile:   present (42 entries, age 90s)\n"
        );
    }
}
