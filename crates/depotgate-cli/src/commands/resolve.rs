//! `depotgate resolve`

use anyhow::Result;
use depotgate_resolver::{Orchestrator, PackageReport, Settings};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::OutputFormat;

/// Resolve `app_id`, write its archive into `out_dir` and print the report
pub async fn handle(
    settings: Settings,
    app_id: &str,
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let report = orchestrator.resolve(app_id, out_dir).await?;
    info!("Archive written to {}", report.archive_path.display());

    match format.render_json(&report)? {
        Some(json) => println!("{json}"),
        None => print!("{}", format_report(&report)),
    }
    Ok(())
}

/// Human-readable report
pub fn format_report(report: &PackageReport) -> String {
    let mut out = String::new();
    match &report.game_name {
        Some(name) => {
            let _ = writeln!(out, "App {} ({name})", report.app_id);
        }
        None => {
            let _ = writeln!(out, "App {}", report.app_id);
        }
    }
    let _ = writeln!(out, "  Source:    {}", report.source);
    let _ = writeln!(out, "  Keys:      {}", report.key_count);
    let _ = writeln!(out, "  Manifests: {}", report.manifest_count);
    let _ = writeln!(out, "  DLC:       {}", report.dlc_count);
    let _ = writeln!(out, "  Archive:   {}", report.archive_path.display());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_format_report() {
        let report = PackageReport {
            app_id: 10,
            game_name: Some("Sample".to_string()),
            archive_path: PathBuf::from("out/10.zip"),
            key_count: 2,
            manifest_count: 3,
            dlc_count: 1,
            source: "hub + branch".to_string(),
        };

        assert_eq!(
            format_report(&report),
            "App 10 (Sample)\n  Source:    hub + branch\n  Keys:      2\n  Manifests: 3\n  DLC:       1\n  Archive:   out/10.zip\n"
        );
    }
}
