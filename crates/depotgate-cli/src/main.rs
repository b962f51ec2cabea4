//! depotgate binary entry point
//!
//! Thin wrapper around the resolver library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Loads configuration
//! 4. Dispatches to a command handler

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use depotgate_cli::{CacheCommands, OutputFormat, commands, default_output_dir, load_settings};

#[derive(Parser)]
#[command(
    name = "depotgate",
    about = "Resolve depot keys, manifests and DLC into unlock archives",
    version
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "DEPOTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an app id and write `<app_id>.zip`
    Resolve {
        /// Numeric app id
        app_id: String,

        /// Directory receiving the archive (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Inspect or manage the key table cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve { app_id, out } => {
            let out_dir = match out {
                Some(dir) => dir,
                None => default_output_dir()?,
            };
            commands::resolve::handle(settings, &app_id, &out_dir, cli.format).await?;
        }
        Commands::Cache(command) => commands::cache::handle(settings, command, cli.format).await?,
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from(["depotgate", "-vv", "resolve", "730", "--out", "/tmp/x"])
            .expect("arguments should parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(default_filter(cli.verbose), "trace");
        assert!(matches!(
            cli.command,
            Commands::Resolve { ref app_id, out: Some(_) } if app_id == "730"
        ));
    }

    #[test]
    fn test_parse_cache_json() {
        let cli = Cli::try_parse_from(["depotgate", "cache", "status", "-o", "json"])
            .expect("arguments should parse");
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Cache(CacheCommands::Status)));
    }
}
