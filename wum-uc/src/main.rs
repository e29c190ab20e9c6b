//! `wum-uc`: creates and validates update archives.
//!
//! Every invocation first runs the startup sequence (log level, config
//! layers, workspace reclamation and provisioning), then the subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wum_uc::exit_codes;
use wum_uc::io::config::ConfigSummary;
use wum_uc::startup::{Session, StartupOptions, bootstrap};

const BUILD_DATE: Option<&str> = option_env!("WUM_UC_BUILD_DATE");

#[derive(Parser)]
#[command(
    name = "wum-uc",
    version,
    about = "This tool is used to create and validate updates"
)]
struct Cli {
    /// Config file (default: ./config.toml, then ~/.wum-uc/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Enable debug logs.
    #[arg(short, long, global = true)]
    debug: bool,
    /// Enable trace logs.
    #[arg(short, long, global = true)]
    trace: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved configuration and this run's workspace.
    Config {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the version and build date.
    Version,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::FATAL);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let options = StartupOptions::from_flags(cli.config, cli.debug, cli.trace);
    let session = bootstrap(&options)?;
    match cli.command {
        Command::Config { json } => cmd_config(&session, json),
        Command::Version => cmd_version(),
    }
}

fn cmd_config(session: &Session, json: bool) -> Result<()> {
    let summary = session.config.summary();
    if json {
        let payload = serde_json::to_string_pretty(&summary).context("serialize config")?;
        println!("{payload}");
        return Ok(());
    }
    for line in render_summary(&summary) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_version() -> Result<()> {
    println!("wum-uc version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build date: {}", BUILD_DATE.unwrap_or("unknown"));
    Ok(())
}

/// One `key: value` line per known key.
fn render_summary(summary: &ConfigSummary) -> Vec<String> {
    let path_or_none = |path: &Option<PathBuf>| {
        path.as_ref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string())
    };
    let mut lines = vec![
        format!("config_file: {}", path_or_none(&summary.config_file)),
        format!("temp_dir: {}", path_or_none(&summary.temp_dir)),
        format!("check_md5_disabled: {}", summary.check_md5_disabled),
        format!(
            "resource_files.mandatory: {}",
            summary.resource_files_mandatory.join(", ")
        ),
        format!(
            "resource_files.optional: {}",
            summary.resource_files_optional.join(", ")
        ),
        format!(
            "resource_files.skip: {}",
            summary.resource_files_skip.join(", ")
        ),
    ];
    for (version, name) in &summary.platform_versions {
        lines.push(format!("platform_versions.{version}: {name}"));
    }
    lines
}
