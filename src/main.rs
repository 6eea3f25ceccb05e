//! System Info Collector - hardware report for esports configuration surveys
//!
//! This is a READ-ONLY collection tool that:
//! - Queries OS, CPU, memory, display and GPU details from the local machine
//! - Prints them as JSON for copy-paste into the survey form
//! - Does NOT store or upload anything

mod clipboard;
mod command;
mod config;
mod hardware;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::hardware::{InventoryRecord, Providers};

/// System Info Collector - report your hardware for the esports survey
#[derive(Parser)]
#[command(name = "system-info-collector")]
#[command(version)]
#[command(about = "Collect system information for the esports configuration survey")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(flatten)]
    collect: CollectArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Copy, Debug, Default)]
struct CollectArgs {
    /// Also copy the report to the clipboard
    #[arg(long)]
    copy: bool,

    /// Print single-line JSON instead of the indented form
    #[arg(long)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect and print the system report (default)
    Collect(CollectArgs),

    /// Show configuration path and effective settings
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { init }) => match show_config(init) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{} {:#}", "Error:".bright_red(), err);
                ExitCode::FAILURE
            }
        },
        Some(Commands::Collect(args)) => run_collect(args),
        None => run_collect(cli.collect),
    }
}

/// Logs go to stderr so stdout carries only the report
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_collect(args: CollectArgs) -> ExitCode {
    match collect_report(args) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!(
                "{} {:#}",
                "Error collecting system information:".bright_red(),
                err
            );
            ExitCode::FAILURE
        }
    }
}

/// Collect, render and optionally copy the report; nothing is printed on error
fn collect_report(args: CollectArgs) -> Result<String> {
    let config = Config::load()?;

    let providers = Providers::detect(&config.probe);
    let record = hardware::assemble(&providers);
    let report = render(&record, args.compact)?;

    if args.copy || config.output.copy_to_clipboard {
        let tool = clipboard::copy(&report).context("Failed to copy report to clipboard")?;
        eprintln!(
            "{} {}",
            "✓ System information copied to clipboard".bright_green(),
            format!("(via {tool})").bright_black()
        );
    }

    Ok(report)
}

/// Serialize the record; the default form uses 2-space indentation
fn render(record: &InventoryRecord, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(record)
    } else {
        serde_json::to_string_pretty(record)
    };
    json.context("Failed to serialize system information")
}

fn show_config(init: bool) -> Result<()> {
    let (config, path) = if init {
        Config::init()?
    } else {
        let path = Config::config_path()?;
        (Config::load_from(&path)?, path)
    };

    let status = if path.exists() {
        "".normal()
    } else {
        "(not created, using defaults)".bright_black()
    };
    println!("{} {} {}", "Config file:".bright_cyan(), path.display(), status);
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config to TOML")?
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::record::{
        CpuSection, ErrorPlaceholder, GpuEntry, MemorySection, Probed, SystemSection,
    };

    fn sample_record() -> InventoryRecord {
        InventoryRecord {
            system: Probed::Value(SystemSection {
                os: "Linux".to_string(),
                os_version: "Linux (Ubuntu 24.04)".to_string(),
                machine: "x86_64".to_string(),
                processor: "Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz".to_string(),
            }),
            cpu: Probed::Value(CpuSection {
                physical_cores: Some(6),
                total_cores: 12,
                max_frequency: Some(4500.0),
            }),
            memory: Probed::Value(MemorySection::from_bytes(17_179_869_184, 4_294_967_296)),
            displays: Vec::new(),
            gpu: vec![GpuEntry::Error(ErrorPlaceholder::new("nvidia-smi timed out after 20s"))],
        }
    }

    #[test]
    fn pretty_report_uses_two_space_indent() {
        let report = render(&sample_record(), false).unwrap();
        assert!(report.starts_with("{\n  \"system\": {\n    \"os\": \"Linux\""));
        assert!(report.contains("\n  \"displays\": [],"));
        assert!(report.contains("\"total\": 16.0"));
    }

    #[test]
    fn compact_report_is_single_line() {
        let report = render(&sample_record(), true).unwrap();
        assert!(!report.contains('\n'));
        assert!(report.contains(r#""gpu":[{"error":"nvidia-smi timed out after 20s"}]"#));
    }

    #[test]
    fn cli_defaults_to_collect() {
        let cli = Cli::try_parse_from(["system-info-collector"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.collect.copy);

        let cli = Cli::try_parse_from(["system-info-collector", "--copy"]).unwrap();
        assert!(cli.collect.copy);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["system-info-collector", "collect", "--compact"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Collect(CollectArgs { compact: true, copy: false }))
        ));

        let cli = Cli::try_parse_from(["system-info-collector", "config", "--init"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { init: true })));
    }

    #[test]
    fn top_level_flags_conflict_with_subcommands() {
        assert!(Cli::try_parse_from(["system-info-collector", "--copy", "collect"]).is_err());
        assert!(Cli::try_parse_from(["system-info-collector", "--compact", "config"]).is_err());
    }
}
