//! conform CLI tool.
//!
//! Usage:
//! ```bash
//! conform check [OPTIONS] [PATH]
//! conform fix [OPTIONS] [--dry-run] [PATH]
//! conform list-rules
//! conform init
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use conform_core::Strategy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Checks files against executable rules and fixes what can be fixed
#[derive(Parser)]
#[command(name = "conform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rule checks
    Check {
        /// Path to check (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Apply automatic fixes, then report what remains
    Fix {
        /// Path to fix (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Compute fixes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// List available rules and presets
    ListRules,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by `check` and `fix`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Enable specific rules (comma-separated)
    #[arg(long)]
    pub rules: Option<String>,

    /// Disable specific rules (comma-separated)
    #[arg(long)]
    pub disable: Option<String>,

    /// Scheduling strategy: parallel or sequential
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Only check files matching these globs (can be specified multiple times)
    #[arg(short, long)]
    pub include: Vec<String>,

    /// Disable the result cache
    ///
    /// The cache lives for one command only, so within a run it serves
    /// files whose content is identical. Same as `CONFORM_CACHE=false`.
    #[arg(long)]
    pub no_cache: bool,
}

/// Output format for reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-violation compact format.
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { path, run } => commands::check::run(&path, &run, cli.config.as_deref()),
        Commands::Fix { path, run, dry_run } => {
            commands::fix::run(&path, &run, dry_run, cli.config.as_deref())
        }
        Commands::ListRules => commands::list_rules::run(),
        Commands::Init { force } => commands::init::run(force),
    }
}
