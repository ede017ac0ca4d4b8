// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dropgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dropgate",
    version,
    about = "Run a build plan as a gated DAG of drops and checkpoints.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Dropgate.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Dropgate.toml")]
    pub plan: String,

    /// Override `[build].max_parallel` from the plan.
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DROPGATE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the plan, but don't execute any units.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
