// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_STATE_DIR;

/// Command-line arguments for `watchman-rebuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchman-rebuild",
    version,
    about = "Watch a configuration tree and rebuild the system once changes settle.",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration tree to watch. The rebuild runs with this as its
    /// working directory.
    #[arg(value_name = "CONFIG_PATH")]
    pub config_path: PathBuf,

    /// Rebuild command, run through `sh -c`.
    ///
    /// If omitted it is auto-detected from the platform (sudo is added when
    /// not running as root).
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHMAN_REBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Directory holding the instance and rebuild-lock marker files.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Print the resolved command, ignore patterns and marker paths, then exit.
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

/// Parse the process arguments.
///
/// Usage errors exit with status 1; `--help` and `--version` exit 0.
pub fn parse() -> CliArgs {
    match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(1);
        }
        Err(err) => err.exit(),
    }
}
