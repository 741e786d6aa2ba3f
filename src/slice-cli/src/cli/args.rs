//! CLI argument structures and parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::styles::{AFTER_HELP, get_styles};
use crate::update_cmd::UpdateCli;

/// Build-time version string with release tag, commit hash and build date.
pub fn get_long_version() -> &'static str {
    const GIT_HASH: &str = match option_env!("SLICE_GIT_HASH") {
        Some(v) => v,
        None => "unknown",
    };
    const BUILD_DATE: &str = match option_env!("SLICE_BUILD_DATE") {
        Some(v) => v,
        None => "unknown",
    };

    static LONG_VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} ({} {})",
            slice_update::CURRENT_VERSION,
            GIT_HASH,
            BUILD_DATE
        )
    })
}

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Color output mode for CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if output is a terminal
    #[default]
    Auto,
    /// Always output with colors
    Always,
    /// Never output with colors
    Never,
}

/// slice command line.
#[derive(Parser, Debug)]
#[command(name = "slice")]
#[command(version = slice_update::CURRENT_VERSION, long_version = get_long_version())]
#[command(about = "slice - command line tool", long_about = None)]
#[command(styles = get_styles(), after_help = AFTER_HELP)]
pub struct Cli {
    /// Enable verbose output (same as --log-level debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Enable trace-level logging for debugging
    #[arg(long = "trace", global = true)]
    pub trace: bool,

    /// Log verbosity level
    #[arg(
        long = "log-level",
        global = true,
        value_enum,
        default_value_t = LogLevel::Warn,
        value_name = "LEVEL"
    )]
    pub log_level: LogLevel,

    /// Control color output: auto (default), always, or never
    #[arg(long = "color", global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Also write trace-level logs to this file
    #[arg(long = "log-file", global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Pick the console log level.
    ///
    /// `--trace` beats `--verbose`, which beats a valid `SLICE_LOG_LEVEL`,
    /// which beats `--log-level`.
    pub fn effective_log_level(&self, env_level: Option<&str>) -> LogLevel {
        if self.trace {
            LogLevel::Trace
        } else if self.verbose {
            LogLevel::Debug
        } else {
            env_level
                .and_then(LogLevel::from_str_loose)
                .unwrap_or(self.log_level)
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace this executable with the latest published release
    #[command(visible_alias = "upgrade")]
    Update(UpdateCli),
}
