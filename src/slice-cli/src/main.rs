//! slice CLI - main entry point.
//!
//! Parses the command line, sets up logging, and runs the command on the
//! main thread. Any failure is printed once and turns into exit status 1.

use std::fs::File;
use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use slice_cli::cli::{Cli, ColorMode, dispatch_command, failure_message};
use slice_cli::styled_output::{FORCE_COLOR_ENV, print_error};

/// Trace filter for `--log-file`: everything from our crates, less from the HTTP stack.
const FILE_LOG_FILTER: &str = "info,slice=trace,slice_cli=trace,slice_update=trace";

/// Install the console subscriber and, with `--log-file`, a file writer.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let env_level = std::env::var("SLICE_LOG_LEVEL").ok();
    let level = cli.effective_log_level(env_level.as_deref());

    let console_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level.as_filter_str())
    };
    let console_ansi = match cli.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(console_ansi)
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new(FILE_LOG_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn main() {
    let cli = Cli::parse();

    // SAFETY: Environment variable mutations happen before any thread is spawned
    match cli.color {
        ColorMode::Never => unsafe { std::env::set_var("NO_COLOR", "1") },
        ColorMode::Always => unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::set_var(FORCE_COLOR_ENV, "1");
        },
        ColorMode::Auto => {}
    }

    let log_guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(err) => {
            print_error(&failure_message(&err));
            std::process::exit(1);
        }
    };

    if let Err(err) = dispatch_command(cli) {
        tracing::debug!("command failed: {:?}", err);
        print_error(&failure_message(&err));
        // Dropping the guard flushes the log file; process::exit would skip it.
        drop(log_guard);
        std::process::exit(1);
    }
}
