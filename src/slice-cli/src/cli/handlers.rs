//! Command dispatch and failure reporting.

use anyhow::Result;

use super::args::{Cli, Commands};

/// Route a parsed command line to its handler.
pub fn dispatch_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Update(update_cli) => update_cli.run(),
    }
}

/// One-line description of a failure, outermost context first.
///
/// Causes already spelled out by the message above them are skipped, since
/// the update errors embed their source in their own text.
pub fn failure_message(err: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}
