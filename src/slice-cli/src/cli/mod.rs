//! CLI argument parsing and command dispatch.
//!
//! - `args` - command-line argument structures
//! - `styles` - ANSI styling for help output
//! - `handlers` - command execution handlers

pub mod args;
pub mod handlers;
pub mod styles;

pub use args::{Cli, ColorMode, Commands, LogLevel, get_long_version};
pub use handlers::{dispatch_command, failure_message};
pub use styles::{AFTER_HELP, get_styles};
