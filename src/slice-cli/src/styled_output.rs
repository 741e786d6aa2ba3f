//! Styled CLI output with theme-aware colors.
//!
//! Status lines adapt to the terminal's background and respect `NO_COLOR`.
//! `CLICOLOR_FORCE` turns colors on even when the stream is not a terminal.
//!
//! # Examples
//!
//! ```
//! use slice_cli::styled_output::{print_error, println_success};
//!
//! println_success("Updated v1.2.0 -> v1.3.0");
//! print_error("update failed: no published release found (HTTP 404)");
//! ```

use std::io::{IsTerminal, Write};

/// Set when the user asked for colors regardless of the output stream.
pub const FORCE_COLOR_ENV: &str = "CLICOLOR_FORCE";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Check if colors should be disabled based on NO_COLOR env var.
fn colors_disabled() -> bool {
    env_flag("NO_COLOR")
}

fn colors_forced() -> bool {
    env_flag(FORCE_COLOR_ENV)
}

fn is_terminal_output(stderr: bool) -> bool {
    if stderr {
        std::io::stderr().is_terminal()
    } else {
        std::io::stdout().is_terminal()
    }
}

/// Whether a line written to stderr (or stdout) should carry ANSI colors.
pub fn use_colors(stderr: bool) -> bool {
    !colors_disabled() && (colors_forced() || is_terminal_output(stderr))
}

/// ANSI color codes for light terminal backgrounds.
mod light_theme {
    pub const SUCCESS: &str = "\x1b[38;2;0;150;125m";
    pub const ERROR: &str = "\x1b[38;2;217;61;61m";
    pub const WARNING: &str = "\x1b[38;2;201;154;46m";
    pub const INFO: &str = "\x1b[38;2;0;100;160m";
    pub const DIM: &str = "\x1b[38;2;100;100;100m";
}

/// ANSI color codes for dark terminal backgrounds.
mod dark_theme {
    pub const SUCCESS: &str = "\x1b[38;2;0;245;212m";
    pub const ERROR: &str = "\x1b[38;2;255;107;107m";
    pub const WARNING: &str = "\x1b[38;2;255;200;87m";
    pub const INFO: &str = "\x1b[38;2;72;202;228m";
    pub const DIM: &str = "\x1b[38;2;130;154;177m";
}

const RESET: &str = "\x1b[0m";

/// Detect a light terminal background from `COLORFGBG` ("fg;bg").
///
/// Falls back to the dark theme when nothing says otherwise.
fn is_light_theme() -> bool {
    let background = std::env::var("COLORFGBG")
        .ok()
        .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()));
    if let Some(bg) = background {
        return bg >= 7;
    }

    std::env::var("ITERM_PROFILE")
        .map(|profile| profile.to_lowercase().contains("light"))
        .unwrap_or(false)
}

/// Message type for styled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Success,
    Error,
    Warning,
    Info,
    /// Secondary information
    Dim,
}

impl MessageType {
    fn icon(&self) -> &'static str {
        match self {
            MessageType::Success => "[OK]",
            MessageType::Error => "[ERROR]",
            MessageType::Warning => "[WARN]",
            MessageType::Info => "[INFO]",
            MessageType::Dim => "-",
        }
    }

    fn color(&self) -> &'static str {
        let light = is_light_theme();
        match (self, light) {
            (MessageType::Success, true) => light_theme::SUCCESS,
            (MessageType::Error, true) => light_theme::ERROR,
            (MessageType::Warning, true) => light_theme::WARNING,
            (MessageType::Info, true) => light_theme::INFO,
            (MessageType::Dim, true) => light_theme::DIM,
            (MessageType::Success, false) => dark_theme::SUCCESS,
            (MessageType::Error, false) => dark_theme::ERROR,
            (MessageType::Warning, false) => dark_theme::WARNING,
            (MessageType::Info, false) => dark_theme::INFO,
            (MessageType::Dim, false) => dark_theme::DIM,
        }
    }
}

/// Format a status line, colored or plain.
pub fn format_styled(msg_type: MessageType, message: &str, colored: bool) -> String {
    if colored {
        format!("{}{} {}{}", msg_type.color(), msg_type.icon(), message, RESET)
    } else {
        format!("{} {}", msg_type.icon(), message)
    }
}

fn print_styled(msg_type: MessageType, message: &str, to_stderr: bool) {
    let line = format_styled(msg_type, message, use_colors(to_stderr));
    // A closed pipe must not turn into a panic.
    if to_stderr {
        let _ = writeln!(std::io::stderr(), "{}", line);
    } else {
        let _ = writeln!(std::io::stdout(), "{}", line);
    }
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    print_styled(MessageType::Error, message, true);
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    print_styled(MessageType::Warning, message, true);
}

/// Print a dimmed note to stderr.
pub fn print_dim(message: &str) {
    print_styled(MessageType::Dim, message, true);
}

/// Print a success message to stdout.
pub fn println_success(message: &str) {
    print_styled(MessageType::Success, message, false);
}

/// Print an info message to stdout.
pub fn println_info(message: &str) {
    print_styled(MessageType::Info, message, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_message_type_icons() {
        assert_eq!(MessageType::Success.icon(), "[OK]");
        assert_eq!(MessageType::Error.icon(), "[ERROR]");
        assert_eq!(MessageType::Warning.icon(), "[WARN]");
        assert_eq!(MessageType::Info.icon(), "[INFO]");
        assert_eq!(MessageType::Dim.icon(), "-");
    }

    #[test]
    fn test_format_styled_plain() {
        assert_eq!(
            format_styled(MessageType::Success, "Updated v1 -> v2", false),
            "[OK] Updated v1 -> v2"
        );
    }

    #[test]
    fn test_format_styled_colored() {
        let line = format_styled(MessageType::Error, "update failed", true);
        assert!(line.starts_with("\x1b[38;2;"));
        assert!(line.contains("[ERROR] update failed"));
        assert!(line.ends_with(RESET));
    }

    #[test]
    #[serial]
    fn test_no_color_wins_over_force() {
        // SAFETY: These tests run serially and we restore env vars immediately
        unsafe { std::env::set_var("NO_COLOR", "1") };
        unsafe { std::env::set_var(FORCE_COLOR_ENV, "1") };
        assert!(!use_colors(true));
        unsafe { std::env::remove_var("NO_COLOR") };

        assert!(use_colors(true));
        unsafe { std::env::remove_var(FORCE_COLOR_ENV) };
    }

    #[test]
    #[serial]
    fn test_env_flag_values() {
        // SAFETY: These tests run serially and we restore env vars immediately
        for (value, expected) in [("1", true), ("true", true), ("0", false), ("false", false), ("", false)] {
            unsafe { std::env::set_var("NO_COLOR", value) };
            assert_eq!(colors_disabled(), expected, "NO_COLOR={value:?}");
        }
        unsafe { std::env::remove_var("NO_COLOR") };
    }

    #[test]
    #[serial]
    fn test_light_theme_detection() {
        // SAFETY: These tests run serially and we restore env vars immediately
        unsafe { std::env::set_var("COLORFGBG", "0;15") };
        assert!(is_light_theme());
        unsafe { std::env::set_var("COLORFGBG", "15;0") };
        assert!(!is_light_theme());
        unsafe { std::env::remove_var("COLORFGBG") };
    }
}
