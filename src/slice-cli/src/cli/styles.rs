//! CLI styling and formatting.

use clap::builder::styling::{AnsiColor, Effects, Styles};

/// slice help theme.
pub fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Yellow.on_default())
}

/// After-help section with environment variables and paths.
pub const AFTER_HELP: &str = color_print::cstr!(
    r#"<cyan,bold>EXAMPLES</>
    <green,bold>slice update</>                   Install the latest release
    <green,bold>slice update --check</>           Only report whether an update exists
    <green,bold>slice update --manifest</> <dim>URL</>     Resolve releases from a JSON manifest

<cyan,bold>ENVIRONMENT VARIABLES</>
    <yellow>SLICE_LOG_LEVEL</>      Log verbosity (error, warn, info, debug, trace)
    <yellow>RUST_LOG</>             Full tracing filter, overrides the log level
    <yellow>NO_COLOR</>             Disable colored output (set to '1' or 'true')

<cyan,bold>PATHS</>
    <dim>Update config</>   ~/.slice/update.json

<cyan,bold>LEARN MORE</>
    <blue,underline>https://github.com/archangelgroupco/slice</>"#
);
