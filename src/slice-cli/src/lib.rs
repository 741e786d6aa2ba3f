//! slice CLI library.
//!
//! - `cli/` - argument parsing and dispatch
//! - `styled_output` - colored status lines on stderr
//! - `update_cmd` - the `slice update` command

pub mod cli;
pub mod styled_output;
pub mod update_cmd;
