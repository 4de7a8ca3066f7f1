//! Command trait definition for CLI commands.
//!
//! This module defines the [`Command`] trait that every fgslice subcommand implements.
//! The trait uses `enum_dispatch` so `main` can dispatch on the parsed subcommand enum.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all fgslice CLI commands.
///
/// The `command_line` parameter contains the full command invocation for @PG records.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
