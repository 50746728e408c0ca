//! CLI module for formrelay
//!
//! Provides command-line interface for:
//! - serve: Resolve configuration and run the HTTP proxy
//! - check-config: Print the resolved configuration, secrets masked

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, init_tracing, resolve_config, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
