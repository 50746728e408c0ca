//! CLI argument definitions using clap
//!
//! Commands:
//! - formrelay serve [--config <path>] [--port <port>]
//! - formrelay check-config [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// formrelay - HTTP proxy from form front ends to a PostgREST backend
#[derive(Parser, Debug)]
#[command(name = "formrelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP proxy
    Serve {
        /// Path to configuration file (default: ./formrelay.json if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding configuration and environment
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the resolved configuration with secrets masked
    CheckConfig {
        /// Path to configuration file (default: ./formrelay.json if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
