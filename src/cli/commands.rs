//! CLI command implementations
//!
//! `serve` resolves configuration, installs logging, then runs the HTTP
//! server on a multi-threaded tokio runtime. `check-config` resolves the
//! same configuration and prints it without starting anything.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig, ProxyConfig};
use crate::http_server::HttpServer;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::CheckConfig { config } => check_config(config.as_deref()),
    }
}

/// Resolve configuration, applying a command-line port last
pub fn resolve_config(path: Option<&Path>, port: Option<u16>) -> CliResult<ProxyConfig> {
    let mut config = ProxyConfig::load(path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    Ok(config)
}

/// Start the proxy and serve until the process is stopped
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let config = resolve_config(config_path, port)?;
    init_tracing(&config.logging)?;

    tracing::info!(
        address = %config.server.socket_addr(),
        backend_missing = ?config.backend.missing_fields(),
        auth = config.auth.is_enabled(),
        "starting formrelay"
    );

    let server = HttpServer::from_config(&config);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Print the resolved configuration, secrets masked
pub fn check_config(config_path: Option<&Path>) -> CliResult<()> {
    match resolve_config(config_path, None) {
        Ok(config) => write_response(config.status()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(logging: &LoggingConfig) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| {
            CliError::config_error(format!("Invalid log level '{}': {}", logging.level, e))
        })?;

    let installed = match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .try_init(),
    };

    installed.map_err(|e| CliError::boot_failed(format!("Failed to install logging: {}", e)))
}
