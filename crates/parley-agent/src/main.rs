//! # parley-agent
//!
//! Parley server binary: loads settings, sets up logging and metrics, and
//! serves the hub until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::logging::{LogFormat, init_subscriber};
use parley_server::metrics::install_recorder;
use parley_server::{ParleyServer, ServerConfig, TrustedHeaderResolver};
use parley_settings::{ParleySettings, load_settings_from_path, settings_path};
use tracing::{info, warn};

/// How long shutdown waits for the hub and listener.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Parley real-time messaging hub.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Parley real-time messaging hub")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or filter directive (overrides settings if specified).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings_file(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(settings_path)
    }

    /// Flags win over file and environment values.
    fn apply(&self, settings: &mut ParleySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings_file();
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    let format: LogFormat = settings
        .logging
        .format
        .parse()
        .map_err(anyhow::Error::msg)?;
    init_subscriber(&settings.logging.level, format);

    let metrics = match install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let config = ServerConfig::from_settings(&settings);
    let identity = TrustedHeaderResolver::new(&config.user_id_header, &config.username_header)
        .context("invalid identity header name")?;
    let server = ParleyServer::new(config, identity, metrics);

    let (addr, task) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;
    info!(%addr, settings = %path.display(), "parley server started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("received ctrl-c");

    if !server.stop(task, Some(SHUTDOWN_TIMEOUT)).await {
        warn!("shutdown did not complete cleanly");
    }
    Ok(())
}
