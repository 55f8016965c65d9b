//! Firewatch sensor hub binary.
//!
//! Wires together configuration, logging, the broadcast hub and the HTTP
//! server, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `firewatch-config.yaml` (or the path in
//!    `FIREWATCH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Start the hub and its broadcast dispatcher
//! 4. Load page templates
//! 5. Serve HTTP and `WebSocket` traffic
//! 6. On `Ctrl-C`, shut the hub down and wait for the dispatcher

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use firewatch_core::{FireConfig, FireHub, LoggingConfig};
use firewatch_server::{AppState, Templates};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "firewatch-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, templates or the server fail.
#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("firewatch-daemon starting");
    info!(
        path = %config_path.display(),
        host = %config.server.host,
        port = config.server.port,
        history_capacity = config.hub.history_capacity,
        send_timeout_ms = config.hub.send_timeout_ms,
        handoff_capacity = config.hub.handoff_capacity,
        subscriber_buffer = config.hub.subscriber_buffer,
        "Configuration loaded"
    );

    // 3. Start the hub.
    let (hub, dispatcher) = FireHub::start(config.hub.clone());

    // 4. Load templates.
    let templates = match &config.server.template_dir {
        Some(dir) => Templates::with_overrides(Path::new(dir))?,
        None => Templates::embedded()?,
    };
    let mut state = AppState::new(hub.clone(), templates);
    if let Some(dir) = &config.server.static_dir {
        info!(dir = %dir, "Serving static files");
        state = state.with_static_dir(dir);
    }

    // 5. Serve until Ctrl-C.
    let signal_hub = hub.clone();
    let served = firewatch_server::start_server(&config.server, Arc::new(state), async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_hub.shutdown().await;
    })
    .await;

    // 6. Tear down. Shutdown is idempotent, so this also covers a server
    // that failed before the signal arrived.
    hub.shutdown().await;
    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Dispatcher task ended abnormally");
    }

    served?;
    info!("firewatch-daemon stopped");
    Ok(())
}

/// Load configuration from `FIREWATCH_CONFIG` or the default path.
///
/// A missing file means defaults, with the listener environment
/// overrides still applied.
fn load_config() -> Result<(FireConfig, PathBuf), DaemonError> {
    let path = std::env::var("FIREWATCH_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = FireConfig::from_file(&path)?;
        Ok((config, path))
    } else {
        let mut config = FireConfig::default();
        config.server.apply_env_overrides()?;
        Ok((config, path))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve on `Ctrl-C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
}
