//! Avrlink Daemon - headless bridge between AVRs and a home-automation
//! host.
//!
//! The daemon owns the supervisor, listens for JSON commands on a local
//! socket, and posts batched change events to the host's HTTP callback.
//! It is designed to run as a background service next to the host.

mod config;
mod ipc;
mod notify;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use avrlink_core::{ChannelChangeSink, Supervisor};

use crate::config::DaemonConfig;
use crate::notify::HostPoster;

/// Avrlink Daemon - supervised Denon/Marantz AVR control.
#[derive(Parser, Debug)]
#[command(name = "avrlink-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "AVRLINK_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Command socket host (overrides config file).
    #[arg(long, env = "AVRLINK_SOCKET_HOST")]
    socket_host: Option<String>,

    /// Command socket port (overrides config file).
    #[arg(long, env = "AVRLINK_SOCKET_PORT")]
    socket_port: Option<u16>,

    /// Host callback URL (overrides config file).
    #[arg(long, env = "AVRLINK_CALLBACK")]
    callback: Option<String>,

    /// Shared API key (overrides config file).
    #[arg(long, env = "AVRLINK_APIKEY")]
    apikey: Option<String>,

    /// PID file to write on startup and remove on exit.
    #[arg(long, value_name = "FILE")]
    pid: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Avrlink Daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration and apply CLI overrides
    let mut config =
        DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.socket_host {
        config.socket_host = host;
    }
    if let Some(port) = args.socket_port {
        config.socket_port = port;
    }
    if let Some(callback) = args.callback {
        config.callback = callback;
    }
    if let Some(apikey) = args.apikey {
        config.apikey = apikey;
    }
    if config.apikey.is_empty() {
        anyhow::bail!("No API key configured; set --apikey or AVRLINK_APIKEY");
    }

    log::info!(
        "Configuration: socket={}:{}, callback={}, cycle={}s, cycle_connect={}s",
        config.socket_host,
        config.socket_port,
        config.callback,
        config.cycle,
        config.cycle_connect
    );

    if let Some(ref pid_path) = args.pid {
        std::fs::write(pid_path, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", pid_path.display()))?;
        log::info!("PID file: {}", pid_path.display());
    }

    // Wire the supervisor to the host poster
    let (sink, frame_rx) = ChannelChangeSink::new();
    let supervisor = Arc::new(Supervisor::new(
        config.to_supervisor_config(),
        Arc::new(sink),
    ));

    let poster = Arc::new(HostPoster::new(
        config.callback.clone(),
        config.apikey.clone(),
        config.cycle_duration(),
        std::time::Duration::from_secs(config.watchdog),
    ));
    poster.send_daemon_event("Listening").await;

    let poster_handle = {
        let poster = Arc::clone(&poster);
        tokio::spawn(async move { poster.run(frame_rx).await })
    };

    // Command socket
    let listener = TcpListener::bind((config.socket_host.as_str(), config.socket_port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind command socket {}:{}",
                config.socket_host, config.socket_port
            )
        })?;
    log::info!("Listening for host commands");
    let ipc_handle = {
        let supervisor = Arc::clone(&supervisor);
        let apikey = config.apikey.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc::serve(listener, apikey, supervisor).await {
                log::error!("Command socket failed: {e}");
            }
        })
    };

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    ipc_handle.abort();
    supervisor.shutdown().await;
    poster_handle.abort();
    poster.send_daemon_event("Shutdown").await;

    if let Some(ref pid_path) = args.pid {
        let _ = std::fs::remove_file(pid_path);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
