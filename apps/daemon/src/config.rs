//! Daemon configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use avrlink_core::{SessionConfig, SupervisorConfig};

/// Daemon configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the command socket binds to.
    /// Override: `AVRLINK_SOCKET_HOST`
    pub socket_host: String,

    /// Port of the command socket.
    /// Override: `AVRLINK_SOCKET_PORT`
    pub socket_port: u16,

    /// URL the change batches are POSTed to.
    /// Override: `AVRLINK_CALLBACK`
    pub callback: String,

    /// Shared key; commands with a different key are rejected.
    /// Override: `AVRLINK_APIKEY`
    pub apikey: String,

    /// Seconds between change-batch posts.
    pub cycle: f64,

    /// Seconds between reconnect attempts per device.
    pub cycle_connect: u64,

    /// Seconds between daemon keep-alive pings to the host (0 disables).
    pub watchdog: u64,

    /// Control port of the receivers.
    pub avr_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_host: "127.0.0.1".to_string(),
            socket_port: 55010,
            callback: "http://127.0.0.1:80".to_string(),
            apikey: String::new(),
            cycle: 1.0,
            cycle_connect: 60,
            watchdog: 300,
            avr_port: 23,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from a YAML file, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AVRLINK_SOCKET_HOST") {
            self.socket_host = val;
        }
        if let Ok(val) = std::env::var("AVRLINK_SOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.socket_port = port;
            }
        }
        if let Ok(val) = std::env::var("AVRLINK_CALLBACK") {
            self.callback = val;
        }
        if let Ok(val) = std::env::var("AVRLINK_APIKEY") {
            self.apikey = val;
        }
    }

    /// Converts to the core supervisor configuration.
    pub fn to_supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            reconnect_period: Duration::from_secs(self.cycle_connect.max(1)),
            port: self.avr_port,
            session: SessionConfig::default(),
        }
    }

    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs_f64(self.cycle.max(0.1))
    }
}
