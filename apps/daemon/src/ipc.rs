//! Local command socket.
//!
//! The host delivers one JSON command per connection on a loopback TCP
//! socket. Commands carry the shared `apikey`; anything else is rejected
//! before being inspected further.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value as Json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use avrlink_core::{zone_from_host, RegisterInfo, Supervisor};

/// A command as the host sends it.
#[derive(Debug, Deserialize)]
pub struct HostCommand {
    pub apikey: String,
    pub action: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, rename = "deviceAction")]
    pub device_action: Option<String>,
    #[serde(default)]
    pub zone: Option<Json>,
    #[serde(default)]
    pub value: Option<Json>,
}

/// Accepts connections and feeds commands to the supervisor until the
/// listener task is aborted.
pub async fn serve(
    listener: TcpListener,
    apikey: String,
    supervisor: Arc<Supervisor>,
) -> Result<()> {
    loop {
        let (mut socket, peer) = listener.accept().await?;
        log::debug!("[Ipc] connection from {peer}");
        let mut raw = Vec::new();
        if let Err(e) = socket.read_to_end(&mut raw).await {
            log::warn!("[Ipc] read from {peer} failed: {e}");
            continue;
        }
        let command: HostCommand = match serde_json::from_slice(&raw) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[Ipc] unparseable command from {peer}: {e}");
                continue;
            }
        };
        if command.apikey != apikey {
            log::error!("[Ipc] invalid apikey from {peer}");
            continue;
        }
        handle(&supervisor, command);
    }
}

/// Runs one validated command. Incomplete or unknown commands are logged
/// and dropped; the daemon never dies on host input.
pub fn handle(supervisor: &Supervisor, command: HostCommand) {
    match command.action.as_str() {
        "register" => {
            let (Some(name), Some(serial)) = (command.name, command.serial) else {
                log::warn!("[Ipc] register without name/serial");
                return;
            };
            let Some(host) = command.ip.or(command.host) else {
                log::warn!("[Ipc] register without ip/host");
                return;
            };
            supervisor.register(RegisterInfo { name, serial, host });
        }
        "unregister" => match command.serial {
            Some(serial) => supervisor.unregister(&serial),
            None => log::warn!("[Ipc] unregister without serial"),
        },
        "unregisterAll" => supervisor.unregister_all(),
        "doDevice" => {
            let (Some(serial), Some(action)) = (command.serial, command.device_action) else {
                log::warn!("[Ipc] doDevice without serial/deviceAction");
                return;
            };
            let zone = zone_from_host(command.zone.as_ref());
            if let Err(e) =
                supervisor.do_action(&serial, &action, zone, command.value.as_ref())
            {
                log::warn!("[Ipc] '{action}' on {serial} rejected: {e}");
            }
        }
        other => log::info!("[Ipc] unknown action {other:?} ignored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_deserialize() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"apikey":"k","action":"doDevice","serial":"ABC123",
                "deviceAction":"SetVolume","zone":"main","value":42.5}"#,
        )
        .unwrap();
        assert_eq!(cmd.action, "doDevice");
        assert_eq!(cmd.device_action.as_deref(), Some("SetVolume"));
        assert_eq!(zone_from_host(cmd.zone.as_ref()), avrlink_core::Zone::Main);
        assert_eq!(cmd.value, Some(serde_json::json!(42.5)));
    }

    #[test]
    fn register_accepts_ip_or_host() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"apikey":"k","action":"register","name":"den","serial":"s","ip":"10.0.0.9"}"#,
        )
        .unwrap();
        assert_eq!(cmd.ip.as_deref(), Some("10.0.0.9"));

        let cmd: HostCommand = serde_json::from_str(
            r#"{"apikey":"k","action":"register","name":"den","serial":"s","host":"avr.lan"}"#,
        )
        .unwrap();
        assert_eq!(cmd.host.as_deref(), Some("avr.lan"));
    }
}
