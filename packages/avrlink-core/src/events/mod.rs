//! Change/event frames delivered to the host integration.
//!
//! Every state change and lifecycle event collapses to a [`ChangeFrame`]:
//! a routing key plus a JSON payload. The transport that carries frames to
//! the host (batched HTTP, logging, a test double) implements
//! [`ChangeSink`].

pub(crate) mod sink;

pub use sink::{ChangeSink, ChannelChangeSink, LoggingChangeSink, NoopChangeSink};

use serde::Serialize;
use serde_json::Value as Json;

use crate::protocol::Zone;

/// Session lifecycle events forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceEvent {
    Init,
    Ping,
    TimeOut,
    Close,
}

impl DeviceEvent {
    /// Literal used in the host payload.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceEvent::Init => "Init",
            DeviceEvent::Ping => "Ping",
            DeviceEvent::TimeOut => "TimeOut",
            DeviceEvent::Close => "Close",
        }
    }
}

/// One key/value change handed to the host.
///
/// Keys follow the grammar `devices::<serial>::<zone>::<suffix>` where
/// the suffix is a mnemonic code, `event`, or `lastMessageDate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeFrame {
    pub key: String,
    pub payload: Json,
}

impl ChangeFrame {
    pub fn new(serial: &str, zone: Zone, suffix: &str, payload: Json) -> Self {
        Self {
            key: format!("devices::{}::{}::{}", serial, zone.host(), suffix),
            payload,
        }
    }
}
