//! Process-wide device registry and reconnect orchestration.
//!
//! The supervisor keys everything on the device serial (normalised to
//! lowercase). Registering a serial starts a reconnect task that keeps a
//! session alive with a fixed retry cadence; host actions resolve through
//! the explicit [`actions`] registry; every session notification is
//! marshalled into a [`ChangeFrame`] and handed to the sink.
//!
//! A serial may be registered without a live session (still connecting);
//! a live session without a registration never occurs.

pub mod actions;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AvrError, AvrResult};
use crate::events::{ChangeFrame, ChangeSink, DeviceEvent};
use crate::protocol::{CellValue, CommandDef, Zone};
use crate::session::{AvrSession, SessionConfig, SessionObserver};

/// Wall-clock format of the `lastMessageDate` frames.
const LAST_MESSAGE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Timing knobs of the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// Pause between reconnect attempts for one device.
    pub reconnect_period: Duration,
    /// Control port of the receivers.
    pub port: u16,
    /// Per-session timing.
    pub session: SessionConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_period: Duration::from_secs(60),
            port: 23,
            session: SessionConfig::default(),
        }
    }
}

/// Identity of a device to supervise.
#[derive(Debug, Clone)]
pub struct RegisterInfo {
    pub name: String,
    pub serial: String,
    pub host: String,
}

struct DeviceTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    config: SupervisorConfig,
    sink: Arc<dyn ChangeSink>,
    tasks: Mutex<HashMap<String, DeviceTask>>,
    sessions: DashMap<String, Arc<AvrSession>>,
    shutdown: AtomicBool,
}

/// Registry of supervised devices.
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sink,
                tasks: Mutex::new(HashMap::new()),
                sessions: DashMap::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Starts supervising a device. Registering an already-known serial
    /// is a no-op.
    pub fn register(&self, info: RegisterInfo) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let serial = info.serial.to_lowercase();
        let mut tasks = self.inner.tasks.lock();
        if tasks.contains_key(&serial) {
            log::debug!("[Supervisor] '{}' ({serial}) already registered", info.name);
            return;
        }
        log::info!(
            "[Supervisor] registering '{}' ({serial}) - '{}'",
            info.name,
            info.host
        );
        self.inner
            .sink
            .push(event_frame(&info.name, &serial, "register"));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reconnect_loop(
            Arc::clone(&self.inner),
            cancel.clone(),
            info.name,
            serial.clone(),
            info.host,
        ));
        tasks.insert(serial, DeviceTask { cancel, handle });
    }

    /// Stops supervising a serial: cancels the reconnect task, closes any
    /// live session and forgets both.
    pub fn unregister(&self, serial: &str) {
        let serial = serial.to_lowercase();
        let Some(task) = self.inner.tasks.lock().remove(&serial) else {
            return;
        };
        task.cancel.cancel();

        let name = match self.inner.sessions.remove(&serial) {
            Some((_, session)) => {
                let name = session.name().to_string();
                log::debug!("[Supervisor] '{name}' ({serial}) is gone");
                session.close();
                name
            }
            None => "Unknown".to_string(),
        };
        log::info!("[Supervisor] unregistering '{name}' ({serial})");
        self.inner.sink.push(event_frame(&name, &serial, "unregister"));
    }

    pub fn unregister_all(&self) {
        let serials: Vec<String> = self.inner.tasks.lock().keys().cloned().collect();
        for serial in serials {
            self.unregister(&serial);
        }
    }

    /// Runs one host action against the device's live session. Unknown
    /// actions and missing sessions are logged and ignored; invalid
    /// arguments surface as typed errors.
    pub fn do_action(
        &self,
        serial: &str,
        action: &str,
        zone: Zone,
        value: Option<&Json>,
    ) -> AvrResult<()> {
        let serial = serial.to_lowercase();
        let Some(session) = self.inner.sessions.get(&serial).map(|s| Arc::clone(&s)) else {
            log::info!("[Supervisor] no live session for {serial}, dropping '{action}'");
            return Ok(());
        };
        let Some(def) = actions::find(action) else {
            log::info!("[Supervisor] action '{action}' does not exist");
            return Ok(());
        };
        match def.arity {
            actions::Arity::ZoneValue => {
                log::info!("[Supervisor] {action}({}, {value:?}) on {serial}", zone.host())
            }
            actions::Arity::Zone => log::info!("[Supervisor] {action}({}) on {serial}", zone.host()),
            actions::Arity::Value => log::info!("[Supervisor] {action}({value:?}) on {serial}"),
            actions::Arity::None => log::info!("[Supervisor] {action}() on {serial}"),
        }
        actions::dispatch(&session, def, zone, value)
    }

    /// The live session of a serial, if currently connected.
    pub fn session(&self, serial: &str) -> Option<Arc<AvrSession>> {
        self.inner
            .sessions
            .get(&serial.to_lowercase())
            .map(|s| Arc::clone(&s))
    }

    pub fn is_registered(&self, serial: &str) -> bool {
        self.inner.tasks.lock().contains_key(&serial.to_lowercase())
    }

    /// Closes every session and waits for the reconnect tasks to stop.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let tasks: Vec<DeviceTask> = {
            let mut map = self.inner.tasks.lock();
            map.drain().map(|(_, t)| t).collect()
        };
        for task in &tasks {
            task.cancel.cancel();
        }
        let sessions: Vec<Arc<AvrSession>> = self
            .inner
            .sessions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        self.inner.sessions.clear();
        for session in sessions {
            session.close();
        }
        join_all(tasks.into_iter().map(|t| t.handle)).await;
        log::info!("[Supervisor] shutdown complete");
    }
}

/// Keeps one device connected: drops dead sessions, retries connects on
/// a fixed cadence, installs fresh sessions with the marshaling observer.
async fn reconnect_loop(
    inner: Arc<Inner>,
    cancel: CancellationToken,
    name: String,
    serial: String,
    host: String,
) {
    let period = inner.config.reconnect_period;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        match inner.sessions.get(&serial).map(|s| s.alive()) {
            Some(true) => {
                log::debug!("[Supervisor] '{name}' ({serial}) - '{host}' is alive");
            }
            Some(false) => {
                log::info!("[Supervisor] '{name}' ({serial}) is not alive, destroying it");
                inner.sessions.remove(&serial);
            }
            None => {}
        }
        if inner.sessions.get(&serial).is_none() {
            log::debug!("[Supervisor] trying to connect '{name}' ({serial}) - '{host}'");
            let observer: Arc<dyn SessionObserver> =
                Arc::new(MarshalingObserver { sink: Arc::clone(&inner.sink) });
            let attempt = AvrSession::connect(
                &name,
                &serial,
                &host,
                inner.config.port,
                inner.config.session,
                observer,
            )
            .await;
            match attempt {
                Ok(session) => {
                    inner.sessions.insert(serial.clone(), session);
                    log::info!("[Supervisor] '{name}' ({serial}) added to device list");
                }
                Err(AvrError::ConnectTimeout(_)) => {
                    log::debug!(
                        "[Supervisor] connect to '{host}' timed out, retry in {}s",
                        period.as_secs()
                    );
                }
                Err(e) => {
                    log::info!(
                        "[Supervisor] could not connect '{name}' ({serial}): {e}, retry in {}s",
                        period.as_secs()
                    );
                }
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(period) => {}
        }
    }
}

/// Converts session notifications into host frames.
struct MarshalingObserver {
    sink: Arc<dyn ChangeSink>,
}

impl SessionObserver for MarshalingObserver {
    fn on_change(&self, name: &str, serial: &str, def: &'static CommandDef, value: &CellValue) {
        log::debug!(
            "[Supervisor] {name}: '{}' ({}) changed to {:?}",
            def.label,
            def.code,
            value
        );
        self.sink.push(change_frame(name, serial, def, value));
        self.sink.push(last_message_frame(name, serial));
    }

    fn on_event(&self, name: &str, serial: &str, event: DeviceEvent) {
        log::debug!("[Supervisor] {name}: event '{}'", event.as_str());
        self.sink.push(event_frame(name, serial, event.as_str()));
        self.sink.push(last_message_frame(name, serial));
    }
}

fn change_frame(name: &str, serial: &str, def: &CommandDef, value: &CellValue) -> ChangeFrame {
    let mut payload = json!({
        "avrName": name,
        "avrSerial": serial,
        "cmdCode": def.code,
        "cmdLabel": def.label,
        "value": value.to_host(),
    });
    if def.zone != Zone::Undefined {
        payload["zone"] = json!(def.zone.host());
    }
    ChangeFrame::new(serial, def.zone, def.code, payload)
}

fn event_frame(name: &str, serial: &str, literal: &str) -> ChangeFrame {
    let payload = json!({
        "avrName": name,
        "avrSerial": serial,
        "value": literal,
    });
    ChangeFrame::new(serial, Zone::Undefined, "event", payload)
}

fn last_message_frame(name: &str, serial: &str) -> ChangeFrame {
    let payload = json!({
        "avrName": name,
        "avrSerial": serial,
        "value": chrono::Local::now().format(LAST_MESSAGE_FORMAT).to_string(),
    });
    ChangeFrame::new(serial, Zone::Undefined, "lastMessageDate", payload)
}

/// Maps the host's zone spelling ({`main`|1, `2`, `3`}) onto [`Zone`].
pub fn zone_from_host(value: Option<&Json>) -> Zone {
    let Some(value) = value else {
        return Zone::Undefined;
    };
    if *value == "main" || *value == 1 {
        Zone::Main
    } else if *value == "2" || *value == 2 {
        Zone::Zone2
    } else if *value == "3" || *value == 3 {
        Zone::Zone3
    } else {
        Zone::Undefined
    }
}
