//! Batched change delivery to the host.
//!
//! Frames from the supervisor accumulate in a channel; every cycle the
//! poster flattens them into one `{apikey, changes}` POST. Later frames
//! for the same key overwrite earlier ones within a batch, so the host
//! always sees the freshest value.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Map, Value as Json};
use tokio::sync::mpsc;

use avrlink_core::ChangeFrame;

/// Delivers change batches and daemon events to the host callback.
pub struct HostPoster {
    client: Client,
    callback: String,
    apikey: String,
    cycle: Duration,
    watchdog: Duration,
}

impl HostPoster {
    pub fn new(callback: String, apikey: String, cycle: Duration, watchdog: Duration) -> Self {
        Self {
            client: Client::new(),
            callback,
            apikey,
            cycle,
            watchdog,
        }
    }

    /// Posts one daemon-level event (`Listening`, `Ping`, `Shutdown`)
    /// immediately.
    pub async fn send_daemon_event(&self, event: &str) {
        let mut changes = Map::new();
        changes.insert("daemon".to_string(), json!({ "event": event }));
        self.post(changes).await;
    }

    /// Drains the frame channel on the configured cycle until the sender
    /// side closes.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<ChangeFrame>) {
        let watchdog_cycles = if self.watchdog.is_zero() {
            0
        } else {
            (self.watchdog.as_secs_f64() / self.cycle.as_secs_f64())
                .round()
                .max(1.0) as u64
        };
        let mut cycles: u64 = 0;
        loop {
            tokio::time::sleep(self.cycle).await;

            let mut frames = Vec::new();
            let disconnected = loop {
                match rx.try_recv() {
                    Ok(frame) => frames.push(frame),
                    Err(mpsc::error::TryRecvError::Empty) => break false,
                    Err(mpsc::error::TryRecvError::Disconnected) => break true,
                }
            };
            let mut batch = collapse(frames);

            // First cycle pings immediately, then every watchdog period.
            if watchdog_cycles > 0 && cycles % watchdog_cycles == 0 {
                batch.insert("daemon".to_string(), json!({ "event": "Ping" }));
            }
            cycles += 1;

            if !batch.is_empty() {
                self.post(batch).await;
            }
            if disconnected {
                return;
            }
        }
    }

    async fn post(&self, changes: Map<String, Json>) {
        let count = changes.len();
        let body = json!({ "apikey": self.apikey, "changes": changes });
        match self.client.post(&self.callback).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                log::warn!("[Poster] host answered {}", response.status());
            }
            Ok(_) => log::debug!("[Poster] delivered {count} change(s)"),
            Err(e) => log::warn!("[Poster] POST to {} failed: {e}", self.callback),
        }
    }
}

/// Flattens a cycle's frames onto their keys, freshest value last.
fn collapse(frames: Vec<ChangeFrame>) -> Map<String, Json> {
    let mut batch = Map::new();
    for frame in frames {
        batch.insert(frame.key, frame.payload);
    }
    batch
}
