//! One live control connection to a receiver.
//!
//! A session owns the framed transport, the cached [`DeviceState`], and
//! three concurrent activities:
//!
//! - the **reader** drains inbound lines into the parser and stamps the
//!   liveness clock;
//! - the **writer** drains the command queue one line at a time with a
//!   fixed 1 s gap between sends (the device drops commands under faster
//!   streams);
//! - the **prober** issues a `PW?` keep-alive every ping period and
//!   declares a timeout when the link stays silent past the limit.
//!
//! The command API is non-blocking: every call validates its arguments
//! synchronously and enqueues one or more outbound lines. There is no
//! half-open state; a timeout or EOF closes the session and the
//! supervisor reconnects.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AvrError, AvrResult};
use crate::events::DeviceEvent;
use crate::protocol::catalogue::{self, CommandDef};
use crate::protocol::{
    AudioRestorer, BluetoothOutputMode, CellValue, Channel, DeviceState, DrcMode, DynamicVolume,
    EcoMode, InputSource, PictureMode, StandbyTimer, SurroundMode, Zone,
};
use crate::transport::{self, LineReader, LineWriter};

/// Minimum gap between two outbound lines.
const SEND_SPACING: Duration = Duration::from_secs(1);

/// Channel bias and speaker levels move in this dB window.
const LEVEL_RANGE: f64 = 12.0;

/// Wire levels carry a fixed +50 offset.
const LEVEL_OFFSET: f64 = 50.0;

/// Timing knobs of a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Connect timeout and the inbound-silence limit after a probe.
    pub timeout: Duration,
    /// Interval between keep-alive probes.
    pub ping_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            ping_period: Duration::from_secs(30),
        }
    }
}

/// Callbacks a session raises towards its owner.
///
/// Both methods run on the session's reader/prober tasks and must not
/// block; the supervisor forwards them to the change sink.
pub trait SessionObserver: Send + Sync {
    /// A status cell was (re)parsed. Fired even when the value is
    /// unchanged, so refresh confirmations reach the host.
    fn on_change(&self, name: &str, serial: &str, def: &'static CommandDef, value: &CellValue);

    /// A lifecycle event occurred.
    fn on_event(&self, name: &str, serial: &str, event: DeviceEvent);
}

/// A live connection to one receiver.
pub struct AvrSession {
    name: String,
    serial: String,
    config: SessionConfig,
    state: Mutex<DeviceState>,
    queue: mpsc::UnboundedSender<String>,
    alive: AtomicBool,
    cancel: CancellationToken,
    last_inbound: Mutex<Instant>,
    timeout_count: AtomicU32,
    observer: Arc<dyn SessionObserver>,
}

impl AvrSession {
    /// Connects to `host:port` and starts a session over the socket.
    pub async fn connect(
        name: &str,
        serial: &str,
        host: &str,
        port: u16,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> AvrResult<Arc<Self>> {
        let (reader, writer) = transport::connect(host, port, config.timeout).await?;
        Ok(Self::start(name, serial, reader, writer, config, observer))
    }

    /// Starts a session over already-open transport halves, spawns the
    /// three activities, and issues the initial capability query plus a
    /// full refresh.
    pub fn start(
        name: &str,
        serial: &str,
        reader: LineReader,
        writer: LineWriter,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            name: name.to_string(),
            serial: serial.to_string(),
            config,
            state: Mutex::new(DeviceState::new()),
            queue: tx,
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            last_inbound: Mutex::new(Instant::now()),
            timeout_count: AtomicU32::new(0),
            observer,
        });

        tokio::spawn(read_loop(Arc::clone(&session), reader));
        tokio::spawn(write_loop(Arc::clone(&session), writer, rx));
        tokio::spawn(probe_loop(Arc::clone(&session)));

        // Capabilities first, then resynchronise every known property.
        let _ = session.enqueue_line("SSSOD ?".to_string());
        let _ = session.refresh();
        session
            .observer
            .on_event(&session.name, &session.serial, DeviceEvent::Init);
        session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Probe timeouts declared over the session's lifetime.
    pub fn timeout_count(&self) -> u32 {
        self.timeout_count.load(Ordering::SeqCst)
    }

    /// Last parsed value of a mnemonic, from the cache only.
    pub fn current(&self, code: &str) -> Option<CellValue> {
        self.state.lock().current(code).cloned()
    }

    /// Volume ceiling; tracks the last `MVMAX` received.
    pub fn max_volume(&self) -> f64 {
        self.state.lock().max_volume()
    }

    /// Sources the device reports as usable.
    pub fn sources(&self) -> Vec<InputSource> {
        self.state.lock().sources().to_vec()
    }

    /// Sources the device reports as disabled.
    pub fn sources_not_used(&self) -> Vec<InputSource> {
        self.state.lock().sources_not_used().to_vec()
    }

    // ── Command API ─────────────────────────────────────────────────────

    /// Re-enqueues every distinct query form in the catalogue once.
    pub fn refresh(&self) -> AvrResult<()> {
        for form in catalogue::query_forms() {
            self.enqueue_line(form.to_string())?;
        }
        Ok(())
    }

    pub fn turn_avr_on(&self) -> AvrResult<()> {
        self.enqueue("PW", "ON")
    }

    pub fn turn_avr_off(&self) -> AvrResult<()> {
        self.enqueue("PW", "STANDBY")
    }

    pub fn turn_on(&self, zone: Zone) -> AvrResult<()> {
        self.enqueue(zone_code(zone, "ZM", "Z2", "Z3")?, "ON")
    }

    pub fn turn_off(&self, zone: Zone) -> AvrResult<()> {
        self.enqueue(zone_code(zone, "ZM", "Z2", "Z3")?, "OFF")
    }

    pub fn mute_volume(&self, zone: Zone, mute: bool) -> AvrResult<()> {
        let code = zone_code(zone, "MU", "Z2MU", "Z3MU")?;
        self.enqueue(code, if mute { "ON" } else { "OFF" })
    }

    /// Sets the zone volume, clamped to the ceiling and quantised to the
    /// nearest half dB.
    pub fn set_volume(&self, zone: Zone, value: f64) -> AvrResult<()> {
        if !value.is_finite() {
            return Err(AvrError::InvalidArgument(format!("volume {value}")));
        }
        let code = zone_code(zone, "MV", "Z2", "Z3")?;
        let ceiling = self.max_volume();
        let value = quantize_half(value.clamp(0.0, ceiling));
        self.enqueue(code, &encode_level(value))
    }

    pub fn volume_up(&self, zone: Zone) -> AvrResult<()> {
        self.enqueue(zone_code(zone, "MV", "Z2", "Z3")?, "UP")
    }

    pub fn volume_down(&self, zone: Zone) -> AvrResult<()> {
        self.enqueue(zone_code(zone, "MV", "Z2", "Z3")?, "DOWN")
    }

    /// Sets one channel's bias. The write is skipped when the cached
    /// bias already equals the target.
    pub fn set_channel_bias(&self, chan: Channel, level: f64) -> AvrResult<()> {
        if !level.is_finite() {
            return Err(AvrError::InvalidArgument(format!("bias {level}")));
        }
        let target = quantize_half(level.clamp(-LEVEL_RANGE, LEVEL_RANGE));
        if self.state.lock().channel_bias(chan) == Some(target) {
            log::debug!("[Session] {} bias for {chan} already {target}", self.name);
            return Ok(());
        }
        self.enqueue("CV", &format!("{} {}", chan.wire(), encode_level(target + LEVEL_OFFSET)))
    }

    pub fn channel_bias_up(&self, chan: Channel) -> AvrResult<()> {
        if self.state.lock().channel_bias(chan) == Some(LEVEL_RANGE) {
            // At the ceiling the device stays silent; skip the write.
            return Ok(());
        }
        self.enqueue("CV", &format!("{} UP", chan.wire()))
    }

    pub fn channel_bias_down(&self, chan: Channel) -> AvrResult<()> {
        if self.state.lock().channel_bias(chan) == Some(-LEVEL_RANGE) {
            return Ok(());
        }
        self.enqueue("CV", &format!("{} DOWN", chan.wire()))
    }

    pub fn channels_bias_reset(&self) -> AvrResult<()> {
        self.enqueue("CV", "ZRL")
    }

    pub fn select_source(&self, zone: Zone, source: InputSource) -> AvrResult<()> {
        self.enqueue(zone_code(zone, "SI", "Z2", "Z3")?, source.wire())
    }

    pub fn select_sound_mode(&self, mode: SurroundMode) -> AvrResult<()> {
        self.enqueue("MS", mode.wire())
    }

    pub fn select_picture_mode(&self, mode: PictureMode) -> AvrResult<()> {
        self.enqueue("PV", mode.wire())
    }

    pub fn select_eco_mode(&self, mode: EcoMode) -> AvrResult<()> {
        self.enqueue("ECO", mode.wire())
    }

    pub fn select_drc_mode(&self, mode: DrcMode) -> AvrResult<()> {
        self.enqueue("PSDRC", &format!(" {}", mode.wire()))
    }

    pub fn select_dynamic_volume_mode(&self, mode: DynamicVolume) -> AvrResult<()> {
        self.enqueue("PSDYNVOL", &format!(" {}", mode.wire()))
    }

    pub fn audio_restorer(&self, mode: AudioRestorer) -> AvrResult<()> {
        self.enqueue("PSRSTR", &format!(" {}", mode.wire()))
    }

    pub fn standby(&self, timer: StandbyTimer) -> AvrResult<()> {
        self.enqueue("STBY", timer.wire())
    }

    /// Sets the sound delay in milliseconds, clamped to 0..=999.
    pub fn set_delay(&self, millis: i64) -> AvrResult<()> {
        let millis = millis.clamp(0, 999);
        self.enqueue("PSDEL", &format!(" {millis:03}"))
    }

    /// Sets the LFE attenuation. The stored value is negative dB in
    /// -10..=0; the wire carries its absolute value.
    pub fn sound_lfe(&self, level: i64) -> AvrResult<()> {
        let level = level.clamp(-10, 0);
        self.enqueue("PSLFE", &format!(" {:02}", -level))
    }

    pub fn sound_bass(&self, zone: Zone, level: f64) -> AvrResult<()> {
        let code = zone_code(zone, "PSBAS", "Z2PSBAS", "Z3PSBAS")?;
        self.enqueue(code, &format!(" {}", encode_tone(level)))
    }

    pub fn sound_treble(&self, zone: Zone, level: f64) -> AvrResult<()> {
        let code = zone_code(zone, "PSTRE", "Z2PSTRE", "Z3PSTRE")?;
        self.enqueue(code, &format!(" {}", encode_tone(level)))
    }

    /// Recalls a tuner preset, clamped to 1..=56.
    pub fn tuner_preset(&self, preset: i64) -> AvrResult<()> {
        let preset = preset.clamp(1, 56);
        self.enqueue("TPAN", &format!("{preset:02}"))
    }

    /// Selects the stored speaker configuration (1 or 2).
    pub fn speaker_preset(&self, preset: i64) -> AvrResult<()> {
        if preset != 1 && preset != 2 {
            return Err(AvrError::InvalidArgument(format!("speaker preset {preset}")));
        }
        self.enqueue("SPPR", &format!(" {preset}"))
    }

    pub fn bluetooth_transmitter(&self, on: bool) -> AvrResult<()> {
        self.enqueue("BTTX", if on { " ON" } else { " OFF" })
    }

    pub fn bluetooth_output_mode(&self, mode: BluetoothOutputMode) -> AvrResult<()> {
        self.enqueue("BTTX", &format!(" {}", mode.wire()))
    }

    pub fn headphone_eq(&self, on: bool) -> AvrResult<()> {
        self.enqueue("PSHEQ", if on { " ON" } else { " OFF" })
    }

    pub fn dynamic_eq(&self, on: bool) -> AvrResult<()> {
        self.enqueue("PSDYNEQ", if on { " ON" } else { " OFF" })
    }

    /// Sets the Dynamic EQ reference offset; only 0, 5, 10 and 15 dB
    /// exist on the device.
    pub fn dynamic_eq_reference_level(&self, level: i64) -> AvrResult<()> {
        if !matches!(level, 0 | 5 | 10 | 15) {
            return Err(AvrError::InvalidArgument(format!("reference level {level}")));
        }
        self.enqueue("PSREFLEV", &format!(" {level:02}"))
    }

    /// Sets one speaker's level in the -12..=+12 dB window.
    pub fn set_level_channel(&self, chan: Channel, level: f64) -> AvrResult<()> {
        if !level.is_finite() {
            return Err(AvrError::InvalidArgument(format!("level {level}")));
        }
        let target = quantize_half(level.clamp(-LEVEL_RANGE, LEVEL_RANGE));
        self.enqueue(
            "SSLEV",
            &format!(" {} {}", chan.wire(), encode_level(target + LEVEL_OFFSET)),
        )
    }

    pub fn lock(&self, on: bool) -> AvrResult<()> {
        self.enqueue("SSLOC", if on { "ON" } else { "OFF" })
    }

    /// Marks the session dead, cancels the three activities, closes the
    /// transport and emits `Close`. Safe to call more than once.
    pub fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        log::debug!("[Session] closed device '{}'", self.name);
        self.observer
            .on_event(&self.name, &self.serial, DeviceEvent::Close);
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn enqueue(&self, code: &str, payload: &str) -> AvrResult<()> {
        self.enqueue_line(format!("{code}{payload}"))
    }

    fn enqueue_line(&self, line: String) -> AvrResult<()> {
        if !self.alive() {
            return Err(AvrError::Closed);
        }
        self.queue.send(line).map_err(|_| AvrError::Closed)
    }

    fn stamp_inbound(&self) {
        *self.last_inbound.lock() = Instant::now();
    }

    fn inbound_silence(&self) -> Duration {
        self.last_inbound.lock().elapsed()
    }
}

fn zone_code(
    zone: Zone,
    main: &'static str,
    z2: &'static str,
    z3: &'static str,
) -> AvrResult<&'static str> {
    match zone {
        Zone::Main => Ok(main),
        Zone::Zone2 => Ok(z2),
        Zone::Zone3 => Ok(z3),
        Zone::Undefined => Err(AvrError::UnknownZone),
    }
}

/// Rounds to the nearest half unit.
fn quantize_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Encodes a non-negative level: two digits for whole units, three for
/// halves (42.5 → `425`).
fn encode_level(value: f64) -> String {
    if (value * 10.0).round() as i64 % 10 == 0 {
        format!("{:02}", value.round() as i64)
    } else {
        format!("{:03}", (value * 10.0).round() as i64)
    }
}

/// Maps a tone correction onto the wire window 38..=62 around the +50
/// offset, quantised to half dB.
fn encode_tone(level: f64) -> String {
    let wire = quantize_half(level).clamp(-LEVEL_RANGE, LEVEL_RANGE) + LEVEL_OFFSET;
    encode_level(wire)
}

// ── Activities ──────────────────────────────────────────────────────────

async fn read_loop(session: Arc<AvrSession>, mut reader: LineReader) {
    loop {
        let line = tokio::select! {
            _ = session.cancel.cancelled() => return,
            line = reader.read_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                log::debug!("[Session] {} received {line:?}", session.name);
                session.stamp_inbound();
                let updates = session.state.lock().handle_line(&line);
                for update in updates {
                    session.observer.on_change(
                        &session.name,
                        &session.serial,
                        update.def,
                        &update.value,
                    );
                }
            }
            Ok(None) => {
                log::info!("[Session] {} peer closed the connection", session.name);
                session.close();
                return;
            }
            Err(e) => {
                log::warn!("[Session] {} read failed: {e}", session.name);
                session.close();
                return;
            }
        }
    }
}

async fn write_loop(
    session: Arc<AvrSession>,
    mut writer: LineWriter,
    mut queue: mpsc::UnboundedReceiver<String>,
) {
    loop {
        let item = tokio::select! {
            _ = session.cancel.cancelled() => None,
            item = queue.recv() => item,
        };
        let Some(line) = item else {
            writer.close().await;
            return;
        };
        if let Err(e) = writer.write_line(&line).await {
            log::warn!("[Session] {} write failed: {e}", session.name);
            writer.close().await;
            session.close();
            return;
        }
        log::debug!("[Session] {} sent {line:?}", session.name);
        // The device misbehaves under faster streams.
        tokio::select! {
            _ = session.cancel.cancelled() => {
                writer.close().await;
                return;
            }
            _ = tokio::time::sleep(SEND_SPACING) => {}
        }
    }
}

async fn probe_loop(session: Arc<AvrSession>) {
    let timeout = session.config.timeout;
    let rest = session.config.ping_period.saturating_sub(timeout);
    loop {
        log::debug!("[Session] {} sending probe", session.name);
        if session.enqueue_line("PW?".to_string()).is_err() {
            return;
        }
        session
            .observer
            .on_event(&session.name, &session.serial, DeviceEvent::Ping);

        tokio::select! {
            _ = session.cancel.cancelled() => return,
            _ = tokio::time::sleep(timeout) => {}
        }

        let silence = session.inbound_silence();
        if silence > timeout {
            let count = session.timeout_count.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!(
                "[Session] {} silent for {:.2}s (timeout #{count})",
                session.name,
                silence.as_secs_f64()
            );
            session
                .observer
                .on_event(&session.name, &session.serial, DeviceEvent::TimeOut);
            session.close();
            return;
        }
        session.timeout_count.store(0, Ordering::SeqCst);

        tokio::select! {
            _ = session.cancel.cancelled() => return,
            _ = tokio::time::sleep(rest) => {}
        }
    }
}
