//! Host action registry.
//!
//! The host names commands by action string (`"SetVolume"`). Instead of
//! reflective lookup, every action is a table entry binding the name to a
//! typed handler; the arity metadata states which of {zone, value} the
//! handler consumes, which the supervisor uses for logging.

use serde_json::Value as Json;

use crate::error::{AvrError, AvrResult};
use crate::protocol::{
    AudioRestorer, BluetoothOutputMode, Channel, DrcMode, DynamicVolume, EcoMode, InputSource,
    PictureMode, StandbyTimer, SurroundMode, Zone,
};
use crate::session::AvrSession;

/// Which call parameters an action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    ZoneValue,
    Zone,
    Value,
    None,
}

type Handler = fn(&AvrSession, Zone, Option<&Json>) -> AvrResult<()>;

/// One dispatchable host action.
pub struct ActionDef {
    pub name: &'static str,
    pub arity: Arity,
    handler: Handler,
}

const fn action(name: &'static str, arity: Arity, handler: Handler) -> ActionDef {
    ActionDef { name, arity, handler }
}

/// The full action vocabulary.
pub static ACTIONS: &[ActionDef] = &[
    action("TurnAVROn", Arity::None, |s, _, _| s.turn_avr_on()),
    action("TurnAVROff", Arity::None, |s, _, _| s.turn_avr_off()),
    action("TurnOn", Arity::Zone, |s, z, _| s.turn_on(z)),
    action("TurnOff", Arity::Zone, |s, z, _| s.turn_off(z)),
    action("MuteVolume", Arity::ZoneValue, |s, z, v| s.mute_volume(z, need_bool(v)?)),
    action("SetVolume", Arity::ZoneValue, |s, z, v| s.set_volume(z, need_f64(v)?)),
    action("VolumeUp", Arity::Zone, |s, z, _| s.volume_up(z)),
    action("VolumeDown", Arity::Zone, |s, z, _| s.volume_down(z)),
    action("SetChannelBias", Arity::Value, |s, _, v| {
        let (chan, level) = need_channel_level(v)?;
        s.set_channel_bias(chan, level)
    }),
    action("ChannelBiasUp", Arity::Value, |s, _, v| s.channel_bias_up(need_channel(v)?)),
    action("ChannelBiasDown", Arity::Value, |s, _, v| s.channel_bias_down(need_channel(v)?)),
    action("ChannelsBiasReset", Arity::None, |s, _, _| s.channels_bias_reset()),
    action("SelectSource", Arity::ZoneValue, |s, z, v| {
        let src = InputSource::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("source", v))?;
        s.select_source(z, src)
    }),
    action("SelectSoundMode", Arity::Value, |s, _, v| {
        let mode = SurroundMode::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("sound mode", v))?;
        s.select_sound_mode(mode)
    }),
    action("SelectPictureMode", Arity::Value, |s, _, v| {
        let mode = PictureMode::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("picture mode", v))?;
        s.select_picture_mode(mode)
    }),
    action("SelectEcoMode", Arity::Value, |s, _, v| {
        let mode = EcoMode::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("eco mode", v))?;
        s.select_eco_mode(mode)
    }),
    action("SelectDRCMode", Arity::Value, |s, _, v| {
        let mode = DrcMode::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("drc mode", v))?;
        s.select_drc_mode(mode)
    }),
    action("SelectDynamicVolumeMode", Arity::Value, |s, _, v| {
        let mode = DynamicVolume::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("dynamic volume mode", v))?;
        s.select_dynamic_volume_mode(mode)
    }),
    action("AudioRestorer", Arity::Value, |s, _, v| {
        let mode = AudioRestorer::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("restorer mode", v))?;
        s.audio_restorer(mode)
    }),
    action("Standby", Arity::Value, |s, _, v| {
        let timer = StandbyTimer::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("standby timer", v))?;
        s.standby(timer)
    }),
    action("SoundBass", Arity::ZoneValue, |s, z, v| s.sound_bass(z, need_f64(v)?)),
    action("SoundTreble", Arity::ZoneValue, |s, z, v| s.sound_treble(z, need_f64(v)?)),
    action("SoundLFE", Arity::Value, |s, _, v| s.sound_lfe(need_i64(v)?)),
    action("SetDelay", Arity::Value, |s, _, v| s.set_delay(need_i64(v)?)),
    action("TunerPreset", Arity::Value, |s, _, v| s.tuner_preset(need_i64(v)?)),
    action("SpeakerPreset", Arity::Value, |s, _, v| s.speaker_preset(need_i64(v)?)),
    action("BluetoothTransmitterOn", Arity::None, |s, _, _| s.bluetooth_transmitter(true)),
    action("BluetoothTransmitterOff", Arity::None, |s, _, _| s.bluetooth_transmitter(false)),
    action("BluetoothOutputMode", Arity::Value, |s, _, v| {
        let mode = BluetoothOutputMode::from_wire(need_str(v)?)
            .ok_or_else(|| unknown("bluetooth output mode", v))?;
        s.bluetooth_output_mode(mode)
    }),
    action("HeadphoneEQ", Arity::Value, |s, _, v| s.headphone_eq(need_bool(v)?)),
    action("DynamicEQ", Arity::Value, |s, _, v| s.dynamic_eq(need_bool(v)?)),
    action("DynamicEQReferenceLevel", Arity::Value, |s, _, v| {
        s.dynamic_eq_reference_level(need_i64(v)?)
    }),
    action("SetLevelChannel", Arity::Value, |s, _, v| {
        let (chan, level) = need_channel_level(v)?;
        s.set_level_channel(chan, level)
    }),
    action("Lock", Arity::Value, |s, _, v| s.lock(need_bool(v)?)),
    action("Refresh", Arity::None, |s, _, _| s.refresh()),
];

/// Resolves an action by name. `None` means the vocabulary does not know
/// it; the caller logs and ignores.
pub fn find(name: &str) -> Option<&'static ActionDef> {
    ACTIONS.iter().find(|a| a.name == name)
}

/// Runs a resolved action against a session.
pub fn dispatch(
    session: &AvrSession,
    def: &ActionDef,
    zone: Zone,
    value: Option<&Json>,
) -> AvrResult<()> {
    (def.handler)(session, zone, value)
}

// ── Argument extraction ─────────────────────────────────────────────────

fn unknown(kind: &'static str, value: Option<&Json>) -> AvrError {
    AvrError::UnknownLiteral {
        kind,
        value: value.map(|v| v.to_string()).unwrap_or_default(),
    }
}

fn need_str(value: Option<&Json>) -> AvrResult<&str> {
    value
        .and_then(|v| v.as_str())
        .ok_or_else(|| AvrError::InvalidArgument("expected a string value".into()))
}

fn need_f64(value: Option<&Json>) -> AvrResult<f64> {
    match value {
        Some(Json::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AvrError::InvalidArgument("value is not finite".into())),
        Some(Json::String(s)) => s
            .parse()
            .map_err(|_| AvrError::InvalidArgument(format!("not a number: {s:?}"))),
        other => Err(AvrError::InvalidArgument(format!("expected a number, got {other:?}"))),
    }
}

fn need_i64(value: Option<&Json>) -> AvrResult<i64> {
    Ok(need_f64(value)?.round() as i64)
}

fn need_bool(value: Option<&Json>) -> AvrResult<bool> {
    match value {
        Some(Json::Bool(b)) => Ok(*b),
        Some(Json::Number(n)) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        Some(Json::String(s)) => match s.to_ascii_uppercase().as_str() {
            "ON" | "TRUE" | "1" => Ok(true),
            "OFF" | "FALSE" | "0" => Ok(false),
            _ => Err(AvrError::InvalidArgument(format!("not a boolean: {s:?}"))),
        },
        other => Err(AvrError::InvalidArgument(format!("expected a boolean, got {other:?}"))),
    }
}

fn need_channel(value: Option<&Json>) -> AvrResult<Channel> {
    let code = need_str(value)?;
    Channel::from_wire(code).ok_or_else(|| AvrError::UnknownChannel(code.to_string()))
}

fn need_channel_level(value: Option<&Json>) -> AvrResult<(Channel, f64)> {
    let obj = value
        .and_then(|v| v.as_object())
        .ok_or_else(|| AvrError::InvalidArgument("expected {chan, level}".into()))?;
    let chan = need_channel(obj.get("chan"))?;
    let level = need_f64(obj.get("level"))?;
    Ok((chan, level))
}
