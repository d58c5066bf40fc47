//! Inbound line dispatch and the cached device state.
//!
//! [`DeviceState::handle_line`] resolves a line to the longest matching
//! mnemonic, runs its handler, and returns the resulting notifications.
//! Multi-line aggregates (`CV`, `SSLEV`, `SSSOD`, `SSFUN`, `SSINFFRM`)
//! collect into working buffers and commit to their cell at the `END`
//! sentinel, so subscribers never observe a partial mapping.
//!
//! Lines that match no mnemonic, and payloads that do not parse, are
//! logged at debug and dropped; the session keeps reading.

use std::collections::{BTreeMap, HashMap};

use super::catalogue::{self, CommandDef};
use super::types::{BluetoothDimension, Channel, InputSource, MicroCodeType, SurroundMode};
use super::value::CellValue;

/// Wire levels carry a fixed +50 offset (50 is 0 dB).
const LEVEL_OFFSET: f64 = 50.0;

/// Highest tuner preset; a full station list ends here.
const LAST_TUNER_PRESET: u8 = 56;

/// One successful cell update. Updates are emitted even when the stored
/// value did not change, so a refresh round-trips as confirmations.
#[derive(Debug, Clone)]
pub struct Update {
    pub def: &'static CommandDef,
    pub value: CellValue,
}

/// Cached observable state of one receiver.
pub struct DeviceState {
    status: HashMap<&'static str, Option<CellValue>>,
    max_volume: f64,
    sources: Vec<InputSource>,
    sources_not_used: Vec<InputSource>,
    cv_accum: BTreeMap<Channel, f64>,
    lev_accum: BTreeMap<Channel, f64>,
    fun_accum: BTreeMap<InputSource, String>,
    micro_accum: BTreeMap<MicroCodeType, String>,
    sod_use_accum: Vec<InputSource>,
    sod_del_accum: Vec<InputSource>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub fn new() -> Self {
        let mut status = HashMap::new();
        for def in catalogue::CATALOGUE {
            status.insert(def.code, None);
        }
        Self {
            status,
            max_volume: 98.0,
            sources: Vec::new(),
            sources_not_used: Vec::new(),
            cv_accum: BTreeMap::new(),
            lev_accum: BTreeMap::new(),
            fun_accum: BTreeMap::new(),
            micro_accum: BTreeMap::new(),
            sod_use_accum: Vec::new(),
            sod_del_accum: Vec::new(),
        }
    }

    /// Last parsed value of a mnemonic, if any.
    pub fn current(&self, code: &str) -> Option<&CellValue> {
        self.status.get(code).and_then(|c| c.as_ref())
    }

    /// Volume ceiling; tracks the last `MVMAX` received.
    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    /// Sources the device reports as usable.
    pub fn sources(&self) -> &[InputSource] {
        &self.sources
    }

    /// Sources the device reports as disabled.
    pub fn sources_not_used(&self) -> &[InputSource] {
        &self.sources_not_used
    }

    /// Cached bias of one channel, from the last complete `CV` block.
    pub fn channel_bias(&self, chan: Channel) -> Option<f64> {
        match self.current("CV") {
            Some(CellValue::ChannelMap(m)) => m.get(&chan).copied(),
            _ => None,
        }
    }

    /// Dispatches one inbound line. Returns the notifications to emit.
    pub fn handle_line(&mut self, line: &str) -> Vec<Update> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        let Some(def) = catalogue::match_line(line) else {
            log::debug!("[Parser] no parser for line {line:?}");
            return Vec::new();
        };
        let rest = line[def.code.len()..].trim_start_matches('?').trim();

        match def.code {
            "MU" | "Z2MU" | "Z3MU" | "PSHEQ" | "PSDYNEQ" | "SSLOC" => self.on_off(def, rest),
            "PSTONE" => self.tone_control(def, rest),
            "MV" => self.main_volume(def, rest),
            "Z2" | "Z3" => self.zone_overload(def, rest),
            "CV" => self.channel_bias_line(def, rest),
            "SSLEV" => self.speaker_level_line(def, rest),
            "PSCLV" => self.fixed_channel_level(def, rest, Channel::Centre),
            "PSSWL" => self.subwoofer_level(def, rest),
            "SSSOD" => self.source_availability(def, rest),
            "SSFUN" => self.source_names(def, rest),
            "MS" => self.surround_mode(def, rest),
            "DASTN" => self.exclusive_station_name(def, rest, "TFANNAME"),
            "TFANNAME" => self.exclusive_station_name(def, rest, "DASTN"),
            "DAPTY" | "DAENL" | "DAFRQ" | "DAINF" | "TMAN" | "NSFRN" | "SSLAN" | "R1" | "R2"
            | "R3" => self.string_cell(def, rest),
            "DAQUA" => self.int_cell(def, rest, 0, 100),
            "TPAN" => self.int_cell(def, rest, 1, 56),
            "SPPR" => self.int_cell(def, rest, 1, 2),
            "PSDEL" => self.int_cell(def, rest, 0, 300),
            "PSLFE" => self.lfe_level(def, rest),
            "PSREFLEV" => self.reference_level(def, rest),
            "PSBAS" | "Z2PSBAS" | "Z3PSBAS" | "PSTRE" | "Z2PSTRE" | "Z3PSTRE" => {
                self.tone_level(def, rest)
            }
            "OPTPN" => self.station_presets(def, rest),
            "SSINFFRM" => self.microcode(def, rest),
            "SSINFAISFSV" => self.sampling_rate(def, rest),
            "BTTX" => self.bluetooth(def, rest),
            _ => self.closed_set(def, rest),
        }
    }

    fn set_cell(&mut self, def: &'static CommandDef, value: CellValue) -> Vec<Update> {
        self.status.insert(def.code, Some(value.clone()));
        vec![Update { def, value }]
    }

    fn clear_cell(&mut self, code: &'static str) {
        self.status.insert(code, None);
    }

    /// The committed speaker-level mapping, created on first use so that
    /// single-line `PSCLV`/`PSSWL` updates have somewhere to land.
    fn speaker_map(&mut self) -> &mut BTreeMap<Channel, f64> {
        let slot = self.status.entry("SSLEV").or_insert(None);
        if !matches!(slot, Some(CellValue::ChannelMap(_))) {
            *slot = Some(CellValue::ChannelMap(BTreeMap::new()));
        }
        match slot {
            Some(CellValue::ChannelMap(m)) => m,
            _ => unreachable!(),
        }
    }

    fn preset_map(&mut self) -> &mut BTreeMap<u8, String> {
        let slot = self.status.entry("OPTPN").or_insert(None);
        if !matches!(slot, Some(CellValue::PresetMap(_))) {
            *slot = Some(CellValue::PresetMap(BTreeMap::new()));
        }
        match slot {
            Some(CellValue::PresetMap(m)) => m,
            _ => unreachable!(),
        }
    }

    fn bluetooth_map(&mut self) -> &mut BTreeMap<BluetoothDimension, String> {
        let slot = self.status.entry("BTTX").or_insert(None);
        if !matches!(slot, Some(CellValue::BluetoothMap(_))) {
            *slot = Some(CellValue::BluetoothMap(BTreeMap::new()));
        }
        match slot {
            Some(CellValue::BluetoothMap(m)) => m,
            _ => unreachable!(),
        }
    }

    // ── Generic handlers ────────────────────────────────────────────────

    fn closed_set(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let Some(set) = def.values else {
            log::debug!("[Parser] no handler for {} payload {rest:?}", def.code);
            return Vec::new();
        };
        match set.parse(rest) {
            Some(value) => self.set_cell(def, value),
            None => {
                log::debug!("[Parser] {} does not accept {rest:?}", def.code);
                Vec::new()
            }
        }
    }

    fn on_off(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        match rest {
            "ON" => self.set_cell(def, CellValue::Switch(true)),
            "OFF" => self.set_cell(def, CellValue::Switch(false)),
            _ => {
                log::debug!("[Parser] {} expects ON/OFF, got {rest:?}", def.code);
                Vec::new()
            }
        }
    }

    fn string_cell(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let text = rest.replace('_', " ").trim().to_string();
        self.set_cell(def, CellValue::Text(text))
    }

    fn int_cell(&mut self, def: &'static CommandDef, rest: &str, min: i64, max: i64) -> Vec<Update> {
        let digits = only_int(rest);
        if digits.is_empty() {
            log::debug!("[Parser] {} expects an integer, got {rest:?}", def.code);
            return Vec::new();
        }
        let value: i64 = digits.parse().unwrap_or(max);
        self.set_cell(def, CellValue::Integer(value.clamp(min, max)))
    }

    // ── Specialised handlers ────────────────────────────────────────────

    fn tone_control(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        // PSTONE CTRL ON|OFF
        match rest.strip_prefix("CTRL") {
            Some(flag) => self.on_off(def, flag.trim()),
            None => {
                log::debug!("[Parser] PSTONE payload {rest:?} ignored");
                Vec::new()
            }
        }
    }

    fn main_volume(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let Some(level) = parse_wire_level(rest) else {
            log::debug!("[Parser] MV payload {rest:?} is not numeric");
            return Vec::new();
        };
        if rest.starts_with("MAX") {
            self.max_volume = level;
            log::debug!("[Parser] max volume is now {level}");
            // The ceiling is bookkeeping, not an observable cell.
            Vec::new()
        } else {
            self.set_cell(def, CellValue::Decimal(level))
        }
    }

    /// The `Z2`/`Z3` prefix is overloaded: power, volume, source, bass and
    /// treble all ride it. Try each interpretation in a fixed order.
    fn zone_overload(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let zone_code = def.code;
        if rest == "ON" || rest == "OFF" {
            return self.closed_set(def, rest);
        }
        if rest.starts_with("SMART") || rest.starts_with("FAVORITE") {
            // Smart-select and favourite recalls carry no cell.
            return Vec::new();
        }
        if let Some(tail) = rest.strip_prefix("PSBAS") {
            if let Some(d) = catalogue::find_zone_code(zone_code, "PSBAS") {
                return self.tone_level(d, tail.trim());
            }
        }
        if let Some(tail) = rest.strip_prefix("PSTRE") {
            if let Some(d) = catalogue::find_zone_code(zone_code, "PSTRE") {
                return self.tone_level(d, tail.trim());
            }
        }
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            if let (Some(level), Some(d)) =
                (parse_wire_level(rest), catalogue::find_zone_code(zone_code, "MV"))
            {
                return self.set_cell(d, CellValue::Decimal(level));
            }
        }
        if let (Some(src), Some(d)) =
            (InputSource::from_wire(rest), catalogue::find_zone_code(zone_code, "SI"))
        {
            return self.set_cell(d, CellValue::Source(src));
        }
        log::debug!("[Parser] unhandled {zone_code} payload {rest:?}");
        Vec::new()
    }

    fn channel_bias_line(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        if rest == "END" {
            let map = std::mem::take(&mut self.cv_accum);
            return self.set_cell(def, CellValue::ChannelMap(map));
        }
        let Some((chan, level)) = parse_channel_level(rest) else {
            log::debug!("[Parser] CV line {rest:?} ignored");
            return Vec::new();
        };
        self.cv_accum.insert(chan, level);
        Vec::new()
    }

    fn speaker_level_line(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        if rest == "END" {
            let map = std::mem::take(&mut self.lev_accum);
            return self.set_cell(def, CellValue::ChannelMap(map));
        }
        let Some((chan, level)) = parse_channel_level(rest) else {
            log::debug!("[Parser] SSLEV line {rest:?} ignored");
            return Vec::new();
        };
        self.lev_accum.insert(chan, level);
        Vec::new()
    }

    /// `PSCLV`/`PSSWL` arrive as single lines outside any END-terminated
    /// block; they land in the committed `SSLEV` mapping directly.
    fn fixed_channel_level(
        &mut self,
        def: &'static CommandDef,
        rest: &str,
        chan: Channel,
    ) -> Vec<Update> {
        let Some(level) = parse_wire_level(rest).map(|l| l - LEVEL_OFFSET) else {
            log::debug!("[Parser] {} payload {rest:?} is not a level", def.code);
            return Vec::new();
        };
        self.speaker_map().insert(chan, level);
        vec![Update { def, value: CellValue::Decimal(level) }]
    }

    fn subwoofer_level(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        // PSSWL nn is the first subwoofer, PSSWL 2 nn the second.
        match rest.strip_prefix("2 ") {
            Some(tail) => self.fixed_channel_level(def, tail.trim(), Channel::Subwoofer2),
            None => self.fixed_channel_level(def, rest, Channel::Subwoofer),
        }
    }

    fn source_availability(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        if rest == "END" {
            self.sources = std::mem::take(&mut self.sod_use_accum);
            self.sources_not_used = std::mem::take(&mut self.sod_del_accum);
            let list = self.sources.clone();
            return self.set_cell(def, CellValue::SourceList(list));
        }
        let Some((src, flag)) = rest.rsplit_once(' ') else {
            log::debug!("[Parser] SSSOD line {rest:?} ignored");
            return Vec::new();
        };
        let Some(source) = InputSource::from_wire(src.trim()) else {
            log::debug!("[Parser] SSSOD names unknown source {src:?}");
            return Vec::new();
        };
        match flag {
            "USE" => self.sod_use_accum.push(source),
            "DEL" => self.sod_del_accum.push(source),
            _ => log::debug!("[Parser] SSSOD flag {flag:?} ignored"),
        }
        Vec::new()
    }

    fn source_names(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        if rest == "END" {
            let map = std::mem::take(&mut self.fun_accum);
            return self.set_cell(def, CellValue::NameMap(map));
        }
        let Some((src, name)) = rest.split_once(' ') else {
            log::debug!("[Parser] SSFUN line {rest:?} ignored");
            return Vec::new();
        };
        let Some(source) = InputSource::from_wire(src.trim()) else {
            log::debug!("[Parser] SSFUN names unknown source {src:?}");
            return Vec::new();
        };
        self.fun_accum.insert(source, name.replace('_', " ").trim().to_string());
        Vec::new()
    }

    /// The surround-mode reply is free-form text that does not match the
    /// command alphabet. Classification is substring-based and lossy on
    /// purpose; unknown strings leave the cell untouched.
    fn surround_mode(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let mode = if rest.contains("PURE DIRECT") {
            SurroundMode::PureDirect
        } else if rest.contains("DIRECT") {
            SurroundMode::Direct
        } else if rest.contains("M CH")
            || rest.contains("MULTI C")
            || rest.contains("AAC")
            || rest.contains("DOLBY")
        {
            SurroundMode::DolbyDigital
        } else if rest.contains("DTS") || rest.contains("AL:X") {
            SurroundMode::DtsSurround
        } else if let Some(exact) = SurroundMode::from_wire(rest) {
            exact
        } else {
            log::info!("[Parser] unknown surround mode {rest:?}");
            return Vec::new();
        };
        self.set_cell(def, CellValue::Surround(mode))
    }

    /// DAB and RDS station names are mutually exclusive; whichever arrives
    /// last nulls the other.
    fn exclusive_station_name(
        &mut self,
        def: &'static CommandDef,
        rest: &str,
        other: &'static str,
    ) -> Vec<Update> {
        self.clear_cell(other);
        self.string_cell(def, rest)
    }

    fn lfe_level(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let digits = only_int(rest);
        if digits.is_empty() {
            log::debug!("[Parser] PSLFE payload {rest:?} is not numeric");
            return Vec::new();
        }
        let value: i64 = digits.parse().unwrap_or(0);
        self.set_cell(def, CellValue::Integer((-value).clamp(-10, 0)))
    }

    fn reference_level(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let digits = only_int(rest);
        if digits.is_empty() {
            log::debug!("[Parser] PSREFLEV payload {rest:?} is not numeric");
            return Vec::new();
        }
        let value: i64 = digits.parse().unwrap_or(0);
        let value = value.clamp(0, 99);
        let quantised = ((value as f64 / 5.0).round() * 5.0) as i64;
        self.set_cell(def, CellValue::Integer(quantised))
    }

    fn tone_level(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let Some(level) = parse_wire_level(rest).map(|l| l - LEVEL_OFFSET) else {
            log::debug!("[Parser] {} payload {rest:?} is not a level", def.code);
            return Vec::new();
        };
        self.set_cell(def, CellValue::Decimal(level))
    }

    /// Preset lines may arrive concatenated; the next `OPTPNnn` tag inside
    /// the name marks where to split.
    fn station_presets(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let mut updates = Vec::new();
        let mut rest = rest.trim();
        while rest.len() >= 2 {
            let (num_part, name_part) = rest.split_at(2);
            let Ok(num) = num_part.parse::<u8>() else {
                log::debug!("[Parser] OPTPN line {rest:?} has no preset number");
                break;
            };
            let name_part = name_part.trim_start();
            let next_tag = format!("OPTPN{:02}", num.wrapping_add(1));
            let (name, tail) = match name_part.find(&next_tag) {
                Some(idx) => (&name_part[..idx], Some(&name_part[idx + "OPTPN".len()..])),
                None => (name_part, None),
            };

            let map = self.preset_map();
            map.insert(num, name.trim().to_string());
            if num >= LAST_TUNER_PRESET {
                let value = CellValue::PresetMap(map.clone());
                updates.push(Update { def, value });
            }

            match tail {
                Some(t) => rest = t,
                None => break,
            }
        }
        updates
    }

    fn microcode(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        if rest == "END" {
            let map = std::mem::take(&mut self.micro_accum);
            return self.set_cell(def, CellValue::MicrocodeMap(map));
        }
        let Some((kind, version)) = rest.split_once(' ') else {
            log::debug!("[Parser] SSINFFRM line {rest:?} ignored");
            return Vec::new();
        };
        let Some(kind) = MicroCodeType::from_wire(kind.trim()) else {
            log::debug!("[Parser] SSINFFRM names unknown block {rest:?}");
            return Vec::new();
        };
        self.micro_accum.insert(kind, version.trim().to_string());
        Vec::new()
    }

    fn sampling_rate(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let token = rest.rsplit(' ').next().unwrap_or(rest);
        if token == "NON" {
            return self.set_cell(def, CellValue::Text("-".to_string()));
        }
        let digits = only_int(token);
        if digits.is_empty() {
            log::debug!("[Parser] sampling rate {rest:?} ignored");
            return Vec::new();
        }
        let raw: i64 = digits.parse().unwrap_or(0);
        // Values above 200 are tenths of kHz (441 -> 44.1).
        let rate = if raw > 200 { raw as f64 / 10.0 } else { raw as f64 };
        self.set_cell(def, CellValue::Decimal(rate))
    }

    fn bluetooth(&mut self, def: &'static CommandDef, rest: &str) -> Vec<Update> {
        let (dim, literal) = match rest {
            "ON" | "OFF" => (BluetoothDimension::Transmitter, rest),
            "SP" | "BT" => (BluetoothDimension::OutputMode, rest),
            _ => {
                log::debug!("[Parser] BTTX payload {rest:?} ignored");
                return Vec::new();
            }
        };
        let map = self.bluetooth_map();
        map.insert(dim, literal.to_string());
        let value = CellValue::BluetoothMap(map.clone());
        vec![Update { def, value }]
    }
}

/// Keeps the ASCII digits of a payload, the way the device intersperses
/// levels with annotations.
fn only_int(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Decodes the numeric level convention: two digits are whole units,
/// three digits are tenths.
fn parse_wire_level(s: &str) -> Option<f64> {
    let digits = only_int(s);
    if digits.is_empty() {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    Some(if digits.len() > 2 { n as f64 / 10.0 } else { n as f64 })
}

/// Decodes a `<channel> <level>` pair with the ±50 bias offset.
fn parse_channel_level(rest: &str) -> Option<(Channel, f64)> {
    let (code, level) = rest.rsplit_once(' ')?;
    let chan = Channel::from_wire(code.trim())?;
    let level = parse_wire_level(level)? - LEVEL_OFFSET;
    Some((chan, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{DrcMode, EcoMode, PictureMode, Power};

    fn state() -> DeviceState {
        DeviceState::new()
    }

    fn single(state: &mut DeviceState, line: &str) -> Update {
        let mut updates = state.handle_line(line);
        assert_eq!(updates.len(), 1, "expected one update for {line:?}");
        updates.remove(0)
    }

    #[test]
    fn power_round_trip() {
        let mut st = state();
        let up = single(&mut st, "PWON");
        assert_eq!(up.def.code, "PW");
        assert_eq!(up.value, CellValue::Power(Power::On));
        assert_eq!(st.current("PW"), Some(&CellValue::Power(Power::On)));
    }

    #[test]
    fn probe_echo_with_question_mark_still_parses() {
        let mut st = state();
        let up = single(&mut st, "PW?ON");
        assert_eq!(up.value, CellValue::Power(Power::On));
    }

    #[test]
    fn unknown_lines_are_dropped() {
        let mut st = state();
        assert!(st.handle_line("XYZZY42").is_empty());
        assert!(st.handle_line("").is_empty());
    }

    #[test]
    fn volume_two_and_three_digit_forms() {
        let mut st = state();
        assert_eq!(single(&mut st, "MV42").value, CellValue::Decimal(42.0));
        assert_eq!(single(&mut st, "MV425").value, CellValue::Decimal(42.5));
    }

    #[test]
    fn mvmax_updates_ceiling_not_cell() {
        let mut st = state();
        single(&mut st, "MV42");
        assert!(st.handle_line("MVMAX 85").is_empty());
        assert_eq!(st.max_volume(), 85.0);
        assert_eq!(st.current("MV"), Some(&CellValue::Decimal(42.0)));

        assert!(st.handle_line("MVMAX 805").is_empty());
        assert_eq!(st.max_volume(), 80.5);
    }

    #[test]
    fn mute_family_is_boolean() {
        let mut st = state();
        assert_eq!(single(&mut st, "MUON").value, CellValue::Switch(true));
        assert_eq!(single(&mut st, "Z2MUOFF").value, CellValue::Switch(false));
        assert_eq!(single(&mut st, "Z3MUON").def.code, "Z3MU");
    }

    #[test]
    fn zone_prefix_routes_power_volume_source_and_tone() {
        let mut st = state();
        let up = single(&mut st, "Z2ON");
        assert_eq!(up.def.code, "Z2");
        assert_eq!(up.value, CellValue::Power(Power::On));

        let up = single(&mut st, "Z240");
        assert_eq!(up.def.code, "Z2MV");
        assert_eq!(up.value, CellValue::Decimal(40.0));

        let up = single(&mut st, "Z2CD");
        assert_eq!(up.def.code, "Z2SI");
        assert_eq!(up.value, CellValue::Source(InputSource::Cd));

        let up = single(&mut st, "Z3PSBAS 52");
        assert_eq!(up.def.code, "Z3PSBAS");
        assert_eq!(up.value, CellValue::Decimal(2.0));

        let up = single(&mut st, "Z2PSTRE 44");
        assert_eq!(up.def.code, "Z2PSTRE");
        assert_eq!(up.value, CellValue::Decimal(-6.0));
    }

    #[test]
    fn zone_smart_select_is_ignored() {
        let mut st = state();
        assert!(st.handle_line("Z2SMART1").is_empty());
        assert!(st.handle_line("Z3FAVORITE2").is_empty());
    }

    #[test]
    fn zone_source_with_digits_is_not_volume() {
        let mut st = state();
        let up = single(&mut st, "Z2AUX1");
        assert_eq!(up.def.code, "Z2SI");
        assert_eq!(up.value, CellValue::Source(InputSource::Aux1));
    }

    #[test]
    fn cv_block_aggregates_and_commits_at_end() {
        let mut st = state();
        assert!(st.handle_line("CVFL 52").is_empty());
        assert!(st.handle_line("CVFR 48").is_empty());
        // Nothing observable until the sentinel.
        assert_eq!(st.current("CV"), None);

        let up = single(&mut st, "CVEND");
        match &up.value {
            CellValue::ChannelMap(m) => {
                assert_eq!(m.get(&Channel::FrontLeft), Some(&2.0));
                assert_eq!(m.get(&Channel::FrontRight), Some(&-2.0));
                assert_eq!(m.len(), 2);
            }
            other => panic!("expected channel map, got {other:?}"),
        }
        assert_eq!(st.channel_bias(Channel::FrontLeft), Some(2.0));
    }

    #[test]
    fn cv_block_resets_after_end() {
        let mut st = state();
        st.handle_line("CVFL 52");
        st.handle_line("CVEND");
        // A fresh block starts empty; the old entries must not leak in.
        st.handle_line("CVC 405");
        let up = single(&mut st, "CVEND");
        match &up.value {
            CellValue::ChannelMap(m) => {
                assert_eq!(m.len(), 1);
                assert_eq!(m.get(&Channel::Centre), Some(&-9.5));
            }
            other => panic!("expected channel map, got {other:?}"),
        }
    }

    #[test]
    fn cv_three_digit_levels_are_tenths() {
        let mut st = state();
        st.handle_line("CVSW2 405");
        let up = single(&mut st, "CVEND");
        match &up.value {
            CellValue::ChannelMap(m) => assert_eq!(m.get(&Channel::Subwoofer2), Some(&-9.5)),
            other => panic!("expected channel map, got {other:?}"),
        }
    }

    #[test]
    fn sslev_block_commits_at_end() {
        let mut st = state();
        assert!(st.handle_line("SSLEV FL 515").is_empty());
        assert!(st.handle_line("SSLEV C 49").is_empty());
        let up = single(&mut st, "SSLEV END");
        assert_eq!(up.def.code, "SSLEV");
        match &up.value {
            CellValue::ChannelMap(m) => {
                assert_eq!(m.get(&Channel::FrontLeft), Some(&1.5));
                assert_eq!(m.get(&Channel::Centre), Some(&-1.0));
            }
            other => panic!("expected channel map, got {other:?}"),
        }
    }

    #[test]
    fn centre_and_subwoofer_levels_join_the_speaker_map() {
        let mut st = state();
        let up = single(&mut st, "PSCLV 515");
        assert_eq!(up.def.code, "PSCLV");
        assert_eq!(up.value, CellValue::Decimal(1.5));

        let up = single(&mut st, "PSSWL 48");
        assert_eq!(up.value, CellValue::Decimal(-2.0));

        let up = single(&mut st, "PSSWL 2 52");
        assert_eq!(up.def.code, "PSSWL");
        assert_eq!(up.value, CellValue::Decimal(2.0));

        match st.current("SSLEV") {
            Some(CellValue::ChannelMap(m)) => {
                assert_eq!(m.get(&Channel::Centre), Some(&1.5));
                assert_eq!(m.get(&Channel::Subwoofer), Some(&-2.0));
                assert_eq!(m.get(&Channel::Subwoofer2), Some(&2.0));
            }
            other => panic!("expected channel map, got {other:?}"),
        }
    }

    #[test]
    fn source_availability_partitions_use_and_del() {
        let mut st = state();
        assert!(st.handle_line("SSSODCD USE").is_empty());
        assert!(st.handle_line("SSSODSAT/CBL USE").is_empty());
        assert!(st.handle_line("SSSODPHONO DEL").is_empty());
        let up = single(&mut st, "SSSODEND");
        assert_eq!(
            up.value,
            CellValue::SourceList(vec![InputSource::Cd, InputSource::SetTopBox])
        );
        assert_eq!(st.sources(), &[InputSource::Cd, InputSource::SetTopBox]);
        assert_eq!(st.sources_not_used(), &[InputSource::Phono]);
    }

    #[test]
    fn source_names_unescape_underscores() {
        let mut st = state();
        assert!(st.handle_line("SSFUNCD My_CD_Player").is_empty());
        assert!(st.handle_line("SSFUNBD Blu-ray").is_empty());
        let up = single(&mut st, "SSFUNEND");
        match &up.value {
            CellValue::NameMap(m) => {
                assert_eq!(m.get(&InputSource::Cd).unwrap(), "My CD Player");
                assert_eq!(m.get(&InputSource::Bluray).unwrap(), "Blu-ray");
            }
            other => panic!("expected name map, got {other:?}"),
        }
    }

    #[test]
    fn surround_classifier_is_substring_based() {
        let mut st = state();
        let up = single(&mut st, "MSDOLBY DIGITAL+ATMOS");
        assert_eq!(up.value, CellValue::Surround(SurroundMode::DolbyDigital));

        let up = single(&mut st, "MSDTS HD MSTR");
        assert_eq!(up.value, CellValue::Surround(SurroundMode::DtsSurround));

        let up = single(&mut st, "MSPURE DIRECT");
        assert_eq!(up.value, CellValue::Surround(SurroundMode::PureDirect));

        let up = single(&mut st, "MSDIRECT");
        assert_eq!(up.value, CellValue::Surround(SurroundMode::Direct));

        let up = single(&mut st, "MSSTEREO");
        assert_eq!(up.value, CellValue::Surround(SurroundMode::Stereo));

        // No match leaves the cell untouched.
        assert!(st.handle_line("MSWIDE SCREEN").is_empty());
        assert_eq!(
            st.current("MS"),
            Some(&CellValue::Surround(SurroundMode::Stereo))
        );
    }

    #[test]
    fn station_names_are_mutually_exclusive() {
        let mut st = state();
        single(&mut st, "DASTN FIP_Jazz");
        assert_eq!(
            st.current("DASTN"),
            Some(&CellValue::Text("FIP Jazz".to_string()))
        );

        single(&mut st, "TFANNAMEFrance Inter");
        assert_eq!(st.current("DASTN"), None);
        assert_eq!(
            st.current("TFANNAME"),
            Some(&CellValue::Text("France Inter".to_string()))
        );

        single(&mut st, "DASTN FIP");
        assert_eq!(st.current("TFANNAME"), None);
    }

    #[test]
    fn tuner_integers_are_clamped() {
        let mut st = state();
        assert_eq!(single(&mut st, "TPAN03").value, CellValue::Integer(3));
        assert_eq!(single(&mut st, "TPAN99").value, CellValue::Integer(56));
        assert_eq!(single(&mut st, "DAQUA 87").value, CellValue::Integer(87));
    }

    #[test]
    fn delay_lfe_and_reference_level_ranges() {
        let mut st = state();
        assert_eq!(single(&mut st, "PSDEL 120").value, CellValue::Integer(120));
        assert_eq!(single(&mut st, "PSDEL 999").value, CellValue::Integer(300));

        assert_eq!(single(&mut st, "PSLFE 07").value, CellValue::Integer(-7));
        assert_eq!(single(&mut st, "PSLFE 00").value, CellValue::Integer(0));

        assert_eq!(single(&mut st, "PSREFLEV 13").value, CellValue::Integer(15));
        assert_eq!(single(&mut st, "PSREFLEV 05").value, CellValue::Integer(5));
    }

    #[test]
    fn tone_control_switch() {
        let mut st = state();
        let up = single(&mut st, "PSTONE CTRL ON");
        assert_eq!(up.def.code, "PSTONE");
        assert_eq!(up.value, CellValue::Switch(true));
    }

    #[test]
    fn bass_treble_levels_use_the_bias_offset() {
        let mut st = state();
        assert_eq!(single(&mut st, "PSBAS 62").value, CellValue::Decimal(12.0));
        assert_eq!(single(&mut st, "PSTRE 38").value, CellValue::Decimal(-12.0));
        assert_eq!(single(&mut st, "PSBAS 505").value, CellValue::Decimal(0.5));
    }

    #[test]
    fn station_presets_accumulate_and_notify_on_last() {
        let mut st = state();
        assert!(st.handle_line("OPTPN01 FIP").is_empty());
        assert!(st.handle_line("OPTPN02 RADIO FRANCE").is_empty());
        let ups = st.handle_line("OPTPN56 LAST ONE");
        assert_eq!(ups.len(), 1);
        match &ups[0].value {
            CellValue::PresetMap(m) => {
                assert_eq!(m.get(&1).unwrap(), "FIP");
                assert_eq!(m.get(&2).unwrap(), "RADIO FRANCE");
                assert_eq!(m.get(&56).unwrap(), "LAST ONE");
            }
            other => panic!("expected preset map, got {other:?}"),
        }
    }

    #[test]
    fn concatenated_preset_lines_are_split() {
        let mut st = state();
        assert!(st
            .handle_line("OPTPN03 FIPOPTPN04 NOVA")
            .is_empty());
        match st.current("OPTPN") {
            Some(CellValue::PresetMap(m)) => {
                assert_eq!(m.get(&3).unwrap(), "FIP");
                assert_eq!(m.get(&4).unwrap(), "NOVA");
            }
            other => panic!("expected preset map, got {other:?}"),
        }
    }

    #[test]
    fn microcode_block_commits_at_end() {
        let mut st = state();
        assert!(st.handle_line("SSINFFRM AVR 4700-6069-1061").is_empty());
        assert!(st.handle_line("SSINFFRM DTS 3.90.60.00").is_empty());
        let up = single(&mut st, "SSINFFRM END");
        match &up.value {
            CellValue::MicrocodeMap(m) => {
                assert_eq!(m.get(&MicroCodeType::Avr).unwrap(), "4700-6069-1061");
                assert_eq!(m.get(&MicroCodeType::Dts).unwrap(), "3.90.60.00");
            }
            other => panic!("expected microcode map, got {other:?}"),
        }
    }

    #[test]
    fn sampling_rate_extra() {
        let mut st = state();
        assert_eq!(
            single(&mut st, "SSINFAISFSV 441").value,
            CellValue::Decimal(44.1)
        );
        assert_eq!(
            single(&mut st, "SSINFAISFSV 48").value,
            CellValue::Decimal(48.0)
        );
        assert_eq!(
            single(&mut st, "SSINFAISFSV NON").value,
            CellValue::Text("-".to_string())
        );
    }

    #[test]
    fn bluetooth_dimensions_share_one_cell() {
        let mut st = state();
        single(&mut st, "BTTX ON");
        let up = single(&mut st, "BTTX SP");
        match &up.value {
            CellValue::BluetoothMap(m) => {
                assert_eq!(m.get(&BluetoothDimension::Transmitter).unwrap(), "ON");
                assert_eq!(m.get(&BluetoothDimension::OutputMode).unwrap(), "SP");
            }
            other => panic!("expected bluetooth map, got {other:?}"),
        }
    }

    #[test]
    fn zone_names_are_strings() {
        let mut st = state();
        let up = single(&mut st, "R1MAIN ZONE");
        assert_eq!(up.def.code, "R1");
        assert_eq!(up.value, CellValue::Text("MAIN ZONE".to_string()));
        assert_eq!(single(&mut st, "R2Kitchen").def.code, "R2");
    }

    #[test]
    fn generic_closed_sets() {
        let mut st = state();
        assert_eq!(
            single(&mut st, "ECOAUTO").value,
            CellValue::Eco(EcoMode::Auto)
        );
        assert_eq!(
            single(&mut st, "PVMOV").value,
            CellValue::Picture(PictureMode::Movie)
        );
        assert_eq!(
            single(&mut st, "PSDRC MID").value,
            CellValue::Drc(DrcMode::Medium)
        );
        assert_eq!(single(&mut st, "SICD").value, CellValue::Source(InputSource::Cd));
        assert_eq!(single(&mut st, "SPPR 2").value, CellValue::Integer(2));
        assert_eq!(single(&mut st, "SSLOCON").value, CellValue::Switch(true));
    }

    #[test]
    fn unchanged_values_still_notify() {
        let mut st = state();
        single(&mut st, "PWON");
        // The refresh confirmation repeats the value; the host still
        // receives it.
        let up = single(&mut st, "PWON");
        assert_eq!(up.value, CellValue::Power(Power::On));
    }
}
