//! Static catalogue of recognised mnemonics.
//!
//! One [`CommandDef`] per mnemonic: its exact query form (some need a
//! space before the `?`), its human label, the zone it binds to, and the
//! closed value set when the cell is enum-valued. Inbound dispatch picks
//! the longest code matching the start of a line; Refresh walks the
//! distinct query forms in table order.

use super::types::{
    AudioRestorer, DrcMode, DynamicVolume, EcoMode, InputSource, PictureMode, Power, StandbyTimer,
    SurroundMode, Zone,
};
use super::value::CellValue;

/// Closed value set backing an enum-valued cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSet {
    Power,
    Source,
    Surround,
    Picture,
    Eco,
    Drc,
    DynamicVolume,
    Restorer,
    Standby,
}

impl ValueSet {
    /// Matches an exact wire literal against the set.
    pub fn parse(self, s: &str) -> Option<CellValue> {
        match self {
            ValueSet::Power => Power::from_wire(s).map(CellValue::Power),
            ValueSet::Source => InputSource::from_wire(s).map(CellValue::Source),
            ValueSet::Surround => SurroundMode::from_wire(s).map(CellValue::Surround),
            ValueSet::Picture => PictureMode::from_wire(s).map(CellValue::Picture),
            ValueSet::Eco => EcoMode::from_wire(s).map(CellValue::Eco),
            ValueSet::Drc => DrcMode::from_wire(s).map(CellValue::Drc),
            ValueSet::DynamicVolume => DynamicVolume::from_wire(s).map(CellValue::DynamicVolume),
            ValueSet::Restorer => AudioRestorer::from_wire(s).map(CellValue::Restorer),
            ValueSet::Standby => StandbyTimer::from_wire(s).map(CellValue::Standby),
        }
    }
}

/// Immutable definition of one mnemonic.
#[derive(Debug)]
pub struct CommandDef {
    /// The mnemonic itself, as it prefixes inbound lines.
    pub code: &'static str,
    /// Exact byte sequence emitted to query the current value.
    pub query_form: &'static str,
    /// Human-readable name forwarded to the host.
    pub label: &'static str,
    /// Zone the property belongs to; `Undefined` is system-wide.
    pub zone: Zone,
    /// Closed value set, when the generic enum handler applies.
    pub values: Option<ValueSet>,
}

const fn def(
    code: &'static str,
    query_form: &'static str,
    label: &'static str,
    zone: Zone,
    values: Option<ValueSet>,
) -> CommandDef {
    CommandDef { code, query_form, label, zone, values }
}

/// The full mnemonic table, in refresh order.
///
/// Entries sharing a query form (the DAB strings behind `DA ?`, the zone
/// names behind `RR ?`) are queried once per Refresh.
pub static CATALOGUE: &[CommandDef] = &[
    // Power
    def("PW", "PW?", "Main Power", Zone::Undefined, Some(ValueSet::Power)),
    def("ZM", "ZM?", "Power", Zone::Main, Some(ValueSet::Power)),
    def("Z2", "Z2?", "Power", Zone::Zone2, Some(ValueSet::Power)),
    def("Z3", "Z3?", "Power", Zone::Zone3, Some(ValueSet::Power)),
    def("STBY", "STBY?", "Standby Timer", Zone::Undefined, Some(ValueSet::Standby)),
    // Mute
    def("MU", "MU?", "Muted", Zone::Main, None),
    def("Z2MU", "Z2MU?", "Muted", Zone::Zone2, None),
    def("Z3MU", "Z3MU?", "Muted", Zone::Zone3, None),
    // Volume
    def("MV", "MV?", "Volume", Zone::Main, None),
    def("Z2MV", "Z2MV?", "Volume", Zone::Zone2, None),
    def("Z3MV", "Z3MV?", "Volume", Zone::Zone3, None),
    // Source
    def("SI", "SI?", "Source", Zone::Main, Some(ValueSet::Source)),
    def("Z2SI", "Z2SI?", "Source", Zone::Zone2, Some(ValueSet::Source)),
    def("Z3SI", "Z3SI?", "Source", Zone::Zone3, Some(ValueSet::Source)),
    def("SV", "SV?", "Video Mode", Zone::Undefined, Some(ValueSet::Source)),
    def("SSSOD", "SSSOD ?", "Available Source", Zone::Undefined, Some(ValueSet::Source)),
    def("SSFUN", "SSFUN ?", "Source Names", Zone::Undefined, None),
    // Modes
    def("MS", "MS?", "Surround Mode", Zone::Undefined, Some(ValueSet::Surround)),
    def("PV", "PV?", "Picture Mode", Zone::Undefined, Some(ValueSet::Picture)),
    def("ECO", "ECO?", "Eco Mode", Zone::Undefined, Some(ValueSet::Eco)),
    def("PSDRC", "PSDRC ?", "Dynamic Range Compression", Zone::Undefined, Some(ValueSet::Drc)),
    def("PSDYNVOL", "PSDYNVOL ?", "Dynamic Volume", Zone::Undefined, Some(ValueSet::DynamicVolume)),
    def("PSRSTR", "PSRSTR ?", "Audio Restorer", Zone::Undefined, Some(ValueSet::Restorer)),
    // Channels
    def("CV", "CV?", "Channel Bias", Zone::Undefined, None),
    def("SSLEV", "SSLEV ?", "Speaker Level", Zone::Undefined, None),
    def("PSCLV", "PSCLV ?", "Centre Level", Zone::Undefined, None),
    def("PSSWL", "PSSWL ?", "Subwoofer Level", Zone::Undefined, None),
    // Tone
    def("PSBAS", "PSBAS ?", "Sound Bass", Zone::Main, None),
    def("Z2PSBAS", "Z2PSBAS ?", "Sound Bass", Zone::Zone2, None),
    def("Z3PSBAS", "Z3PSBAS ?", "Sound Bass", Zone::Zone3, None),
    def("PSTRE", "PSTRE ?", "Sound Treble", Zone::Main, None),
    def("Z2PSTRE", "Z2PSTRE ?", "Sound Treble", Zone::Zone2, None),
    def("Z3PSTRE", "Z3PSTRE ?", "Sound Treble", Zone::Zone3, None),
    def("PSTONE", "PSTONE CTRL ?", "Sound Tone Control", Zone::Undefined, None),
    def("PSLFE", "PSLFE ?", "Sound LFE", Zone::Undefined, None),
    def("PSDEL", "PSDEL ?", "Sound Delay", Zone::Undefined, None),
    // EQ
    def("PSHEQ", "PSHEQ ?", "Headphone EQ", Zone::Undefined, None),
    def("PSDYNEQ", "PSDYNEQ ?", "Dynamic EQ", Zone::Undefined, None),
    def("PSREFLEV", "PSREFLEV ?", "Dynamic EQ Reference Level", Zone::Undefined, None),
    // Tuner
    def("DASTN", "DA ?", "Tuner Station Name", Zone::Undefined, None),
    def("DAPTY", "DA ?", "DAB Programme Type", Zone::Undefined, None),
    def("DAENL", "DA ?", "DAB Ensemble", Zone::Undefined, None),
    def("DAFRQ", "DA ?", "DAB Frequency", Zone::Undefined, None),
    def("DAQUA", "DA ?", "DAB Quality", Zone::Undefined, None),
    def("DAINF", "DA ?", "DAB Audio Information", Zone::Undefined, None),
    def("TFANNAME", "TFANNAME?", "Tuner Station Name", Zone::Undefined, None),
    def("TPAN", "TPAN?", "Tuner Preset", Zone::Undefined, None),
    def("TMAN", "TMAN?", "Tuner Mode", Zone::Undefined, None),
    def("OPTPN", "OPTPN ?", "Preset Stations", Zone::Undefined, None),
    // Device
    def("NSFRN", "NSFRN ?", "Friendly Name", Zone::Undefined, None),
    def("SSLAN", "SSLAN ?", "Language", Zone::Undefined, None),
    def("SSINFFRM", "SSINFFRM ?", "Microcode Versions", Zone::Undefined, None),
    def("SSINFAISFSV", "SSINFAISFSV ?", "Sampling Rate", Zone::Undefined, None),
    def("SPPR", "SPPR ?", "Speaker Preset", Zone::Undefined, None),
    def("BTTX", "BTTX ?", "Bluetooth Transmitter", Zone::Undefined, None),
    def("SSLOC", "SSLOC ?", "Panel Lock", Zone::Undefined, None),
    def("R1", "RR ?", "Zone Name", Zone::Main, None),
    def("R2", "RR ?", "Zone Name", Zone::Zone2, None),
    def("R3", "RR ?", "Zone Name", Zone::Zone3, None),
];

/// Looks up a definition by exact code.
pub fn find(code: &str) -> Option<&'static CommandDef> {
    CATALOGUE.iter().find(|d| d.code == code)
}

/// Looks up the per-zone variant of a code, e.g. (`"Z2"`, `"MV"`) →
/// the `Z2MV` definition.
pub fn find_zone_code(zone_prefix: &str, suffix: &str) -> Option<&'static CommandDef> {
    CATALOGUE
        .iter()
        .find(|d| d.code.len() == zone_prefix.len() + suffix.len()
            && d.code.starts_with(zone_prefix)
            && d.code.ends_with(suffix))
}

/// Resolves an inbound line to the longest matching mnemonic.
pub fn match_line(line: &str) -> Option<&'static CommandDef> {
    CATALOGUE
        .iter()
        .filter(|d| line.starts_with(d.code))
        .max_by_key(|d| d.code.len())
}

/// Distinct query forms, preserving table order. Refresh emits each
/// exactly once.
pub fn query_forms() -> Vec<&'static str> {
    let mut seen: Vec<&'static str> = Vec::new();
    for d in CATALOGUE {
        if !seen.contains(&d.query_form) {
            seen.push(d.query_form);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        for (i, a) in CATALOGUE.iter().enumerate() {
            for b in &CATALOGUE[i + 1..] {
                assert_ne!(a.code, b.code, "duplicate catalogue code");
            }
        }
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(match_line("Z2MV45").unwrap().code, "Z2MV");
        assert_eq!(match_line("Z2ON").unwrap().code, "Z2");
        assert_eq!(match_line("Z2PSBAS 52").unwrap().code, "Z2PSBAS");
        assert_eq!(match_line("PSDYNVOL MED").unwrap().code, "PSDYNVOL");
        assert_eq!(match_line("MVMAX 85").unwrap().code, "MV");
    }

    #[test]
    fn unknown_lines_do_not_match() {
        assert!(match_line("XYZZY").is_none());
    }

    #[test]
    fn query_forms_are_deduplicated() {
        let forms = query_forms();
        assert_eq!(forms.iter().filter(|f| **f == "DA ?").count(), 1);
        assert_eq!(forms.iter().filter(|f| **f == "RR ?").count(), 1);
        // Every catalogue entry is covered by exactly one emitted form.
        for d in CATALOGUE {
            assert!(forms.contains(&d.query_form));
        }
    }

    #[test]
    fn space_before_question_mark_is_preserved() {
        assert_eq!(find("SSSOD").unwrap().query_form, "SSSOD ?");
        assert_eq!(find("PSTONE").unwrap().query_form, "PSTONE CTRL ?");
        assert_eq!(find("MV").unwrap().query_form, "MV?");
    }
}
