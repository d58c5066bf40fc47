//! Heterogeneous status-cell values.
//!
//! Each mnemonic caches exactly one [`CellValue`]; the variant is fixed by
//! the mnemonic's category. [`CellValue::to_host`] flattens the value to
//! JSON for the host boundary: enums become their wire literals, mappings
//! are re-keyed on literals.

use std::collections::BTreeMap;

use serde_json::{json, Value as Json};

use super::types::{
    AudioRestorer, BluetoothDimension, BluetoothOutputMode, Channel, DrcMode, DynamicVolume,
    EcoMode, InputSource, MicroCodeType, PictureMode, Power, StandbyTimer, SurroundMode,
};

/// The last parsed value of one mnemonic.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// ON/OFF controls (`MU`, `PSTONE`, `PSHEQ`, `PSDYNEQ`, `SSLOC`, ...).
    Switch(bool),
    /// Whole-number cells (`PSDEL`, `PSLFE`, `TPAN`, `DAQUA`, `SPPR`, ...).
    Integer(i64),
    /// Half-dB and other fractional cells (`MV`, `PSBAS`, sampling rate).
    Decimal(f64),
    /// Free-form strings (`DASTN`, `NSFRN`, `TMAN`, zone names, ...).
    Text(String),
    Power(Power),
    Source(InputSource),
    Surround(SurroundMode),
    Picture(PictureMode),
    Eco(EcoMode),
    Drc(DrcMode),
    DynamicVolume(DynamicVolume),
    Restorer(AudioRestorer),
    Standby(StandbyTimer),
    BluetoothOutput(BluetoothOutputMode),
    /// Channel → level in dB (`CV`, `SSLEV`).
    ChannelMap(BTreeMap<Channel, f64>),
    /// Sources the device reports as usable (`SSSOD ... USE`).
    SourceList(Vec<InputSource>),
    /// Source → display name (`SSFUN`).
    NameMap(BTreeMap<InputSource, String>),
    /// Tuner preset number → station name (`OPTPN`).
    PresetMap(BTreeMap<u8, String>),
    /// Firmware block → version string (`SSINFFRM`).
    MicrocodeMap(BTreeMap<MicroCodeType, String>),
    /// Combined Bluetooth transmitter state (`BTTX`).
    BluetoothMap(BTreeMap<BluetoothDimension, String>),
}

impl CellValue {
    /// Marshals the value for the host: enum members collapse to their
    /// wire literals, lists elementwise, mappings on key and value.
    pub fn to_host(&self) -> Json {
        match self {
            CellValue::Switch(b) => json!(b),
            CellValue::Integer(n) => json!(n),
            CellValue::Decimal(x) => json!(x),
            CellValue::Text(s) => json!(s),
            CellValue::Power(v) => json!(v.wire()),
            CellValue::Source(v) => json!(v.wire()),
            CellValue::Surround(v) => json!(v.wire()),
            CellValue::Picture(v) => json!(v.wire()),
            CellValue::Eco(v) => json!(v.wire()),
            CellValue::Drc(v) => json!(v.wire()),
            CellValue::DynamicVolume(v) => json!(v.wire()),
            CellValue::Restorer(v) => json!(v.wire()),
            CellValue::Standby(v) => json!(v.wire()),
            CellValue::BluetoothOutput(v) => json!(v.wire()),
            CellValue::ChannelMap(m) => {
                Json::Object(m.iter().map(|(c, l)| (c.wire().to_string(), json!(l))).collect())
            }
            CellValue::SourceList(l) => Json::Array(l.iter().map(|s| json!(s.wire())).collect()),
            CellValue::NameMap(m) => {
                Json::Object(m.iter().map(|(s, n)| (s.wire().to_string(), json!(n))).collect())
            }
            CellValue::PresetMap(m) => {
                Json::Object(m.iter().map(|(p, n)| (p.to_string(), json!(n))).collect())
            }
            CellValue::MicrocodeMap(m) => {
                Json::Object(m.iter().map(|(t, v)| (t.wire().to_string(), json!(v))).collect())
            }
            CellValue::BluetoothMap(m) => {
                Json::Object(m.iter().map(|(d, v)| (d.wire().to_string(), json!(v))).collect())
            }
        }
    }

    /// The decimal reading of numeric cells, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(n) => Some(*n as f64),
            CellValue::Decimal(x) => Some(*x),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_marshal_to_wire_literals() {
        assert_eq!(CellValue::Power(Power::Standby).to_host(), json!("STANDBY"));
        assert_eq!(
            CellValue::Source(InputSource::SetTopBox).to_host(),
            json!("SAT/CBL")
        );
    }

    #[test]
    fn channel_map_marshals_on_wire_codes() {
        let mut m = BTreeMap::new();
        m.insert(Channel::FrontLeft, 2.0);
        m.insert(Channel::Subwoofer2, -1.5);
        let host = CellValue::ChannelMap(m).to_host();
        assert_eq!(host["FL"], json!(2.0));
        assert_eq!(host["SW2"], json!(-1.5));
    }

    #[test]
    fn source_list_marshals_elementwise() {
        let host =
            CellValue::SourceList(vec![InputSource::Cd, InputSource::Bluetooth]).to_host();
        assert_eq!(host, json!(["CD", "BT"]));
    }
}
