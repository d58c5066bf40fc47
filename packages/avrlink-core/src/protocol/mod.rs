//! The receiver's line-oriented control vocabulary.
//!
//! - `types` - closed wire literal sets (zones, channels, modes)
//! - `value` - the heterogeneous status-cell value
//! - `catalogue` - the static mnemonic table and query forms
//! - `parser` - inbound dispatch and the cached device state

pub mod catalogue;
pub mod parser;
pub mod types;
pub mod value;

pub use catalogue::{CommandDef, ValueSet, CATALOGUE};
pub use parser::{DeviceState, Update};
pub use types::{
    AudioRestorer, BluetoothDimension, BluetoothOutputMode, Channel, DrcMode, DynamicVolume,
    EcoMode, InputSource, MicroCodeType, PictureMode, Power, StandbyTimer, SurroundMode, Zone,
};
pub use value::CellValue;
