//! Avrlink Core - supervised control sessions for Denon/Marantz AVRs.
//!
//! This crate keeps long-running, line-oriented control connections to
//! audio/video receivers over TCP port 23. Per registered device it runs
//! a session that tracks the receiver's observable state across feature
//! codes, zones and channels, accepts imperative commands, and emits
//! change notifications towards a host integration.
//!
//! # Architecture
//!
//! - [`protocol`]: the mnemonic catalogue, wire vocabularies, and the
//!   line parser with its cached device state
//! - [`transport`]: carriage-return framed reader/writer over TCP
//! - [`session`]: one live connection - reader, paced writer, prober
//! - [`supervisor`]: registry by serial, reconnect loops, action dispatch
//! - [`events`]: change frames and the sink abstraction towards the host
//! - [`error`]: centralized error types
//!
//! The host boundary (local command socket, HTTP callback) lives in the
//! daemon binary; the core only pushes [`ChangeFrame`]s into a
//! [`ChangeSink`].

#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod transport;

// Re-export commonly used types at the crate root
pub use error::{AvrError, AvrResult};
pub use events::{
    ChangeFrame, ChangeSink, ChannelChangeSink, DeviceEvent, LoggingChangeSink, NoopChangeSink,
};
pub use protocol::{
    CellValue, Channel, CommandDef, DeviceState, InputSource, Power, SurroundMode, Zone, CATALOGUE,
};
pub use session::{AvrSession, SessionConfig, SessionObserver};
pub use supervisor::{zone_from_host, RegisterInfo, Supervisor, SupervisorConfig};
