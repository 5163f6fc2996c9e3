//! The Gen3+ ("Solarman V5") protocol engine: streaming frame parser,
//! control-code dispatch, the embedded Modbus-RTU client, the AT-command
//! ACL, and the typed register/telemetry store. No networking or async
//! runtime lives here — this crate only turns bytes into typed events and
//! typed commands into bytes; `services/proxy` drives the connection
//! state machine and I/O around it.

pub mod acl;
pub mod command;
pub mod control;
pub mod dictionary;
pub mod error;
pub mod fmt;
pub mod frame;
pub mod gen3_legacy;
pub mod infos;
pub mod modbus;
pub mod register;
pub mod sequence;

pub use control::Control;
pub use error::{ConfigError, InfosError, ModbusError};
pub use frame::{Frame, FrameEvent, FrameHeader, Framer, InvalidKind};
pub use infos::Infos;
pub use register::{Register, Topic, Value};
pub use sequence::Sequence;
