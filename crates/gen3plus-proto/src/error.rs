use thiserror::Error;

/// Errors raised while decoding a Modbus RTU PDU embedded in a command
/// response envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModbusError {
    #[error("modbus frame too short: need at least {need} bytes, got {got}")]
    Short { need: usize, got: usize },

    #[error("modbus CRC mismatch: computed {computed:#06x}, frame said {frame:#06x}")]
    BadCrc { computed: u16, frame: u16 },

    #[error("modbus exception response: function {function:#04x}, code {code:#04x}")]
    Exception { function: u8, code: u8 },

    #[error("modbus response does not match the outstanding request")]
    Stale,

    #[error("no modbus request is outstanding")]
    Unsolicited,

    #[error("unsupported modbus function code {0:#04x}")]
    UnsupportedFunction(u8),
}

/// Errors surfaced while decoding register payloads (§4.3).
#[derive(Debug, Error, PartialEq)]
pub enum InfosError {
    #[error("no dictionary entry for msg_type={msg_type:#x} ftype={ftype:#x} addr={addr:#x}")]
    UnknownRegister { msg_type: u8, ftype: u8, addr: u16 },

    #[error("unsupported element data type {0:#04x}")]
    InvalidDataType(u8),

    #[error("payload truncated: need {need} more byte(s) at offset {offset}")]
    Truncated { offset: usize, need: usize },
}

/// Config loading/validation errors, in the same shape as the teacher's
/// hand-rolled `ConfigError`, ported to `thiserror`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
