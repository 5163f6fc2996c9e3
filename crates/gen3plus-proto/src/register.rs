//! The semantic register set shared by the Gen3+ (Solarman V5) and legacy
//! Gen3 data dictionaries, plus the proxy's own diagnostic counters.
//!
//! Mirrors the flat `Register` namespace the original Python `Infos`
//! subclasses (`InfosG3P`, `InfosG3`) share — one enum, multiple wire
//! encodings mapping into it.

use std::fmt;

/// A decoded register value. Strings are never silently coerced to numbers
/// and vice versa — see `Infos` invariant (ii).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Str(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Same variant as `other` (used to enforce invariant (ii): a value is
    /// only replaced by a newer value of the same semantic type).
    fn same_kind(&self, other: &Value) -> bool {
        matches!(
            (self, other),
            (Value::Int(_), Value::Int(_))
                | (Value::Float(_), Value::Float(_))
                | (Value::Str(_), Value::Str(_))
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Replace `*slot` with `new` per invariant (ii) and the monotonic-counter
/// rule: counters (`Register::is_monotonic`) only move forward. Returns
/// whether the stored value actually changed.
pub fn apply_update(slot: &mut Option<Value>, new: Value, monotonic: bool) -> bool {
    match slot {
        Some(old) if !old.same_kind(&new) => false,
        Some(old) if monotonic => {
            let changed = match (&*old, &new) {
                (Value::Int(o), Value::Int(n)) => n > o,
                (Value::Float(o), Value::Float(n)) => n > o,
                _ => new != *old,
            };
            if changed {
                *slot = Some(new);
            }
            changed
        }
        Some(old) => {
            let changed = *old != new;
            if changed {
                *slot = Some(new);
            }
            changed
        }
        None => {
            *slot = Some(new);
            true
        }
    }
}

/// The topic group a register is published under (`Infos`' nested
/// dictionary keyed by group, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Inverter,
    Grid,
    Env,
    Controller,
    Input(u8),
    Battery,
    Proxy,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Inverter => write!(f, "inverter"),
            Topic::Grid => write!(f, "grid"),
            Topic::Env => write!(f, "env"),
            Topic::Controller => write!(f, "controller"),
            Topic::Input(n) => write!(f, "input/pv{n}"),
            Topic::Battery => write!(f, "battery"),
            Topic::Proxy => write!(f, "proxy"),
        }
    }
}

macro_rules! registers {
    ($($variant:ident),+ $(,)?) => {
        /// Semantic register name. One flat namespace shared by every wire
        /// encoding (Gen3+ data/config blocks, Gen3 element records, and the
        /// proxy's own counters).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum Register {
            $($variant),+
        }
    };
}

registers! {
    // --- identity / ambient device info (shared base map + legacy map) ---
    Manufacturer, EquipmentModel, ChipType, ChipModel, ProductName,
    CollectorFwVersion, TraceUrl, LoggerUrl, Version, SerialNumber,
    MacAddr, IpAddress, Ssid, NoInputs, SensorList,
    DataUpInterval, CollectInterval, HeartbeatInterval, SignalStrength,
    PowerOnTime, CommunicationType, PollingInterval,

    // --- inverter / grid telemetry ---
    InverterStatus, DetectStatus1, DetectStatus2, EventAlarm, EventFault,
    EventBf1, EventBf2, InverterTemp, RatedPower, OutputPower,
    MaxDesignedPower, RatedLevel, InputCoefficient, OutputCoefficient,
    GridVoltCalCoef, ProdComplType, BootStatus, DspStatus, WorkMode,
    OutputShutdown, InvUnknown1,
    GridVoltage, GridCurrent, GridFrequency,
    DailyGeneration, TotalGeneration,

    // --- per-string PV telemetry ---
    Pv1Voltage, Pv1Current, Pv1Power, Pv1DailyGeneration, Pv1TotalGeneration,
    Pv2Voltage, Pv2Current, Pv2Power, Pv2DailyGeneration, Pv2TotalGeneration,
    Pv3Voltage, Pv3Current, Pv3Power, Pv3DailyGeneration, Pv3TotalGeneration,
    Pv4Voltage, Pv4Current, Pv4Power, Pv4DailyGeneration, Pv4TotalGeneration,

    // --- battery variant (sensor_list 0x3026) ---
    BattPv1Volt, BattPv1Cur, BattPv2Volt, BattPv2Cur, BattTotalCharg,
    BattPv1Status, BattPv2Status, BattVolt, BattCur, BattSoc,
    BattCell1Volt, BattCell2Volt, BattCell3Volt, BattCell4Volt,
    BattCell5Volt, BattCell6Volt, BattCell7Volt, BattCell8Volt,
    BattCell9Volt, BattCell10Volt, BattCell11Volt, BattCell12Volt,
    BattCell13Volt, BattCell14Volt, BattCell15Volt, BattCell16Volt,
    BattTemp1, BattTemp2, BattTemp3, BattTemp4,
    BattOutVolt, BattOutCur, BattOutStatus, BattAlarm, BattHwVers, BattSwVers,
    BattPvPwr, BattPwr, BattOutPwr, BattPwrSuplState, BattStatus,

    // --- legacy Gen3 only ---
    ConnectCount,
    Event401, Event402, Event403, Event404, Event405, Event406, Event407,
    Event408, Event409, Event410, Event411, Event412, Event413, Event414,
    Event415, Event416,
    TestReg1, TestReg2,

    // --- proxy diagnostic counters (topic group "proxy") ---
    InverterCnt, UnknownSnr, UnknownMsg, InvalidDataType, InternalError,
    UnknownCtrl, OtaStartMsg, SwException, InvalidMsgFormat, AtCommand,
    AtCommandBlocked, ModbusCommand,
}

impl Register {
    /// The topic group this register publishes under.
    pub fn topic(self) -> Topic {
        use Register::*;
        match self {
            GridVoltage | GridCurrent | GridFrequency | DailyGeneration
            | TotalGeneration => Topic::Grid,

            Pv1Voltage | Pv1Current | Pv1Power | Pv1DailyGeneration
            | Pv1TotalGeneration => Topic::Input(1),
            Pv2Voltage | Pv2Current | Pv2Power | Pv2DailyGeneration
            | Pv2TotalGeneration => Topic::Input(2),
            Pv3Voltage | Pv3Current | Pv3Power | Pv3DailyGeneration
            | Pv3TotalGeneration => Topic::Input(3),
            Pv4Voltage | Pv4Current | Pv4Power | Pv4DailyGeneration
            | Pv4TotalGeneration => Topic::Input(4),

            BattPv1Volt | BattPv1Cur | BattPv2Volt | BattPv2Cur
            | BattTotalCharg | BattPv1Status | BattPv2Status | BattVolt
            | BattCur | BattSoc | BattCell1Volt | BattCell2Volt
            | BattCell3Volt | BattCell4Volt | BattCell5Volt | BattCell6Volt
            | BattCell7Volt | BattCell8Volt | BattCell9Volt | BattCell10Volt
            | BattCell11Volt | BattCell12Volt | BattCell13Volt
            | BattCell14Volt | BattCell15Volt | BattCell16Volt | BattTemp1
            | BattTemp2 | BattTemp3 | BattTemp4 | BattOutVolt | BattOutCur
            | BattOutStatus | BattAlarm | BattHwVers | BattSwVers
            | BattPvPwr | BattPwr | BattOutPwr | BattPwrSuplState
            | BattStatus => Topic::Battery,

            DataUpInterval | CollectInterval | SignalStrength | PowerOnTime
            | CommunicationType | PollingInterval | ChipModel | MacAddr
            | IpAddress | Ssid | CollectorFwVersion | TraceUrl | LoggerUrl
            | ConnectCount => Topic::Controller,

            InverterCnt | UnknownSnr | UnknownMsg | InvalidDataType
            | InternalError | UnknownCtrl | OtaStartMsg | SwException
            | InvalidMsgFormat | AtCommand | AtCommandBlocked
            | ModbusCommand => Topic::Proxy,

            _ => Topic::Inverter,
        }
    }

    /// Counters and lifetime generation totals only move forward — a
    /// stale/out-of-order decode must never roll them back.
    pub fn is_monotonic(self) -> bool {
        use Register::*;
        matches!(
            self,
            TotalGeneration
                | Pv1TotalGeneration
                | Pv2TotalGeneration
                | Pv3TotalGeneration
                | Pv4TotalGeneration
                | BattTotalCharg
                | ConnectCount
                | InverterCnt
                | UnknownSnr
                | UnknownMsg
                | InvalidDataType
                | InternalError
                | UnknownCtrl
                | OtaStartMsg
                | SwException
                | InvalidMsgFormat
                | AtCommand
                | AtCommandBlocked
                | ModbusCommand
        )
    }
}
