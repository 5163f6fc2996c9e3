//! The Gen3+ register data dictionary: for each `(ftype, offset)` pair in
//! a `0x4210` data-indication payload, which [`Register`] it decodes to,
//! with what wire format and scale. Three tables exist, selected by the
//! device's `sensor_list` value (§4.3): the common base map, the
//! microinverter map (`sensor_list == 0x02b0`), and the battery map
//! (`sensor_list == 0x3026`). Derived ("calc") registers computed from
//! other registers, rather than decoded directly, live alongside each
//! table too.

use crate::fmt::{Fmt, Scale};
use crate::register::Register;

#[derive(Debug, Clone, Copy)]
pub struct DictEntry {
    pub register: Register,
    pub offset: usize,
    pub fmt: Fmt,
    pub scale: Scale,
}

const fn e(register: Register, offset: usize, fmt: Fmt) -> DictEntry {
    DictEntry {
        register,
        offset,
        fmt,
        scale: Scale {
            ratio: 1.0,
            quotient: 1.0,
            offset: 0.0,
        },
    }
}

const fn scaled(register: Register, offset: usize, fmt: Fmt, ratio: f64) -> DictEntry {
    DictEntry {
        register,
        offset,
        fmt,
        scale: Scale {
            ratio,
            quotient: 1.0,
            offset: 0.0,
        },
    }
}

/// One derived register's computation, ported from `RegisterFunc`.
#[derive(Debug, Clone, Copy)]
pub enum CalcFunc {
    /// `Sigma_i Pi_j params[i][j]` — the product of each inner group,
    /// summed across groups. Aborts to `None` (register left unset) if any
    /// factor is missing.
    ProdSum,
    /// Three-way comparison of `params[0]` against `params[1]`: yields
    /// `results[0]` if less, `results[1]` if equal, `results[2]` if
    /// greater. Missing operands abort to `None`.
    CmpValues { results: [i64; 3] },
}

#[derive(Debug, Clone)]
pub struct CalcEntry {
    pub register: Register,
    pub func: CalcFunc,
    /// Each inner `Vec` is a group of registers to multiply together
    /// (for `ProdSum`) or, for `CmpValues`, exactly two single-register
    /// groups to compare.
    pub params: Vec<Vec<Register>>,
}

pub fn base_map() -> Vec<DictEntry> {
    use Register::*;
    vec![
        e(InverterStatus, 0, Fmt::U16),
        e(DetectStatus1, 2, Fmt::U16),
        e(DetectStatus2, 4, Fmt::U16),
        scaled(InverterTemp, 6, Fmt::I16, 1.0),
        scaled(GridVoltage, 8, Fmt::U16, 0.1),
        scaled(GridCurrent, 10, Fmt::U16, 0.01),
        scaled(GridFrequency, 12, Fmt::U16, 0.01),
        scaled(OutputPower, 14, Fmt::U16, 0.1),
        scaled(DailyGeneration, 16, Fmt::U16, 0.01),
        scaled(TotalGeneration, 18, Fmt::U32, 0.01),
        e(EventAlarm, 22, Fmt::U16),
        e(EventFault, 24, Fmt::U16),
        scaled(Pv1Voltage, 26, Fmt::U16, 0.1),
        scaled(Pv1Current, 28, Fmt::U16, 0.01),
        scaled(Pv1Power, 30, Fmt::U16, 0.1),
        scaled(Pv2Voltage, 32, Fmt::U16, 0.1),
        scaled(Pv2Current, 34, Fmt::U16, 0.01),
        scaled(Pv2Power, 36, Fmt::U16, 0.1),
        scaled(Pv3Voltage, 38, Fmt::U16, 0.1),
        scaled(Pv3Current, 40, Fmt::U16, 0.01),
        scaled(Pv3Power, 42, Fmt::U16, 0.1),
        scaled(Pv4Voltage, 44, Fmt::U16, 0.1),
        scaled(Pv4Current, 46, Fmt::U16, 0.01),
        scaled(Pv4Power, 48, Fmt::U16, 0.1),
        e(RatedPower, 50, Fmt::U16),
        e(SignalStrength, 52, Fmt::U8),
        e(MacAddr, 53, Fmt::Mac6),
        e(SensorList, 68, Fmt::U16),
        e(MaxDesignedPower, 70, Fmt::U16),
    ]
}

pub fn microinverter_map() -> Vec<DictEntry> {
    let mut m = base_map();
    m.push(e(Register::NoInputs, 59, Fmt::U8));
    m.push(scaled(Register::Pv1DailyGeneration, 60, Fmt::U16, 0.01));
    m.push(scaled(Register::Pv2DailyGeneration, 62, Fmt::U16, 0.01));
    m.push(scaled(Register::Pv3DailyGeneration, 64, Fmt::U16, 0.01));
    m.push(scaled(Register::Pv4DailyGeneration, 66, Fmt::U16, 0.01));
    m
}

pub fn battery_map() -> Vec<DictEntry> {
    use Register::*;
    vec![
        scaled(BattPv1Volt, 0, Fmt::U16, 0.1),
        scaled(BattPv1Cur, 2, Fmt::U16, 0.01),
        scaled(BattPv2Volt, 4, Fmt::U16, 0.1),
        scaled(BattPv2Cur, 6, Fmt::U16, 0.01),
        scaled(BattTotalCharg, 8, Fmt::U32, 0.01),
        e(BattPv1Status, 12, Fmt::U8),
        e(BattPv2Status, 13, Fmt::U8),
        scaled(BattVolt, 14, Fmt::U16, 0.1),
        scaled(BattCur, 16, Fmt::I16, 0.01),
        e(BattSoc, 18, Fmt::U8),
        scaled(BattCell1Volt, 19, Fmt::U16, 0.001),
        scaled(BattCell2Volt, 21, Fmt::U16, 0.001),
        scaled(BattCell3Volt, 23, Fmt::U16, 0.001),
        scaled(BattCell4Volt, 25, Fmt::U16, 0.001),
        e(BattTemp1, 27, Fmt::I16),
        scaled(BattOutVolt, 29, Fmt::U16, 0.1),
        scaled(BattOutCur, 31, Fmt::I16, 0.01),
        e(BattOutStatus, 33, Fmt::U8),
        e(BattAlarm, 34, Fmt::U16),
        e(BattHwVers, 36, Fmt::Version4),
        e(BattSwVers, 40, Fmt::Version4),
    ]
}

/// The five derived battery registers (`map_3026['calc']` in the original).
pub fn battery_calc() -> Vec<CalcEntry> {
    use Register::*;
    vec![
        CalcEntry {
            register: BattPvPwr,
            func: CalcFunc::ProdSum,
            params: vec![vec![BattPv1Volt, BattPv1Cur], vec![BattPv2Volt, BattPv2Cur]],
        },
        CalcEntry {
            register: BattPwr,
            func: CalcFunc::ProdSum,
            params: vec![vec![BattVolt, BattCur]],
        },
        CalcEntry {
            register: BattOutPwr,
            func: CalcFunc::ProdSum,
            params: vec![vec![BattOutVolt, BattOutCur]],
        },
        CalcEntry {
            register: BattPwrSuplState,
            func: CalcFunc::CmpValues { results: [0, 1, 2] },
            params: vec![vec![BattOutPwr], vec![BattPwr]],
        },
        CalcEntry {
            register: BattStatus,
            func: CalcFunc::CmpValues { results: [0, 1, 2] },
            params: vec![vec![BattSoc], vec![BattSoc]],
        },
    ]
}

/// Which dictionary applies for a given `sensor_list` value (`RegisterSel`).
pub enum Dictionary {
    Base,
    Microinverter,
    Battery,
}

impl Dictionary {
    pub fn select(sensor_list: u16) -> Dictionary {
        match sensor_list {
            0x02b0 => Dictionary::Microinverter,
            0x3026 => Dictionary::Battery,
            _ => Dictionary::Base,
        }
    }

    pub fn entries(&self) -> Vec<DictEntry> {
        match self {
            Dictionary::Base => base_map(),
            Dictionary::Microinverter => microinverter_map(),
            Dictionary::Battery => battery_map(),
        }
    }

    pub fn calc_entries(&self) -> Vec<CalcEntry> {
        match self {
            Dictionary::Battery => battery_calc(),
            _ => Vec::new(),
        }
    }
}
