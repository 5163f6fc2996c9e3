//! The typed register/telemetry store (§3, §4.3). One `Infos` lives per
//! connection and accumulates decoded values across every data
//! indication received during the session, publishing only the registers
//! that actually changed (`new_data` dirty tracking) so MQTT doesn't
//! retransmit an unchanged reading on every poll.

use std::collections::{HashMap, HashSet};

use crate::dictionary::{CalcEntry, CalcFunc, Dictionary};
use crate::fmt::get_value;
use crate::register::{apply_update, Register, Topic, Value};

#[derive(Debug, Default)]
pub struct Infos {
    values: HashMap<Register, Value>,
    /// Registers that changed since the last `drain_dirty` call.
    dirty: HashSet<Register>,
    sensor_list: u16,
}

impl Infos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, register: Register) -> Option<&Value> {
        self.values.get(&register)
    }

    pub fn sensor_list(&self) -> u16 {
        self.sensor_list
    }

    /// Seed `sensor_list` from the bound inverter's config entry, before
    /// any frame has been decoded (§6 `sensor_list`, applied at auth).
    pub fn set_sensor_list(&mut self, sensor_list: u16) {
        self.sensor_list = sensor_list;
    }

    /// Decode a `0x4210`/`0x4110` data/device-indication payload using the
    /// dictionary selected by the device's `sensor_list`, evaluate every
    /// derived ("calc") register that depends on what was just decoded,
    /// and re-infer the equipment model name whenever a register in the
    /// inverter group actually changed.
    ///
    /// If the payload itself carries a `SensorList` field, the decoded
    /// value replaces `sensor_list` for the *next* call — mirroring the
    /// original re-reading `Register.SENSOR_LIST` back out of its store
    /// after processing a device indication, so the microinverter/battery
    /// dictionaries become reachable once the device reports which one
    /// applies, rather than being stuck on whatever `sensor_list` callers
    /// pass in up front.
    pub fn parse(&mut self, sensor_list: u16, payload: &[u8]) {
        self.sensor_list = sensor_list;
        let dict = Dictionary::select(sensor_list);
        let mut inverter_group_changed = false;
        for entry in dict.entries() {
            if let Some(value) = get_value(payload, entry.offset, entry.fmt, entry.scale) {
                if self.update_db(entry.register, value) && entry.register.topic() == Topic::Inverter
                {
                    inverter_group_changed = true;
                }
            }
        }
        self.calc(&dict.calc_entries());
        if inverter_group_changed {
            let model = self.build_model_name();
            self.update_db(Register::EquipmentModel, Value::Str(model));
        }
        if let Some(reported) = self.values.get(&Register::SensorList).and_then(Value::as_int) {
            self.sensor_list = reported as u16;
        }
    }

    /// Apply the shared Gen3/Gen3+ update rule: ordinary registers
    /// overwrite freely (invariant ii), monotonic ones (counters, lifetime
    /// generation totals) only move forward. Returns whether the stored
    /// value changed, and if so marks it dirty.
    pub fn update_db(&mut self, register: Register, value: Value) -> bool {
        let mut cell = self.values.remove(&register);
        let changed = apply_update(&mut cell, value, register.is_monotonic());
        if let Some(v) = cell {
            self.values.insert(register, v);
        }
        if changed {
            self.dirty.insert(register);
        }
        changed
    }

    /// Increment a proxy diagnostic counter by one (`Invalid_Msg_Format`,
    /// `Unknown_SNR`, and friends all move through here).
    pub fn incr_counter(&mut self, register: Register) {
        debug_assert_eq!(register.topic(), Topic::Proxy);
        let current = self.values.get(&register).and_then(Value::as_int).unwrap_or(0);
        self.update_db(register, Value::Int(current + 1));
    }

    fn calc(&mut self, entries: &[CalcEntry]) {
        for entry in entries {
            let result = match &entry.func {
                CalcFunc::ProdSum => self.prod_sum(&entry.params),
                CalcFunc::CmpValues { results } => self.cmp_values(&entry.params, *results),
            };
            if let Some(value) = result {
                self.update_db(entry.register, value);
            }
        }
    }

    /// `Sigma_i Pi_j params[i][j]`. Any missing factor aborts the whole
    /// computation (the register is simply left as-is, not zeroed).
    fn prod_sum(&self, groups: &[Vec<Register>]) -> Option<Value> {
        let mut total = 0.0f64;
        for group in groups {
            let mut product = 1.0f64;
            for &reg in group {
                product *= self.values.get(&reg)?.as_float()?;
            }
            total += product;
        }
        Some(Value::Float((total * 100.0).round() / 100.0))
    }

    /// Three-way compare of `params[0]`'s single register against
    /// `params[1]`'s single register.
    fn cmp_values(&self, groups: &[Vec<Register>], results: [i64; 3]) -> Option<Value> {
        let a = self.values.get(groups.first()?.first()?)?.as_float()?;
        let b = self.values.get(groups.get(1)?.first()?)?.as_float()?;
        Some(Value::Int(if a < b {
            results[0]
        } else if a > b {
            results[2]
        } else {
            results[1]
        }))
    }

    /// Registers that changed since the last call, grouped by topic, and
    /// clears the dirty set. Mirrors the original's `new_data[topic]`
    /// dictionary that `publish_outstanding_mqtt` drains each loop
    /// iteration, guaranteeing decode order == publish order (§5 ordering
    /// invariant).
    pub fn drain_dirty(&mut self) -> Vec<(Topic, Register, Value)> {
        let mut out: Vec<_> = self
            .dirty
            .drain()
            .filter_map(|reg| self.values.get(&reg).map(|v| (reg.topic(), reg, v.clone())))
            .collect();
        out.sort_by_key(|(_, reg, _)| format!("{reg:?}"));
        out
    }

    /// Infer the equipment model string from `MaxDesignedPower` and
    /// `RatedPower`, matching the original's lookup table exactly: a
    /// `max` of 2000 with a `rated` of 800 or 600 suffixes the rated
    /// value onto the model name rather than using it verbatim.
    pub fn build_model_name(&self) -> String {
        let max = self
            .values
            .get(&Register::MaxDesignedPower)
            .and_then(Value::as_int);
        let rated = self
            .values
            .get(&Register::RatedPower)
            .and_then(Value::as_int);
        match (max, rated) {
            (Some(2000), Some(r @ (800 | 600))) => format!("TSOL-MS2000({r})"),
            (Some(2000), _) => "TSOL-MS2000".to_owned(),
            (Some(m @ (1800 | 1600)), _) => format!("TSOL-MS{m}"),
            _ => "TSOL-MSxx00".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_register_overwrites_on_every_decode() {
        let mut infos = Infos::new();
        infos.update_db(Register::GridVoltage, Value::Int(230));
        infos.update_db(Register::GridVoltage, Value::Int(229));
        assert_eq!(infos.get(Register::GridVoltage), Some(&Value::Int(229)));
    }

    #[test]
    fn monotonic_register_rejects_a_smaller_value() {
        let mut infos = Infos::new();
        infos.update_db(Register::TotalGeneration, Value::Int(1000));
        let changed = infos.update_db(Register::TotalGeneration, Value::Int(999));
        assert!(!changed);
        assert_eq!(infos.get(Register::TotalGeneration), Some(&Value::Int(1000)));
    }

    #[test]
    fn monotonic_register_accepts_a_larger_value() {
        let mut infos = Infos::new();
        infos.update_db(Register::TotalGeneration, Value::Int(1000));
        let changed = infos.update_db(Register::TotalGeneration, Value::Int(1500));
        assert!(changed);
        assert_eq!(infos.get(Register::TotalGeneration), Some(&Value::Int(1500)));
    }

    #[test]
    fn counter_increments_from_zero() {
        let mut infos = Infos::new();
        infos.incr_counter(Register::UnknownSnr);
        infos.incr_counter(Register::UnknownSnr);
        assert_eq!(infos.get(Register::UnknownSnr), Some(&Value::Int(2)));
    }

    #[test]
    fn derived_battery_power_aborts_when_a_factor_is_missing() {
        let mut infos = Infos::new();
        infos.update_db(Register::BattVolt, Value::Float(48.0));
        // BattCur missing; calc must not set BattPwr at all.
        infos.calc(&crate::dictionary::battery_calc());
        assert_eq!(infos.get(Register::BattPwr), None);
    }

    #[test]
    fn derived_battery_power_is_the_product_once_both_factors_present() {
        let mut infos = Infos::new();
        infos.update_db(Register::BattVolt, Value::Float(48.0));
        infos.update_db(Register::BattCur, Value::Float(2.0));
        infos.calc(&crate::dictionary::battery_calc());
        assert_eq!(infos.get(Register::BattPwr), Some(&Value::Float(96.0)));
    }

    #[test]
    fn model_name_suffixes_rated_power_when_max_is_2000_and_rated_is_600_or_800() {
        let mut infos = Infos::new();
        infos.update_db(Register::MaxDesignedPower, Value::Int(2000));
        infos.update_db(Register::RatedPower, Value::Int(600));
        assert_eq!(infos.build_model_name(), "TSOL-MS2000(600)");
    }

    #[test]
    fn model_name_falls_back_to_the_max_designed_power_table() {
        let mut infos = Infos::new();
        infos.update_db(Register::MaxDesignedPower, Value::Int(1800));
        infos.update_db(Register::RatedPower, Value::Int(1800));
        assert_eq!(infos.build_model_name(), "TSOL-MS1800");
    }

    #[test]
    fn model_name_defaults_when_max_designed_power_is_unrecognized() {
        let mut infos = Infos::new();
        infos.update_db(Register::MaxDesignedPower, Value::Int(800));
        assert_eq!(infos.build_model_name(), "TSOL-MSxx00");
    }

    #[test]
    fn parse_wires_the_model_name_into_equipment_model_when_the_inverter_group_changes() {
        let mut infos = Infos::new();
        let mut payload = vec![0u8; 72];
        payload[50..52].copy_from_slice(&600u16.to_be_bytes());
        payload[70..72].copy_from_slice(&2000u16.to_be_bytes());
        infos.parse(0, &payload);
        assert_eq!(
            infos.get(Register::EquipmentModel),
            Some(&Value::Str("TSOL-MS2000(600)".to_owned()))
        );
    }

    #[test]
    fn parse_reads_back_a_decoded_sensor_list_for_the_next_call() {
        let mut infos = Infos::new();
        let mut payload = vec![0u8; 72];
        payload[68..70].copy_from_slice(&0x02b0u16.to_be_bytes());
        infos.parse(0, &payload);
        assert_eq!(infos.sensor_list(), 0x02b0);
    }

    #[test]
    fn drain_dirty_empties_after_reading() {
        let mut infos = Infos::new();
        infos.update_db(Register::GridVoltage, Value::Int(230));
        assert_eq!(infos.drain_dirty().len(), 1);
        assert!(infos.drain_dirty().is_empty());
    }
}
