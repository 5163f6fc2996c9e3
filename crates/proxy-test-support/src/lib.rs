//! Frame and scenario builders for integration tests: hex-level fixtures
//! for the scenarios named in the testable-properties section of the
//! design — device indications, acks, invalid-start resync, an embedded
//! Modbus write, and a device report that should infer a specific model
//! name. Kept as a separate crate (not `#[cfg(test)]` inside
//! `gen3plus-proto`) so `services/proxy`'s integration tests can reuse the
//! same fixtures.

use gen3plus_proto::frame::{Framer, FrameHeader};

pub const TEST_SERIAL_NO: u32 = 0x1234_5678;

/// A `0x4110` device-indication frame with an arbitrary payload.
pub fn device_ind(sequence: u16, payload: &[u8]) -> Vec<u8> {
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4110,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        payload,
    )
}

/// A `0x4210` data-indication frame carrying a base-map telemetry payload
/// long enough to decode grid voltage/current/frequency and output power.
pub fn data_ind(sequence: u16, grid_voltage_decivolts: u16, output_power_deciwatts: u16) -> Vec<u8> {
    let mut payload = vec![0u8; 64];
    payload[8..10].copy_from_slice(&grid_voltage_decivolts.to_be_bytes());
    payload[14..16].copy_from_slice(&output_power_deciwatts.to_be_bytes());
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4210,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        &payload,
    )
}

/// A frame whose start byte is corrupted, followed immediately by a valid
/// heartbeat frame — used to exercise the "bad start clears the whole
/// buffer" resync rule.
pub fn invalid_start_then_heartbeat(sequence: u16) -> Vec<u8> {
    let mut bad = device_ind(sequence, &[0, 0]);
    bad[0] = 0x00;
    let good = heartbeat_ind(sequence.wrapping_add(1));
    let mut out = bad;
    out.extend_from_slice(&good);
    out
}

/// A `0x4710` heartbeat-indication frame.
pub fn heartbeat_ind(sequence: u16) -> Vec<u8> {
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4710,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        &[],
    )
}

/// A `0x4510` command-request frame wrapping a Modbus `WRITE_SINGLE_REG`
/// PDU, as the proxy would send it out to poll/configure the inverter.
pub fn modbus_write_single_reg_cmd(sequence: u16, register: u16, value: u16) -> Vec<u8> {
    let (pdu, _) = gen3plus_proto::modbus::build_write_request(1, register, value);
    let payload = gen3plus_proto::command::build_modbus_command_payload(0x02b0, &pdu);
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4510,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        &payload,
    )
}

/// A `0x4510` command-request frame wrapping an AT command, as the cloud
/// would send it to be relayed on to the logger.
pub fn at_command_req(sequence: u16, cmd: &str) -> Vec<u8> {
    let payload = gen3plus_proto::command::build_at_command_payload(cmd);
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4510,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        &payload,
    )
}

/// A data-indication payload with `max_designed_power`/`rated_power`
/// placed at the base map's offsets 70/50, for exercising model-name
/// inference end to end (`Infos::build_model_name` wired through
/// `Infos::parse`).
pub fn inverter_ind_with_model_params(
    sequence: u16,
    max_designed_power: u16,
    rated_power: u16,
) -> Vec<u8> {
    let mut payload = vec![0u8; 72];
    payload[50..52].copy_from_slice(&rated_power.to_be_bytes());
    payload[70..72].copy_from_slice(&max_designed_power.to_be_bytes());
    Framer::encode(
        &FrameHeader {
            data_len: 0,
            control: 0x4210,
            sequence,
            serial_no: TEST_SERIAL_NO,
        },
        &payload,
    )
}
