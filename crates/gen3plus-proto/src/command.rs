//! Builders for the `0x4510` command-request payload, which carries either
//! an AT command or an embedded Modbus-RTU PDU (§4.4).
//!
//! Both variants share the same `<BHLLL>` header shape as the original's
//! `struct.pack`: a 1-byte `ftype`, a 2-byte field, and three 4-byte
//! reserved fields — 15 bytes total before the command-specific tail. The
//! Modbus variant's 2-byte field is the `sensor_list`; the AT variant's is
//! a fixed `0x0002` constant.

pub const FTYPE_AT_CMD: u8 = 1;
pub const FTYPE_MB_RTU_CMD: u8 = 2;

/// Byte offset of the PDU/command tail within an *outgoing* `0x4510`
/// payload: `ftype(1) + field(2) + reserved(4+4+4) = 15`.
pub const REQUEST_HEADER_LEN: usize = 15;

/// Byte offset of the PDU/text tail within an *incoming* `0x1510`
/// (command response) payload: `ftype(1) + valid(1) + reserved(12) = 14`.
pub const RESPONSE_HEADER_LEN: usize = 14;

/// `ftype(1) | sensor_list(2 LE) | 0(4) | 0(4) | 0(4) | PDU`
pub fn build_modbus_command_payload(sensor_list: u16, pdu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + pdu.len());
    out.push(FTYPE_MB_RTU_CMD);
    out.extend_from_slice(&sensor_list.to_le_bytes());
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(pdu);
    out
}

/// `ftype(1) | const=0x0002(2 LE) | 0(4) | 0(4) | 0(4) | cmd bytes | '\r'`
pub fn build_at_command_payload(cmd: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + cmd.len() + 1);
    out.push(FTYPE_AT_CMD);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(cmd.as_bytes());
    out.push(b'\r');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modbus_envelope_carries_sensor_list_and_pdu() {
        let pdu = vec![1, 3, 0x30, 0x00, 0x00, 0x30];
        let payload = build_modbus_command_payload(0x02b0, &pdu);
        assert_eq!(payload[0], FTYPE_MB_RTU_CMD);
        assert_eq!(payload.len(), REQUEST_HEADER_LEN + pdu.len());
        assert_eq!(&payload[REQUEST_HEADER_LEN..], pdu.as_slice());
    }

    #[test]
    fn at_command_envelope_terminates_with_cr() {
        let payload = build_at_command_payload("AT+Z");
        assert_eq!(payload[0], FTYPE_AT_CMD);
        assert_eq!(payload.last(), Some(&b'\r'));
        assert_eq!(
            &payload[REQUEST_HEADER_LEN..REQUEST_HEADER_LEN + 4],
            b"AT+Z"
        );
    }
}
