//! Legacy Gen3 (non-V5) element-coded telemetry records. Framing for this
//! protocol is out of scope (§1 Non-goals), but the register map and the
//! parse algorithm that decodes a record's *elements* into the shared
//! `Infos` store are carried over, since the original keeps one `Infos`
//! base class for both protocols.
//!
//! Record shape: a big-endian element count (`i32`), followed by that many
//! elements, each `addr: i32, data_type: u8, <value>` where `value`'s
//! width and decoding depends on `data_type`.

use crate::error::InfosError;
use crate::infos::Infos;
use crate::register::{Register, Value};

const T_PASCAL_STRING: u8 = 0x54; // 'T'
const T_I8: u8 = 0x42; // 'B'
const T_I32: u8 = 0x49; // 'I'
const T_I16: u8 = 0x53; // 'S'
const T_F32: u8 = 0x46; // 'F'
const T_I64: u8 = 0x4c; // 'L'
const T_NUL: u8 = 0x00;
const T_NOP: u8 = 0x41; // 'A'

/// Maps a legacy element address to the register it decodes into. Only the
/// addresses retrieved from the original dictionary are listed; an
/// unrecognized address is decoded (so framing stays in sync) but simply
/// not stored.
fn register_for_addr(addr: i32) -> Option<Register> {
    use Register::*;
    Some(match addr {
        0x0000 => ConnectCount,
        0x0001 => InverterStatus,
        0x0002 => GridVoltage,
        0x0003 => GridCurrent,
        0x0004 => GridFrequency,
        0x0005 => InverterTemp,
        0x0006 => OutputPower,
        0x0007 => DailyGeneration,
        0x0008 => TotalGeneration,
        0x0401 => Event401,
        0x0402 => Event402,
        0x0403 => Event403,
        0x0404 => Event404,
        0x0405 => Event405,
        0x0406 => Event406,
        0x0407 => Event407,
        0x0408 => Event408,
        0x0409 => Event409,
        0x040a => Event410,
        0x040b => Event411,
        0x040c => Event412,
        0x040d => Event413,
        0x040e => Event414,
        0x040f => Event415,
        0x0410 => Event416,
        0x0f00 => TestReg1,
        0x0f01 => TestReg2,
        _ => return None,
    })
}

/// Decode one element-coded record into `infos`, stopping and returning
/// `Err` on the first unsupported `data_type` (the elements already
/// consumed up to that point are kept, matching the original: a partial
/// record is still progress, not rolled back).
pub fn parse(infos: &mut Infos, buf: &[u8]) -> Result<(), InfosError> {
    if buf.len() < 4 {
        return Err(InfosError::Truncated {
            offset: 0,
            need: 4 - buf.len(),
        });
    }
    let count = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let mut ind = 4usize;

    for _ in 0..count {
        if buf.len() < ind + 5 {
            return Err(InfosError::Truncated {
                offset: ind,
                need: ind + 5 - buf.len(),
            });
        }
        let addr = i32::from_be_bytes([buf[ind], buf[ind + 1], buf[ind + 2], buf[ind + 3]]);
        let data_type = buf[ind + 4];
        ind += 5;

        let register = register_for_addr(addr);

        match data_type {
            T_NUL => break,
            T_NOP => {}
            T_I8 => {
                require(buf, ind, 1)?;
                if let Some(r) = register {
                    infos.update_db(r, Value::Int(buf[ind] as i8 as i64));
                }
                ind += 1;
            }
            T_I16 => {
                require(buf, ind, 2)?;
                let v = i16::from_be_bytes([buf[ind], buf[ind + 1]]);
                if let Some(r) = register {
                    infos.update_db(r, Value::Int(v as i64));
                }
                ind += 2;
            }
            T_I32 => {
                require(buf, ind, 4)?;
                let v = i32::from_be_bytes([buf[ind], buf[ind + 1], buf[ind + 2], buf[ind + 3]]);
                if let Some(r) = register {
                    infos.update_db(r, Value::Int(v as i64));
                }
                ind += 4;
            }
            T_I64 => {
                require(buf, ind, 8)?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&buf[ind..ind + 8]);
                let v = i64::from_be_bytes(bytes);
                if let Some(r) = register {
                    infos.update_db(r, Value::Int(v));
                }
                ind += 8;
            }
            T_F32 => {
                require(buf, ind, 4)?;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&buf[ind..ind + 4]);
                let v = f32::from_be_bytes(bytes) as f64;
                let rounded = (v * 100.0).round() / 100.0;
                if let Some(r) = register {
                    infos.update_db(r, Value::Float(rounded));
                }
                ind += 4;
            }
            T_PASCAL_STRING => {
                require(buf, ind, 1)?;
                let len = buf[ind] as usize;
                ind += 1;
                require(buf, ind, len)?;
                if let Some(r) = register {
                    let s = String::from_utf8_lossy(&buf[ind..ind + len]).into_owned();
                    infos.update_db(r, Value::Str(s));
                }
                ind += len;
            }
            other => {
                infos.incr_counter(Register::InvalidDataType);
                return Err(InfosError::InvalidDataType(other));
            }
        }
    }
    Ok(())
}

fn require(buf: &[u8], ind: usize, need: usize) -> Result<(), InfosError> {
    if buf.len() < ind + need {
        Err(InfosError::Truncated {
            offset: ind,
            need: ind + need - buf.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(elements: &[(i32, u8, Vec<u8>)]) -> Vec<u8> {
        let mut buf = (elements.len() as i32).to_be_bytes().to_vec();
        for (addr, dtype, value) in elements {
            buf.extend_from_slice(&addr.to_be_bytes());
            buf.push(*dtype);
            buf.extend_from_slice(value);
        }
        buf
    }

    #[test]
    fn decodes_a_mixed_type_record() {
        let buf = record_with(&[
            (0x0002, T_I16, 2300u16.to_be_bytes().to_vec()),
            (0x0008, T_I32, 123_456i32.to_be_bytes().to_vec()),
        ]);
        let mut infos = Infos::new();
        parse(&mut infos, &buf).unwrap();
        assert_eq!(infos.get(Register::GridVoltage), Some(&Value::Int(2300)));
        assert_eq!(infos.get(Register::TotalGeneration), Some(&Value::Int(123_456)));
    }

    #[test]
    fn unsupported_type_aborts_remaining_elements_but_keeps_prior_ones() {
        let mut buf = record_with(&[(0x0002, T_I16, 2300u16.to_be_bytes().to_vec())]);
        // overwrite count to 2 and append a bogus element with an unknown type byte
        buf[3] = 2;
        buf.extend_from_slice(&0x0003i32.to_be_bytes());
        buf.push(0xff);
        let mut infos = Infos::new();
        let err = parse(&mut infos, &buf).unwrap_err();
        assert!(matches!(err, InfosError::InvalidDataType(0xff)));
        assert_eq!(infos.get(Register::GridVoltage), Some(&Value::Int(2300)));
        assert_eq!(infos.get(Register::InvalidDataType), Some(&Value::Int(1)));
    }

    #[test]
    fn nul_terminator_stops_the_record_early() {
        let buf = record_with(&[(0x0000, T_NUL, vec![])]);
        let mut infos = Infos::new();
        parse(&mut infos, &buf).unwrap();
    }
}
