//! Wire-format codecs for individual register values: the handful of
//! `struct`-format strings the dictionary uses (`<B`, `!H`, `!L`, `!6B`,
//! `!40s`, `!16s`, the 2/3/4-word 16-bit groups) plus the scaling that
//! turns a raw register into a physical-unit `Value`.

use crate::register::Value;

/// One dictionary entry's wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmt {
    U8,
    I16,
    U16,
    I32,
    U32,
    /// Six raw bytes rendered as a colon-separated MAC address.
    Mac6,
    /// Fixed-width byte string, trimmed at the first NUL.
    Str(usize),
    /// Two consecutive big-endian u16 words treated as one logical value
    /// (high word first) — `FMT_2_16BIT_VAL` in the dictionary.
    Words2,
    /// Three consecutive u16 words — `FMT_3_16BIT_VAL`.
    Words3,
    /// Four consecutive u16 words — `FMT_4_16BIT_VAL`.
    Words4,
    /// Firmware version packed as 4 bytes, rendered `"{}.{}.{}.{}"`.
    Version4,
}

impl Fmt {
    pub fn byte_len(self) -> usize {
        match self {
            Fmt::U8 => 1,
            Fmt::I16 | Fmt::U16 => 2,
            Fmt::I32 | Fmt::U32 | Fmt::Words2 | Fmt::Version4 => 4,
            Fmt::Words3 => 6,
            Fmt::Words4 => 8,
            Fmt::Mac6 => 6,
            Fmt::Str(n) => n,
        }
    }
}

/// Scaling applied after raw extraction: `physical = raw / quotient *
/// ratio + offset`. A dictionary entry with `ratio = 1.0`, `quotient = 1.0`,
/// `offset = 0.0` is a byte-for-byte passthrough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub ratio: f64,
    pub quotient: f64,
    pub offset: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Scale {
            ratio: 1.0,
            quotient: 1.0,
            offset: 0.0,
        }
    }
}

impl Scale {
    fn apply(self, raw: f64) -> f64 {
        (raw / self.quotient) * self.ratio + self.offset
    }

    fn unapply(self, physical: f64) -> f64 {
        ((physical - self.offset) / self.ratio) * self.quotient
    }
}

/// Read one value out of `buf` at `offset` according to `fmt`, scaling
/// numeric results by `scale`. Returns `None` if `buf` is too short.
pub fn get_value(buf: &[u8], offset: usize, fmt: Fmt, scale: Scale) -> Option<Value> {
    let len = fmt.byte_len();
    let field = buf.get(offset..offset + len)?;
    Some(match fmt {
        Fmt::U8 => Value::Int(scale.apply(field[0] as f64) as i64),
        Fmt::I16 => Value::Int(scale.apply(i16::from_be_bytes([field[0], field[1]]) as f64) as i64),
        Fmt::U16 => Value::Int(scale.apply(u16::from_be_bytes([field[0], field[1]]) as f64) as i64),
        Fmt::I32 => Value::Int(
            scale.apply(i32::from_be_bytes([field[0], field[1], field[2], field[3]]) as f64) as i64,
        ),
        Fmt::U32 => Value::Int(
            scale.apply(u32::from_be_bytes([field[0], field[1], field[2], field[3]]) as f64) as i64,
        ),
        Fmt::Words2 => {
            let raw = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
            Value::Int(scale.apply(raw as f64) as i64)
        }
        Fmt::Words3 => {
            let raw = (u16::from_be_bytes([field[0], field[1]]) as u64) << 32
                | (u16::from_be_bytes([field[2], field[3]]) as u64) << 16
                | u16::from_be_bytes([field[4], field[5]]) as u64;
            Value::Int(scale.apply(raw as f64) as i64)
        }
        Fmt::Words4 => {
            let raw = (u16::from_be_bytes([field[0], field[1]]) as u64) << 48
                | (u16::from_be_bytes([field[2], field[3]]) as u64) << 32
                | (u16::from_be_bytes([field[4], field[5]]) as u64) << 16
                | u16::from_be_bytes([field[6], field[7]]) as u64;
            Value::Int(scale.apply(raw as f64) as i64)
        }
        Fmt::Mac6 => Value::Str(
            field
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        Fmt::Str(_) => {
            let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            Value::Str(String::from_utf8_lossy(&field[..end]).into_owned())
        }
        Fmt::Version4 => Value::Str(format!(
            "{}.{}.{}.{}",
            field[0], field[1], field[2], field[3]
        )),
    })
}

/// Inverse of [`get_value`], for the emulator/config-write direction
/// (`Infos::build`): encode `value` back into `len` raw bytes.
pub fn set_value(fmt: Fmt, scale: Scale, value: &Value) -> Option<Vec<u8>> {
    Some(match fmt {
        Fmt::U8 => vec![scale.unapply(value.as_float()?) as u8],
        Fmt::I16 => (scale.unapply(value.as_float()?) as i16).to_be_bytes().to_vec(),
        Fmt::U16 => (scale.unapply(value.as_float()?) as u16).to_be_bytes().to_vec(),
        Fmt::I32 => (scale.unapply(value.as_float()?) as i32).to_be_bytes().to_vec(),
        Fmt::U32 | Fmt::Words2 => (scale.unapply(value.as_float()?) as u32).to_be_bytes().to_vec(),
        Fmt::Words3 => {
            let raw = scale.unapply(value.as_float()?) as u64;
            vec![
                ((raw >> 32) & 0xff) as u8,
                ((raw >> 24) & 0xff) as u8,
                ((raw >> 16) & 0xff) as u8,
                ((raw >> 8) & 0xff) as u8,
                (raw & 0xff) as u8,
            ]
        }
        Fmt::Words4 => {
            let raw = scale.unapply(value.as_float()?) as u64;
            raw.to_be_bytes()[4..8].to_vec()
        }
        Fmt::Mac6 | Fmt::Str(_) | Fmt::Version4 => return None,
    })
}
