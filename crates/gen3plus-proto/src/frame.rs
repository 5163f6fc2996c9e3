//! Streaming frame parser for the Gen3+ ("Solarman V5") wire format.
//!
//! Wire layout (little-endian):
//! ```text
//! byte 0       start byte, always 0xA5
//! byte 1..3    data_len (u16)
//! byte 3..5    control (u16)
//! byte 5..7    sequence (u16)
//! byte 7..11   serial_no (u32)
//! byte 11..11+data_len   payload
//! byte 11+data_len       checksum (u8)
//! byte 12+data_len       stop byte, always 0x15
//! ```
//!
//! The parser is fed bytes as they arrive (`BytesMut::extend_from_slice`)
//! and pulled via [`Framer::next_frame`], which applies the resync rules
//! for malformed frames instead of bubbling a hard error: a bad start byte
//! discards everything buffered so far, a bad stop byte discards the
//! buffer only when the byte that follows the frame isn't itself a start
//! byte, and a bad checksum discards only the one offending frame. This
//! asymmetry is intentional (kept as in the original), not a bug.

use bytes::{Buf, BytesMut};

pub const START_BYTE: u8 = 0xA5;
pub const STOP_BYTE: u8 = 0x15;

/// Header byte length: 1 (start) + 2 (data_len) + 2 (control) + 2 (sequence)
/// + 4 (serial_no).
pub const HEADER_LEN: usize = 11;
/// Trailer byte length: 1 (checksum) + 1 (stop).
pub const TRAILER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub data_len: u16,
    pub control: u16,
    pub sequence: u16,
    pub serial_no: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

/// A reason a would-be frame was rejected. Every variant corresponds to an
/// `Invalid_Msg_Format` counter increment; they're kept distinct here only
/// so the caller can log which rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidKind {
    BadStart,
    BadChecksum,
    BadStop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, validated frame was extracted. Call `next_frame` again —
    /// the buffer may hold another frame already.
    Frame(Frame),
    /// Not enough bytes buffered yet for a full frame.
    Incomplete,
    /// A malformed frame was found and handled per the resync rules above;
    /// the buffer has already been adjusted. Call `next_frame` again.
    Invalid(InvalidKind),
}

/// Computes the wire checksum: the sum of every byte from (and including)
/// `data_len`'s low byte through the end of the payload, mod 256. That is,
/// every byte of the frame except the leading start byte and the trailing
/// checksum+stop pair.
fn checksum(frame_bytes: &[u8]) -> u8 {
    frame_bytes[1..frame_bytes.len() - 2]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Incremental frame extractor. Owns no buffer itself — callers keep the
/// receive buffer (a `BytesMut`) and pass it in, since that buffer is also
/// where forwarded bytes get copied from.
#[derive(Debug, Default)]
pub struct Framer;

impl Framer {
    pub fn new() -> Self {
        Self
    }

    /// Attempt to extract the next event from `buf`. Consumes bytes from
    /// the front of `buf` as appropriate for whatever it finds.
    pub fn next_frame(&mut self, buf: &mut BytesMut) -> FrameEvent {
        if buf.is_empty() {
            return FrameEvent::Incomplete;
        }
        if buf[0] != START_BYTE {
            // Bad start: the whole buffer is untrustworthy, discard it all.
            buf.clear();
            return FrameEvent::Invalid(InvalidKind::BadStart);
        }
        if buf.len() < HEADER_LEN {
            return FrameEvent::Incomplete;
        }

        let data_len = u16::from_le_bytes([buf[1], buf[2]]);
        let control = u16::from_le_bytes([buf[3], buf[4]]);
        let sequence = u16::from_le_bytes([buf[5], buf[6]]);
        let serial_no = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]);

        let total_len = HEADER_LEN + data_len as usize + TRAILER_LEN;
        if buf.len() < total_len {
            return FrameEvent::Incomplete;
        }

        let frame_bytes = &buf[..total_len];
        let stop = frame_bytes[total_len - 1];
        let wire_checksum = frame_bytes[total_len - 2];

        if stop != STOP_BYTE {
            // Only clear the whole buffer if the byte right after this
            // would-be frame isn't itself a fresh start byte — otherwise
            // we'd be throwing away a frame that hasn't arrived wrong at
            // all, just desynced on length.
            let next_byte = buf.get(total_len);
            let drop_whole_buffer = match next_byte {
                Some(&b) => b != START_BYTE,
                None => true,
            };
            if drop_whole_buffer {
                buf.clear();
            } else {
                buf.advance(total_len);
            }
            return FrameEvent::Invalid(InvalidKind::BadStop);
        }

        let computed = checksum(frame_bytes);
        if computed != wire_checksum {
            // Bad checksum only ever drops this one frame, buffer position
            // and any subsequent frames are left alone.
            buf.advance(total_len);
            return FrameEvent::Invalid(InvalidKind::BadChecksum);
        }

        let payload = frame_bytes[HEADER_LEN..HEADER_LEN + data_len as usize].to_vec();
        buf.advance(total_len);

        FrameEvent::Frame(Frame {
            header: FrameHeader {
                data_len,
                control,
                sequence,
                serial_no,
            },
            payload,
        })
    }

    /// Serialize a frame for sending. Computes `data_len` and the checksum
    /// from `payload`.
    pub fn encode(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
        let data_len = payload.len() as u16;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        out.push(START_BYTE);
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&header.control.to_le_bytes());
        out.extend_from_slice(&header.sequence.to_le_bytes());
        out.extend_from_slice(&header.serial_no.to_le_bytes());
        out.extend_from_slice(payload);
        let cksum = checksum(&{
            let mut tmp = out.clone();
            tmp.push(0);
            tmp.push(0);
            tmp
        });
        out.push(cksum);
        out.push(STOP_BYTE);
        out
    }

    /// Rewrite the sequence and checksum fields of every frame packed into
    /// a forward buffer, walking frame-by-frame. Mirrors `_update_header`:
    /// the sequence is replaced with `next_sequence()`'s return for each
    /// frame in turn, and the checksum is recomputed to match.
    pub fn rewrite_headers(buf: &mut [u8], mut next_sequence: impl FnMut() -> u16) {
        let mut ofs = 0usize;
        while ofs + HEADER_LEN + TRAILER_LEN <= buf.len() {
            let data_len = u16::from_le_bytes([buf[ofs + 1], buf[ofs + 2]]) as usize;
            let frame_len = HEADER_LEN + data_len + TRAILER_LEN;
            if ofs + frame_len > buf.len() {
                break;
            }
            let seq = next_sequence();
            buf[ofs + 5..ofs + 7].copy_from_slice(&seq.to_le_bytes());
            let cksum = checksum(&buf[ofs..ofs + frame_len]);
            buf[ofs + frame_len - 2] = cksum;
            ofs += frame_len;
        }
    }
}
