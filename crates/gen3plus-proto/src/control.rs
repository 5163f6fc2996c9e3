//! Control-code dispatch table (§4.2).

/// Control codes sent by the logger (data-logging stick) to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// 0x4110 — device report, acked with 0x1110.
    DeviceInd,
    /// 0x4210 — data report, acked with 0x1210.
    DataInd,
    /// 0x4310 — sync session start, acked with 0x1310.
    SyncStart,
    /// 0x4710 — heartbeat, acked with 0x1710.
    HeartbeatInd,
    /// 0x4810 — sync session end, acked with 0x1810.
    SyncEnd,
    /// 0x4510 — AT/Modbus command request. The response to a command we
    /// sent arrives later as `CommandRsp`, not as an immediate ack.
    CommandReq,
    /// 0x1510 — response to a command we issued (decode only, no ack).
    CommandRsp,
    /// Any other `0x1x10` from the cloud side: a response we don't
    /// originate acks for, decode only.
    Response(u16),
    /// Anything not covered above.
    Unknown(u16),
}

impl Control {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x4110 => Control::DeviceInd,
            0x4210 => Control::DataInd,
            0x4310 => Control::SyncStart,
            0x4710 => Control::HeartbeatInd,
            0x4810 => Control::SyncEnd,
            0x4510 => Control::CommandReq,
            0x1510 => Control::CommandRsp,
            0x1110 | 0x1210 | 0x1310 | 0x1710 | 0x1810 => Control::Response(code),
            c => Control::Unknown(c),
        }
    }

    /// The ack control code to send back immediately, if any.
    pub fn ack_code(self) -> Option<u16> {
        match self {
            Control::DeviceInd => Some(0x1110),
            Control::DataInd => Some(0x1210),
            Control::SyncStart => Some(0x1310),
            Control::HeartbeatInd => Some(0x1710),
            Control::SyncEnd => Some(0x1810),
            _ => None,
        }
    }
}

/// Build the payload for an immediate ack response: `ftype | status=1 |
/// timestamp(LE u32) | heartbeat interval(LE u32)`.
pub fn ack_payload(ftype: u8, timestamp: u32, heartbeat: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    out.push(ftype);
    out.push(1); // status: always success
    out.extend_from_slice(&timestamp.to_le_bytes());
    out.extend_from_slice(&heartbeat.to_le_bytes());
    out
}
