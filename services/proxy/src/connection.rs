//! `Connection`: one end of a logger↔proxy or proxy↔cloud socket, combining
//! the streaming frame parser, the V5 dispatch table, the embedded Modbus
//! client, and the idle/health timers (§4.5, `AsyncStream` in the
//! original). Two `Connection`s are "paired" only through the shared
//! [`Registry`] — neither holds a strong reference to the other, so a
//! peer disconnecting is just a registry-lookup miss (§9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use gen3plus_proto::control::{ack_payload, Control};
use gen3plus_proto::frame::{Frame, FrameEvent, FrameHeader, Framer};
use gen3plus_proto::modbus::{self, ModbusResponse, PendingRequest};
use gen3plus_proto::register::Register;
use gen3plus_proto::sequence::Sequence;
use gen3plus_proto::Infos;

use crate::config::ProxyConfig;
use crate::mqtt::MqttSink;
use crate::registry::{ConnHandle, ConnId, Registry};
use crate::timer::{self, ConnState, ModbusPollSchedule, TimeoutParams};

const HEARTBEAT_INTERVAL_SECS: u32 = 120;

/// Which side of the proxy this connection represents. The data logger
/// dials in to us (`Server`); we dial out to the cloud (`Client`). Both
/// roles share the same frame parser and dispatch table, but the sequence
/// byte layout and which idle timeout applies differ by role (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

pub struct Connection {
    id: ConnId,
    role: Role,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    recv_buffer: BytesMut,
    framer: Framer,
    sequence: Sequence,
    infos: Infos,
    serial_no: Option<u32>,
    /// `node_id` bound from the matching `[inverters.<key>]` entry once
    /// authenticated (§6); `""` for an unknown serial accepted under
    /// `allow_all`, mirroring the original's `self.node_id = ''`.
    node_id: String,
    /// Whether Modbus polling is enabled for the bound inverter; `false`
    /// (no polling) until an entry matches, same default as an unknown
    /// serial accepted under `allow_all`.
    modbus_polling: bool,
    state: ConnState,
    peer_id: Option<ConnId>,
    registry: Registry,
    forward_rx: mpsc::Receiver<Vec<u8>>,
    healthy: Arc<AtomicBool>,
    config: Arc<ProxyConfig>,
    mqtt: Arc<dyn MqttSink>,
    modbus_pending: Option<PendingRequest>,
    modbus_schedule: ModbusPollSchedule,
    /// Set when the most recently forwarded `0x4510` command request came
    /// from the cloud (`tsun`-ACL path): its eventual `0x1510` response
    /// must be forwarded verbatim rather than published as `at_resp`.
    forward_at_cmd_resp: bool,
}

impl Connection {
    /// Register this socket in `registry`, wire it to `peer_id` (if the
    /// other side of the pair already exists), and spawn its event loop.
    /// Returns the new connection's id so the caller (or its peer) can
    /// address forwards to it.
    pub async fn spawn(
        socket: TcpStream,
        role: Role,
        registry: Registry,
        config: Arc<ProxyConfig>,
        mqtt: Arc<dyn MqttSink>,
        peer_id: Option<ConnId>,
    ) -> ConnId {
        let (reader, writer) = socket.into_split();
        let (forward_tx, forward_rx) = mpsc::channel(64);
        let healthy = Arc::new(AtomicBool::new(true));

        let id = registry
            .register(ConnHandle {
                forward_tx,
                healthy: healthy.clone(),
            })
            .await;

        let conn = Connection {
            id,
            role,
            reader,
            writer,
            recv_buffer: BytesMut::with_capacity(4096),
            framer: Framer::new(),
            sequence: Sequence::new(role == Role::Server),
            infos: Infos::new(),
            serial_no: None,
            node_id: String::new(),
            modbus_polling: false,
            state: ConnState::Init,
            peer_id,
            registry,
            forward_rx,
            healthy,
            config,
            mqtt,
            modbus_pending: None,
            modbus_schedule: ModbusPollSchedule::default(),
            forward_at_cmd_resp: false,
        };

        tokio::spawn(conn.run());
        id
    }

    fn server_side(&self) -> bool {
        self.role == Role::Server
    }

    fn modbus_polling_active(&self) -> bool {
        self.server_side()
            && self.state == ConnState::Up
            && self.serial_no.is_some()
            && self.modbus_polling
    }

    async fn run(mut self) {
        loop {
            let idle = timer::idle_timeout(TimeoutParams {
                state: self.state,
                server_side: self.server_side(),
                modbus_polling: self.modbus_polling_active(),
            });
            let modbus_timeout = if self.modbus_polling_active() {
                self.modbus_schedule.next_timeout()
            } else {
                Duration::from_secs(u64::MAX / 2)
            };

            let iter_start = Instant::now();
            tokio::select! {
                read_result = tokio::time::timeout(idle, self.reader.read_buf(&mut self.recv_buffer)) => {
                    match read_result {
                        Ok(Ok(0)) => {
                            tracing::debug!(id = ?self.id, "peer closed");
                            self.close().await;
                            break;
                        }
                        Ok(Ok(_n)) => self.drain_frames().await,
                        Ok(Err(e)) => {
                            tracing::debug!(id = ?self.id, error = %e, "read error, closing");
                            self.close().await;
                            break;
                        }
                        Err(_elapsed) => {
                            tracing::debug!(id = ?self.id, "idle timeout, disconnecting");
                            self.disc().await;
                            break;
                        }
                    }
                }
                forwarded = self.forward_rx.recv() => {
                    match forwarded {
                        Some(mut buf) => {
                            let mut seq = self.sequence;
                            Framer::rewrite_headers(&mut buf, || seq.next_send());
                            self.sequence = seq;
                            if let Err(e) = self.writer.write_all(&buf).await {
                                tracing::debug!(id = ?self.id, error = %e, "forward write failed");
                                self.close().await;
                                break;
                            }
                        }
                        None => {
                            // Peer's sender dropped; nothing more will ever
                            // arrive through it, but this connection stays
                            // alive on its own until its own read loop ends.
                        }
                    }
                }
                _ = tokio::time::sleep(modbus_timeout), if self.modbus_polling_active() => {
                    self.fire_modbus_poll().await;
                }
            }

            self.healthy.store(
                timer::is_healthy(iter_start.elapsed()),
                Ordering::Relaxed,
            );
        }

        self.registry.unregister(self.id).await;
    }

    async fn drain_frames(&mut self) {
        loop {
            match self.framer.next_frame(&mut self.recv_buffer) {
                FrameEvent::Frame(frame) => {
                    // init -> received only; once a connection is Up a
                    // later non-data frame (heartbeat, sync, response)
                    // must not knock it back down (§3), or Modbus polling
                    // and the steady-state idle timeout would both drop
                    // out every time one arrives.
                    if self.state == ConnState::Init {
                        self.state = ConnState::Received;
                    }
                    self.handle_frame(frame).await;
                }
                FrameEvent::Invalid(kind) => {
                    self.infos.incr_counter(Register::InvalidMsgFormat);
                    tracing::debug!(id = ?self.id, ?kind, "discarded malformed frame");
                }
                FrameEvent::Incomplete => break,
            }
        }
        self.publish_dirty().await;
    }

    async fn handle_frame(&mut self, frame: Frame) {
        self.sequence.set_recv(frame.header.sequence);

        if !self.authenticate(frame.header.serial_no) {
            self.infos.incr_counter(Register::UnknownSnr);
            tracing::warn!(id = ?self.id, serial_no = frame.header.serial_no, "unrecognized serial, dropping frame");
            return;
        }

        let control = Control::from_code(frame.header.control);
        match control {
            Control::DeviceInd | Control::DataInd | Control::SyncStart
            | Control::HeartbeatInd | Control::SyncEnd => {
                if matches!(control, Control::DeviceInd | Control::DataInd) {
                    let sensor_list = self.infos.sensor_list();
                    self.infos.parse(sensor_list, &frame.payload);
                }
                self.send_ack(&frame, control).await;
                // received -> up on the first data indication acknowledged.
                if matches!(control, Control::DataInd) {
                    self.state = ConnState::Up;
                }
                self.forward_frame(&frame).await;
            }
            Control::CommandReq => {
                self.handle_command_request(&frame).await;
            }
            Control::CommandRsp => {
                self.handle_command_response(&frame).await;
            }
            Control::Response(_) => {
                self.forward_frame(&frame).await;
            }
            Control::Unknown(_) => {
                self.infos.incr_counter(Register::UnknownCtrl);
                self.forward_frame(&frame).await;
            }
        }
    }

    /// §4.2 auth gate: bind to the first serial number seen; anything
    /// else afterwards is rejected unless `allow_all` is configured.
    /// Binding also applies the matching `[inverters.<key>]` entry's
    /// `node_id`/`modbus_polling`/`sensor_list` (`__set_config_parms` in
    /// the original), or leaves them at their unknown-inverter defaults
    /// when accepted only through `allow_all`.
    fn authenticate(&mut self, serial_no: u32) -> bool {
        if let Some(bound) = self.serial_no {
            return bound == serial_no;
        }

        match self.config.inverters.find(serial_no) {
            Some(entry) => {
                self.node_id = entry.node_id.clone();
                self.modbus_polling = entry.modbus_polling;
                self.infos.set_sensor_list(entry.sensor_list);
                self.serial_no = Some(serial_no);
                true
            }
            None if self.config.inverters.allow_all => {
                self.serial_no = Some(serial_no);
                true
            }
            None => false,
        }
    }

    async fn send_ack(&mut self, frame: &Frame, control: Control) {
        let Some(ack_code) = control.ack_code() else {
            return;
        };
        let ftype = *frame.payload.first().unwrap_or(&0);
        let timestamp = unix_timestamp_u32();
        let payload = ack_payload(ftype, timestamp, HEARTBEAT_INTERVAL_SECS);
        let header = FrameHeader {
            data_len: 0,
            control: ack_code,
            sequence: self.sequence.get_send(),
            serial_no: frame.header.serial_no,
        };
        let bytes = Framer::encode(&header, &payload);
        if let Err(e) = self.writer.write_all(&bytes).await {
            tracing::debug!(id = ?self.id, error = %e, "failed writing ack");
        }
    }

    async fn forward_frame(&mut self, frame: &Frame) {
        if !self.config.solarman.enabled {
            return;
        }
        let Some(peer_id) = self.peer_id else {
            return;
        };
        let Some(sender) = self.registry.forward_sender(peer_id).await else {
            tracing::debug!(id = ?self.id, "peer gone, dropping forward");
            return;
        };
        let bytes = Framer::encode(&frame.header, &frame.payload);
        // FIFO order preserved by mpsc; best-effort, a full channel means
        // the peer is badly behind and the frame is dropped rather than
        // blocking this connection's own read loop.
        let _ = sender.try_send(bytes);
    }

    /// `0x4510` arriving inbound: a command (AT or Modbus) the cloud wants
    /// relayed on to the logger. Gated by the `tsun` ACL for AT commands
    /// (§4.4); blocked commands are dropped with no forward and no
    /// response. Accepted commands arm `forward_at_cmd_resp` so the
    /// eventual `0x1510` reply is relayed rather than published.
    async fn handle_command_request(&mut self, frame: &Frame) {
        use gen3plus_proto::command::{FTYPE_AT_CMD, FTYPE_MB_RTU_CMD, REQUEST_HEADER_LEN};

        let Some(&ftype) = frame.payload.first() else {
            self.infos.incr_counter(Register::UnknownCtrl);
            return;
        };

        match ftype {
            FTYPE_AT_CMD => {
                let cmd = String::from_utf8_lossy(
                    frame.payload.get(REQUEST_HEADER_LEN..).unwrap_or(&[]),
                )
                .trim_end_matches('\r')
                .to_owned();
                if self.config.acl.tsun.forbidden(&cmd) {
                    self.infos.incr_counter(Register::AtCommandBlocked);
                    tracing::info!(id = ?self.id, %cmd, "cloud AT command blocked by tsun ACL");
                    return;
                }
                self.infos.incr_counter(Register::AtCommand);
                self.forward_at_cmd_resp = true;
                self.forward_frame(frame).await;
            }
            FTYPE_MB_RTU_CMD => {
                let pdu = frame.payload.get(REQUEST_HEADER_LEN..).unwrap_or(&[]);
                if !modbus::pdu_crc_valid(pdu) {
                    self.infos.incr_counter(Register::InvalidMsgFormat);
                    tracing::debug!(id = ?self.id, "invalid embedded Modbus CRC on inbound command, dropping");
                    return;
                }
                self.infos.incr_counter(Register::ModbusCommand);
                self.forward_frame(frame).await;
            }
            _ => {
                self.infos.incr_counter(Register::UnknownCtrl);
                self.forward_frame(frame).await;
            }
        }
    }

    /// `0x1510` arriving inbound: the response to a command we (or the
    /// cloud, relayed through us) issued. A Modbus response is always
    /// consumed here and never forwarded — the original request's forward
    /// already happened in [`Self::handle_command_request`]. An AT
    /// response is published as `at_resp` and *not* forwarded unless
    /// `forward_at_cmd_resp` is set, in which case it's forwarded verbatim
    /// instead of published. Any other control/ftype combination forwards
    /// unconditionally, matching the fallthrough `__forward_msg()` at the
    /// end of the original's `msg_command_rsp`.
    async fn handle_command_response(&mut self, frame: &Frame) {
        use gen3plus_proto::command::{FTYPE_AT_CMD, FTYPE_MB_RTU_CMD, RESPONSE_HEADER_LEN};

        let payload = &frame.payload;
        if payload.len() < RESPONSE_HEADER_LEN {
            self.infos.incr_counter(Register::UnknownCtrl);
            self.forward_frame(frame).await;
            return;
        }
        let ftype = payload[0];
        let tail = &payload[RESPONSE_HEADER_LEN..];
        match ftype {
            FTYPE_MB_RTU_CMD => {
                match modbus::decode_response(self.modbus_pending.as_ref(), tail) {
                    Ok(ModbusResponse::ReadRegs { .. } | ModbusResponse::WriteAck { .. }) => {
                        self.modbus_pending = None;
                        self.infos.incr_counter(Register::ModbusCommand);
                    }
                    Err(e) => {
                        tracing::debug!(id = ?self.id, error = %e, "modbus response rejected");
                    }
                }
            }
            FTYPE_AT_CMD if self.forward_at_cmd_resp => {
                self.infos.incr_counter(Register::AtCommand);
                self.forward_frame(frame).await;
            }
            FTYPE_AT_CMD => {
                let text = String::from_utf8_lossy(tail).into_owned();
                tracing::info!(id = ?self.id, at_resp = %text, "publishing AT command response");
                let prefix = self.config.mqtt.topic_prefix.clone();
                let node_id = self.node_id.clone();
                self.mqtt.publish(&format!("{prefix}{node_id}at_resp"), text).await;
            }
            _ => {
                self.infos.incr_counter(Register::UnknownCtrl);
                self.forward_frame(frame).await;
            }
        }
    }

    /// Send a locally-originated (MQTT-issued) AT command, gated by the
    /// `mqtt` ACL (§4.4, scenario 5). Blocked commands never reach the
    /// wire; instead an `at_resp` explaining the rejection is published
    /// immediately (no round trip to the logger needed).
    pub async fn send_at_cmd(&mut self, cmd: &str) {
        if self.state != ConnState::Up {
            tracing::warn!(id = ?self.id, "ignoring AT command, connection not up");
            return;
        }
        let cmd = cmd.trim();
        if self.config.acl.mqtt.forbidden(cmd) {
            let prefix = self.config.mqtt.topic_prefix.clone();
            let node_id = self.node_id.clone();
            let text = format!("'{cmd}' is forbidden");
            tracing::info!(id = ?self.id, at_resp = %text, "at_resp");
            self.mqtt.publish(&format!("{prefix}{node_id}at_resp"), text).await;
            return;
        }

        self.forward_at_cmd_resp = false;
        let Some(serial_no) = self.serial_no else {
            return;
        };
        let payload = gen3plus_proto::command::build_at_command_payload(cmd);
        let header = FrameHeader {
            data_len: 0,
            control: 0x4510,
            sequence: self.sequence.next_send(),
            serial_no,
        };
        let bytes = Framer::encode(&header, &payload);
        if let Err(e) = self.writer.write_all(&bytes).await {
            tracing::debug!(id = ?self.id, error = %e, "failed writing AT command");
        }
    }

    async fn fire_modbus_poll(&mut self) {
        let poll = self.modbus_schedule.fire();
        self.send_modbus_read(modbus::REGULAR_POLL_REG, modbus::REGULAR_POLL_LEN)
            .await;
        if poll == crate::timer::ModbusPoll::RegularPlusWideBlock {
            self.send_modbus_read(modbus::WIDE_POLL_REG, modbus::WIDE_POLL_LEN)
                .await;
        }
    }

    async fn send_modbus_read(&mut self, register: u16, count: u16) {
        let (pdu, pending) = modbus::build_read_request(1, register, count);
        self.send_modbus_pdu(pdu, pending).await;
    }

    /// Issue an on-demand `WRITE_SINGLE_REG` request. Like every Modbus
    /// command, dropped with no wire bytes unless `state == up` (§8
    /// invariant 6 / scenario 4) — polling and on-demand writes share the
    /// same single-outstanding-request slot.
    pub async fn send_modbus_write(&mut self, register: u16, value: u16) {
        let (pdu, pending) = modbus::build_write_request(1, register, value);
        self.send_modbus_pdu(pdu, pending).await;
    }

    async fn send_modbus_pdu(&mut self, pdu: Vec<u8>, pending: PendingRequest) {
        if self.state != ConnState::Up {
            tracing::warn!(id = ?self.id, "ignoring modbus command, connection not up");
            return;
        }
        let Some(serial_no) = self.serial_no else {
            return;
        };
        self.modbus_pending = Some(pending);
        let payload = gen3plus_proto::command::build_modbus_command_payload(
            self.infos.sensor_list(),
            &pdu,
        );
        let header = FrameHeader {
            data_len: 0,
            control: 0x4510,
            sequence: self.sequence.next_send(),
            serial_no,
        };
        let bytes = Framer::encode(&header, &payload);
        if let Err(e) = self.writer.write_all(&bytes).await {
            tracing::debug!(id = ?self.id, error = %e, "failed writing modbus command");
        }
        self.infos.incr_counter(Register::ModbusCommand);
    }

    async fn publish_dirty(&mut self) {
        let prefix = self.config.mqtt.topic_prefix.clone();
        for (topic, _register, value) in self.infos.drain_dirty() {
            let full_topic = format!("{prefix}{topic}");
            self.mqtt.publish(&full_topic, value.to_string()).await;
        }
    }

    /// Graceful close: flush and shut the write half down, waiting for it
    /// to complete — matching the original's `disc()`.
    async fn disc(&mut self) {
        let _ = self.writer.shutdown().await;
    }

    /// Hard close: matching the original's `close()`, which abandons the
    /// socket immediately rather than waiting on a clean FIN handshake.
    /// `tokio::time::timeout` with a zero budget turns `shutdown` into a
    /// best-effort attempt instead of a blocking one.
    async fn close(&mut self) {
        let _ = tokio::time::timeout(Duration::from_millis(0), self.writer.shutdown()).await;
    }
}

#[cfg(test)]
impl Connection {
    /// Build a bare `Connection` over a loopback socket pair without
    /// registering or spawning it, so unit tests can drive its private
    /// methods directly and inspect written bytes on `peer`.
    async fn new_for_test(config: Arc<ProxyConfig>, mqtt: Arc<dyn MqttSink>) -> (Self, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        let (reader, writer) = socket.into_split();
        let conn = Connection {
            id: crate::registry::Registry::new().register(ConnHandle {
                forward_tx: mpsc::channel(1).0,
                healthy: Arc::new(AtomicBool::new(true)),
            }).await,
            role: Role::Server,
            reader,
            writer,
            recv_buffer: BytesMut::with_capacity(4096),
            framer: Framer::new(),
            sequence: Sequence::new(true),
            infos: Infos::new(),
            serial_no: Some(proxy_test_support::TEST_SERIAL_NO),
            node_id: String::new(),
            modbus_polling: false,
            state: ConnState::Up,
            peer_id: None,
            registry: Registry::new(),
            forward_rx: mpsc::channel(1).1,
            healthy: Arc::new(AtomicBool::new(true)),
            config,
            mqtt,
            modbus_pending: None,
            modbus_schedule: ModbusPollSchedule::default(),
            forward_at_cmd_resp: false,
        };
        (conn, peer)
    }
}

fn unix_timestamp_u32() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::MqttSink;
    use gen3plus_proto::frame::FrameEvent;
    use std::sync::Mutex as StdMutex;
    use tokio::io::AsyncReadExt;

    #[test]
    fn server_role_maps_to_server_side_sequence() {
        assert!(Role::Server == Role::Server);
        assert_ne!(Role::Server, Role::Client);
    }

    #[derive(Default)]
    struct RecordingMqttSink {
        published: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl MqttSink for RecordingMqttSink {
        async fn publish(&self, topic: &str, payload: String) {
            self.published.lock().unwrap().push((topic.to_owned(), payload));
        }
    }

    fn acl_config(mqtt_allow: &[&str], mqtt_block: &[&str]) -> Arc<ProxyConfig> {
        let allow = mqtt_allow.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ");
        let block = mqtt_block.iter().map(|s| format!("\"{s}\"")).collect::<Vec<_>>().join(", ");
        let toml = format!(
            "[inverters]\nallow_all = true\n[acl.mqtt]\nallow = [{allow}]\nblock = [{block}]\n"
        );
        Arc::new(crate::config::load_config_from_str(&toml).unwrap())
    }

    async fn read_available(peer: &mut TcpStream) -> Vec<u8> {
        let mut buf = [0u8; 256];
        match tokio::time::timeout(Duration::from_millis(200), peer.read(&mut buf)).await {
            Ok(Ok(n)) => buf[..n].to_vec(),
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn send_at_cmd_blocked_by_mqtt_acl_publishes_forbidden_and_writes_nothing() {
        let cfg = acl_config(&["AT+"], &["AT+WEBU"]);
        let mqtt = Arc::new(RecordingMqttSink::default());
        let (mut conn, mut peer) = Connection::new_for_test(cfg, mqtt.clone()).await;

        conn.send_at_cmd("AT+WEBU").await;

        let bytes = read_available(&mut peer).await;
        assert!(bytes.is_empty(), "a blocked AT command must not reach the wire");

        let published = mqtt.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1, "'AT+WEBU' is forbidden");
    }

    #[tokio::test]
    async fn send_at_cmd_allowed_writes_an_at_command_frame() {
        let cfg = acl_config(&["AT+"], &["AT+WEBU"]);
        let mqtt = Arc::new(RecordingMqttSink::default());
        let (mut conn, mut peer) = Connection::new_for_test(cfg, mqtt.clone()).await;

        conn.send_at_cmd("AT+TIME=2026,1,1,0,0,0").await;

        let bytes = read_available(&mut peer).await;
        assert!(!bytes.is_empty(), "an allowed AT command must be written");
        let mut buf = BytesMut::from(&bytes[..]);
        let mut framer = Framer::new();
        match framer.next_frame(&mut buf) {
            FrameEvent::Frame(f) => {
                assert_eq!(f.header.control, 0x4510);
                assert_eq!(f.payload[0], gen3plus_proto::command::FTYPE_AT_CMD);
            }
            other => panic!("expected a command-request frame, got {other:?}"),
        }
        assert!(mqtt.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn modbus_write_is_dropped_when_connection_not_up() {
        let cfg = acl_config(&[], &[]);
        let mqtt = Arc::new(RecordingMqttSink::default());
        let (mut conn, mut peer) = Connection::new_for_test(cfg, mqtt).await;
        conn.state = ConnState::Received;

        conn.send_modbus_write(0x2008, 0).await;

        let bytes = read_available(&mut peer).await;
        assert!(bytes.is_empty(), "modbus commands must produce no wire bytes unless state == up");
        assert!(conn.modbus_pending.is_none());
    }

    #[tokio::test]
    async fn modbus_write_is_sent_when_connection_is_up() {
        let cfg = acl_config(&[], &[]);
        let mqtt = Arc::new(RecordingMqttSink::default());
        let (mut conn, mut peer) = Connection::new_for_test(cfg, mqtt).await;
        assert_eq!(conn.state, ConnState::Up);

        conn.send_modbus_write(0x2008, 0).await;

        let bytes = read_available(&mut peer).await;
        assert!(!bytes.is_empty());
        assert!(conn.modbus_pending.is_some());
    }
}
