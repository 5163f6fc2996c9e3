//! End-to-end coverage of `Connection` as a server-side socket: the
//! auth gate (§4.2), the ack dispatch table (§4.1), telemetry decode +
//! MQTT publish ordering (§5), and the frame-resync rules (§9) as seen
//! through a live TCP round trip rather than through the frame parser
//! directly (that's covered in `gen3plus-proto`'s own unit tests).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use gen3plus_proto::frame::{Frame, FrameEvent, Framer};
use proxy::config::load_config_from_str;
use proxy::connection::{Connection, Role};
use proxy::mqtt::MqttSink;
use proxy::registry::Registry;

#[derive(Default)]
struct RecordingMqttSink {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MqttSink for RecordingMqttSink {
    async fn publish(&self, topic: &str, payload: String) {
        self.published.lock().unwrap().push((topic.to_owned(), payload));
    }
}

/// Accept one connection on an ephemeral port, spawn it as a server-side
/// `Connection`, and hand back the client-side socket to drive it with.
async fn spawn_server(cfg_toml: &str, mqtt: Arc<dyn MqttSink>) -> TcpStream {
    let cfg = Arc::new(load_config_from_str(cfg_toml).expect("valid test config"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = Registry::new();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        Connection::spawn(socket, Role::Server, registry, cfg, mqtt, None).await;
    });

    TcpStream::connect(addr).await.unwrap()
}

/// Read from `stream` until the framer yields one complete frame or
/// `timeout` elapses (no frame arriving is itself a meaningful result for
/// the "dropped silently" test case).
async fn read_one_frame(stream: &mut TcpStream, timeout: Duration) -> Option<Frame> {
    let mut framer = Framer::new();
    let mut buf = BytesMut::with_capacity(256);
    let mut chunk = [0u8; 256];

    tokio::time::timeout(timeout, async {
        loop {
            match framer.next_frame(&mut buf) {
                FrameEvent::Frame(frame) => return frame,
                FrameEvent::Invalid(_) => continue,
                FrameEvent::Incomplete => {}
            }
            let n = stream.read(&mut chunk).await.expect("read");
            assert!(n > 0, "peer closed before producing a frame");
            buf.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .ok()
}

const ALLOW_ALL: &str = "[inverters]\nallow_all = true\n";

#[tokio::test]
async fn device_indication_receives_matching_ack() {
    let mut stream = spawn_server(ALLOW_ALL, Arc::new(RecordingMqttSink::default())).await;
    stream
        .write_all(&proxy_test_support::device_ind(1, &[]))
        .await
        .unwrap();

    let frame = read_one_frame(&mut stream, Duration::from_secs(2))
        .await
        .expect("expected an ack frame");
    assert_eq!(frame.header.control, 0x1110);
}

#[tokio::test]
async fn heartbeat_receives_heartbeat_ack() {
    let mut stream = spawn_server(ALLOW_ALL, Arc::new(RecordingMqttSink::default())).await;
    stream
        .write_all(&proxy_test_support::heartbeat_ind(1))
        .await
        .unwrap();

    let frame = read_one_frame(&mut stream, Duration::from_secs(2))
        .await
        .expect("expected a heartbeat ack frame");
    assert_eq!(frame.header.control, 0x1710);
}

#[tokio::test]
async fn unrecognized_serial_is_dropped_without_an_ack() {
    let cfg = "[inverters.decoy]\nmonitor_sn = 3735928559\n";
    let mut stream = spawn_server(cfg, Arc::new(RecordingMqttSink::default())).await;
    // proxy_test_support's fixtures always use TEST_SERIAL_NO, which does
    // not match the only configured inverter's monitor_sn above.
    stream
        .write_all(&proxy_test_support::device_ind(1, &[]))
        .await
        .unwrap();

    let frame = read_one_frame(&mut stream, Duration::from_millis(300)).await;
    assert!(frame.is_none(), "unauthenticated logger must not be acked");
}

#[tokio::test]
async fn data_indication_decodes_telemetry_and_publishes_it() {
    let mqtt = Arc::new(RecordingMqttSink::default());
    let mut stream = spawn_server(ALLOW_ALL, mqtt.clone()).await;

    // grid voltage raw 2300 (-> 230.0 scaled), output power raw 1500 (-> 150.0).
    stream
        .write_all(&proxy_test_support::data_ind(1, 2300, 1500))
        .await
        .unwrap();

    read_one_frame(&mut stream, Duration::from_secs(2))
        .await
        .expect("data indication must still be acked");

    // publish_dirty runs on the same task right after the ack is written;
    // give it a few scheduler turns to land.
    let mut published = Vec::new();
    for _ in 0..20 {
        published = mqtt.published.lock().unwrap().clone();
        if !published.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(
        published.iter().any(|(topic, payload)| topic.ends_with("grid") && payload == "230"),
        "expected a grid-topic publish of 230, got {published:?}"
    );
}

/// mqtt ACL config plus `tsun` ACL config in one TOML blob, used by the
/// cloud-originated AT command tests below.
const TSUN_ACL: &str = "[inverters]\nallow_all = true\n\
                         [acl.tsun]\nallow = [\"AT+\"]\nblock = [\"AT+WEBU\"]\n";

/// Spawn a paired server-side/client-side `Connection` pair sharing one
/// registry: the client-side leg stands in for the cloud-facing connection
/// (receives inbound `0x4510` command requests), the server-side leg for
/// the logger-facing one (relays them onward). Returns the raw test
/// sockets for each leg: `.0` plays the logger, `.1` plays the cloud.
async fn spawn_pair(cfg_toml: &str, mqtt: Arc<dyn MqttSink>) -> (TcpStream, TcpStream) {
    let cfg = Arc::new(load_config_from_str(cfg_toml).expect("valid test config"));
    let registry = Registry::new();

    let server_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_listener.local_addr().unwrap();
    let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client_listener.local_addr().unwrap();

    let logger_stream = TcpStream::connect(server_addr).await.unwrap();
    let (server_socket, _) = server_listener.accept().await.unwrap();
    let server_id = Connection::spawn(
        server_socket,
        Role::Server,
        registry.clone(),
        cfg.clone(),
        mqtt.clone(),
        None,
    )
    .await;

    let cloud_stream = TcpStream::connect(client_addr).await.unwrap();
    let (client_socket, _) = client_listener.accept().await.unwrap();
    Connection::spawn(
        client_socket,
        Role::Client,
        registry,
        cfg,
        mqtt,
        Some(server_id),
    )
    .await;

    (logger_stream, cloud_stream)
}

#[tokio::test]
async fn cloud_at_command_blocked_by_tsun_acl_is_not_forwarded() {
    let mut pair = spawn_pair(TSUN_ACL, Arc::new(RecordingMqttSink::default())).await;

    pair.1
        .write_all(&proxy_test_support::at_command_req(1, "AT+WEBUxyz"))
        .await
        .unwrap();

    let forwarded = read_one_frame(&mut pair.0, Duration::from_millis(300)).await;
    assert!(forwarded.is_none(), "a blocked cloud AT command must not be relayed to the logger");
}

#[tokio::test]
async fn cloud_at_command_allowed_by_tsun_acl_is_forwarded_verbatim() {
    let mut pair = spawn_pair(TSUN_ACL, Arc::new(RecordingMqttSink::default())).await;

    pair.1
        .write_all(&proxy_test_support::at_command_req(1, "AT+TIME=1"))
        .await
        .unwrap();

    let forwarded = read_one_frame(&mut pair.0, Duration::from_secs(2))
        .await
        .expect("an allowed cloud AT command must be relayed to the logger");
    assert_eq!(forwarded.header.control, 0x4510);
    assert_eq!(forwarded.payload[0], gen3plus_proto::command::FTYPE_AT_CMD);
}

#[tokio::test]
async fn invalid_start_byte_resyncs_without_losing_the_following_heartbeat() {
    let mut stream = spawn_server(ALLOW_ALL, Arc::new(RecordingMqttSink::default())).await;
    stream
        .write_all(&proxy_test_support::invalid_start_then_heartbeat(1))
        .await
        .unwrap();

    // Only one ack should ever arrive — for the heartbeat that followed
    // the corrupted frame, not for the corrupted frame itself.
    let frame = read_one_frame(&mut stream, Duration::from_secs(2))
        .await
        .expect("heartbeat following the bad frame must still be acked");
    assert_eq!(frame.header.control, 0x1710);

    let second = read_one_frame(&mut stream, Duration::from_millis(300)).await;
    assert!(second.is_none(), "the corrupted frame must not also produce an ack");
}
