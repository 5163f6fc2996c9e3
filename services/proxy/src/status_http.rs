//! Local admin HTTP server (§4.7/§6).
//!
//! Provides:
//! - `GET /`          — plain-text status line
//! - `GET /-/ready`   — 200 once startup has finished, 503 before that
//! - `GET /-/healthy` — 200 if every open connection is within its
//!                      watchdog deadline, 503 if any is not
//!
//! No authentication — this mirrors the original's `aiohttp` admin server,
//! which is intentionally unauthenticated and read-only (besides the
//! health verdict itself, nothing here is sensitive).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::registry::Registry;

/// Configuration for the status HTTP server.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// Bind address, e.g. `"0.0.0.0:8127"`.
    pub bind: String,
    pub proxy_version: String,
}

/// Tracks whether startup (config load + listeners bound) has completed.
/// Once `true` it never goes back to `false` — matches the original's
/// module-level `proxy_is_up` flag.
#[derive(Debug, Clone, Default)]
pub struct StartupStatus {
    ready: bool,
}

impl StartupStatus {
    pub fn not_ready() -> Self {
        StartupStatus { ready: false }
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Handle to the running status HTTP server.
pub struct StatusServer {
    local_addr: SocketAddr,
}

impl StatusServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn start(
        cfg: StatusConfig,
        startup: Arc<Mutex<StartupStatus>>,
        registry: Registry,
    ) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(&cfg.bind).await?;
        let local_addr = listener.local_addr()?;
        let version = Arc::new(cfg.proxy_version.clone());

        tokio::spawn(async move {
            run_server(listener, startup, registry, version).await;
        });

        Ok(StatusServer { local_addr })
    }
}

async fn run_server(
    listener: TcpListener,
    startup: Arc<Mutex<StartupStatus>>,
    registry: Registry,
    version: Arc<String>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let startup = startup.clone();
                let registry = registry.clone();
                let version = version.clone();
                tokio::spawn(async move {
                    handle_connection(stream, startup, registry, version).await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "status http accept failed, stopping admin server");
                break;
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    startup: Arc<Mutex<StartupStatus>>,
    registry: Registry,
    version: Arc<String>,
) {
    let mut buf = vec![0u8; 4096];
    let n = match stream.read(&mut buf).await {
        Ok(n) if n > 0 => n,
        _ => return,
    };

    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => {
            send_response(&mut stream, 400, "text/plain", "Bad Request").await;
            return;
        }
    };

    let first_line = request.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");

    match (method, path) {
        ("GET", "/-/ready") => {
            if startup.lock().await.is_ready() {
                send_response(&mut stream, 200, "text/plain", "ready").await;
            } else {
                send_response(&mut stream, 503, "text/plain", "starting up").await;
            }
        }
        ("GET", "/-/healthy") => {
            let unhealthy = registry.count_unhealthy().await;
            if unhealthy == 0 {
                send_response(&mut stream, 200, "text/plain", "healthy").await;
            } else {
                let body = format!("{unhealthy} unhealthy connection(s)");
                send_response(&mut stream, 503, "text/plain", &body).await;
            }
        }
        ("GET", "/") => {
            let open = registry.count_open().await;
            let body = format!("gen3plus-proxy {version}\nopen connections: {open}\n");
            send_response(&mut stream, 200, "text/plain", &body).await;
        }
        _ => {
            send_response(&mut stream, 404, "text/plain", "Not Found").await;
        }
    }
}

async fn send_response(stream: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {status} {status_text}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {len}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        len = body.len(),
    );

    let _ = stream.write_all(response.as_bytes()).await;
}
