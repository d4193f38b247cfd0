//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use balancers::HealthCheckConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// User agent the tests configure for health probes.
pub const PROBE_AGENT: &str = "balancers-probe/test";

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Request target, path and query.
    pub path: String,
    pub user_agent: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug)]
struct BackendState {
    status: AtomicU16,
    delay_ms: AtomicU64,
    trickle_ms: AtomicU64,
    required_auth: Mutex<Option<String>>,
    requests: Mutex<Vec<Recorded>>,
}

/// A programmable HTTP/1.1 backend on an ephemeral port.
///
/// Replies with the configured status and the request target as body.
/// Every connection is closed after one response.
#[derive(Debug, Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(BackendState {
            status: AtomicU16::new(status),
            delay_ms: AtomicU64::new(0),
            trickle_ms: AtomicU64::new(0),
            required_auth: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        });

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, shared.clone()));
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL with `user_info` embedded, e.g. `user:pwd`.
    pub fn url_with_user_info(&self, user_info: &str) -> String {
        format!("http://{user_info}@{}", self.addr)
    }

    /// Answer 401 to requests without exactly this `Authorization` value.
    pub fn require_auth(&self, value: &str) {
        *self.state.required_auth.lock().unwrap() = Some(value.to_string());
    }

    /// Write the body one byte at a time, pausing before each byte.
    pub fn set_trickle(&self, pause: Duration) {
        self.state
            .trickle_ms
            .store(pause.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    /// Hold every later response for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of health probes received.
    pub fn probes(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.user_agent.as_deref() == Some(PROBE_AGENT))
            .count()
    }

    /// Requests that are not health probes.
    pub fn forwarded(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.user_agent.as_deref() != Some(PROBE_AGENT))
            .collect()
    }
}

async fn serve(mut socket: TcpStream, state: Arc<BackendState>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    let headers: Vec<(&str, &str)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .collect();
    let header = |wanted: &str| {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.to_string())
    };
    let user_agent = header("user-agent");
    let authorization = header("authorization");
    state.requests.lock().unwrap().push(Recorded {
        path: path.clone(),
        user_agent,
        authorization: authorization.clone(),
    });

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let required = state.required_auth.lock().unwrap().clone();
    let status = match required {
        Some(required) if authorization.as_deref() != Some(required.as_str()) => 401,
        _ => state.status.load(Ordering::SeqCst),
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        path.len(),
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }

    let trickle = state.trickle_ms.load(Ordering::SeqCst);
    if trickle == 0 {
        let _ = socket.write_all(path.as_bytes()).await;
    } else {
        for byte in path.as_bytes() {
            tokio::time::sleep(Duration::from_millis(trickle)).await;
            if socket.write_all(&[*byte]).await.is_err() {
                return;
            }
        }
    }
    let _ = socket.shutdown().await;
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// URL of a local port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Health check settings with a short interval and a recognizable user agent.
pub fn health_check(interval: Duration) -> HealthCheckConfig {
    HealthCheckConfig {
        user_agent: PROBE_AGENT.to_string(),
        timeout_ms: 1000,
        ..HealthCheckConfig::default()
    }
    .with_interval(interval)
}
