//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use auth_gateway::config::{GatewayConfig, KeyConfig, RouteConfig, TargetConfig};
use auth_gateway::forwarding::HttpForwarder;
use auth_gateway::lifecycle::Shutdown;
use auth_gateway::observability::{AuditEvent, AuditSink, ChannelAuditSink};
use auth_gateway::{GatewayServer, SnapshotStore};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub const SECRET: &str = "integration-secret";
pub const ISSUER: &str = "Online_Course_Admin";
pub const AUDIENCE: &str = "Online_Course_Users";

/// What a mock backend saw of one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw-TCP HTTP/1.1 backend that records every request.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<SeenRequest> {
        self.seen.lock().unwrap().last().cloned()
    }
}

/// Start a backend answering every request with `status` after `delay`.
///
/// The body echoes the method and path as JSON.
pub async fn start_backend(status: u16, delay: Duration) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (h, s) = (hits.clone(), seen.clone());
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let (h, s) = (h.clone(), s.clone());
            tokio::spawn(async move {
                serve_one(socket, status, delay, h, s).await;
            });
        }
    });

    MockBackend { addr, hits, seen }
}

async fn serve_one(
    mut socket: TcpStream,
    status: u16,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let request = SeenRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        headers: lines
            .take_while(|l| !l.is_empty())
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect(),
    };

    hits.fetch_add(1, Ordering::SeqCst);
    let body = json!({ "method": request.method, "path": request.path }).to_string();
    seen.lock().unwrap().push(request);

    tokio::time::sleep(delay).await;
    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nX-Backend: mock\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a backend that sends headers and a few body bytes, then stalls.
pub async fn start_stalling_backend(stall: Duration) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let h = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            h.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                let _ = socket.read(&mut chunk).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello";
                let _ = socket.write_all(head.as_bytes()).await;
                tokio::time::sleep(stall).await;
            });
        }
    });

    MockBackend { addr, hits, seen }
}

/// A local port with nothing listening on it.
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

/// Sign an HS256 token with valid defaults, overridden by `claims`.
pub fn mint_token(claims: Value) -> String {
    let mut payload = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "student-42",
        "exp": unix_now() + 600,
    });
    if let (Some(payload), Some(overrides)) = (payload.as_object_mut(), claims.as_object()) {
        for (k, v) in overrides {
            payload.insert(k.clone(), v.clone());
        }
    }
    encode(
        &Header::default(),
        &payload,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// A protected route with one local target.
pub fn route(name: &str, upstream_path: &str, port: u16) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        upstream_path: upstream_path.into(),
        downstream_path: None,
        host: None,
        methods: Vec::new(),
        targets: vec![TargetConfig {
            scheme: "http".into(),
            host: "127.0.0.1".into(),
            port,
            max_connections: 16,
        }],
        load_balancing: None,
        policy: Some("Bearer".into()),
        anonymous: false,
        strip_authorization: false,
        timeout_ms: None,
        retries: 0,
    }
}

pub fn gateway_config(routes: Vec<RouteConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.jwt.issuer = ISSUER.into();
    config.jwt.audience = AUDIENCE.into();
    config.jwt.key = KeyConfig::Secret {
        value: SECRET.into(),
    };
    config.forwarding.connect_timeout_ms = 500;
    config.forwarding.retry_base_delay_ms = 10;
    config.forwarding.retry_max_delay_ms = 50;
    config.routes = routes;
    config
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub base_url: String,
    pub store: Arc<SnapshotStore>,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
    pub audit: mpsc::UnboundedReceiver<AuditEvent>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Audit events emitted so far.
    pub fn drain_audit(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.audit.try_recv() {
            events.push(event);
        }
        events
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let (sink, audit) = ChannelAuditSink::new();
    let sink: Arc<dyn AuditSink> = Arc::new(sink);
    let forwarder = Arc::new(HttpForwarder::new(&config.forwarding, sink.clone()));
    let server = GatewayServer::with_parts(&config, forwarder, sink).unwrap();
    let store = server.snapshots();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (updates, rx) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, rx, shutdown.subscribe()));

    TestGateway {
        base_url: format!("http://{}", addr),
        store,
        updates,
        audit,
        shutdown,
    }
}

/// A client that never pools, so each test request opens its own connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
