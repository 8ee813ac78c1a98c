//! Common test utilities for trading sync integration tests
//!
//! `MockTradingBackend` speaks the streaming protocol: it records every
//! command a client sends, answers subscribe/unsubscribe with a confirmation
//! of its own channel view, and can push events or drop connections.
//! `MockRestServer` answers fixed JSON bodies per path over plain HTTP/1.1.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Clone)]
enum BackendCommand {
    Push(String),
    DropConnections,
}

#[derive(Default)]
struct BackendState {
    /// Every text frame received, in arrival order
    received: Vec<String>,
    /// Query string of each accepted handshake
    queries: Vec<Option<String>>,
    /// Backend's own view of the subscription set
    channels: BTreeSet<String>,
}

pub struct MockTradingBackend {
    pub addr: SocketAddr,
    state: Arc<Mutex<BackendState>>,
    accepted: Arc<AtomicUsize>,
    confirm: Arc<AtomicBool>,
    outbound: broadcast::Sender<BackendCommand>,
    shutdown: Arc<Notify>,
}

impl MockTradingBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (outbound, _) = broadcast::channel(256);

        let backend = Self {
            addr,
            state: Arc::new(Mutex::new(BackendState::default())),
            accepted: Arc::new(AtomicUsize::new(0)),
            confirm: Arc::new(AtomicBool::new(false)),
            outbound,
            shutdown: Arc::new(Notify::new()),
        };

        let state = Arc::clone(&backend.state);
        let accepted = Arc::clone(&backend.accepted);
        let confirm = Arc::clone(&backend.confirm);
        let outbound = backend.outbound.clone();
        let shutdown = Arc::clone(&backend.shutdown);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let commands = outbound.subscribe();
                        tokio::spawn(serve_stream(
                            stream,
                            commands,
                            Arc::clone(&state),
                            Arc::clone(&accepted),
                            Arc::clone(&confirm),
                            Arc::clone(&shutdown),
                        ));
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });

        backend
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/trading", self.addr)
    }

    /// Answer subscribe/unsubscribe commands with a confirmation
    pub fn set_confirmations(&self, enabled: bool) {
        self.confirm.store(enabled, Ordering::SeqCst);
    }

    pub fn push(&self, event: Value) {
        let _ = self.outbound.send(BackendCommand::Push(event.to_string()));
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.outbound.send(BackendCommand::Push(text.to_string()));
    }

    pub fn drop_connections(&self) {
        let _ = self.outbound.send(BackendCommand::DropConnections);
    }

    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    /// Received frames decoded as JSON
    pub fn received_json(&self) -> Vec<Value> {
        self.received()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    pub fn queries(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockTradingBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve_stream(
    stream: TcpStream,
    mut commands: broadcast::Receiver<BackendCommand>,
    state: Arc<Mutex<BackendState>>,
    accepted: Arc<AtomicUsize>,
    confirm: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    let query_state = Arc::clone(&state);
    let record_query = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        query_state
            .lock()
            .unwrap()
            .queries
            .push(request.uri().query().map(str::to_string));
        Ok(response)
    };

    let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, record_query).await else {
        return;
    };
    accepted.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = apply_command(&state, &text);
                        state.lock().unwrap().received.push(text);
                        if let Some(reply) = reply.filter(|_| confirm.load(Ordering::SeqCst)) {
                            if write.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Ok(BackendCommand::Push(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(BackendCommand::DropConnections) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// Update the backend's channel view; returns the confirmation frame
fn apply_command(state: &Arc<Mutex<BackendState>>, text: &str) -> Option<String> {
    let command: Value = serde_json::from_str(text).ok()?;
    let action = command.get("action")?.as_str()?.to_string();
    let names: Vec<String> = command
        .get("channels")?
        .as_array()?
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect();

    let mut state = state.lock().unwrap();
    let reply_type = match action.as_str() {
        "subscribe" => {
            state.channels.extend(names);
            "subscribed"
        }
        "unsubscribe" => {
            for name in &names {
                state.channels.remove(name);
            }
            "unsubscribed"
        }
        _ => return None,
    };

    let channels: Vec<&String> = state.channels.iter().collect();
    Some(json!({"type": reply_type, "data": {"channels": channels}}).to_string())
}

/// Minimal HTTP/1.1 server answering fixed bodies per path
pub struct MockRestServer {
    pub addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
    shutdown: Arc<Notify>,
}

impl MockRestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Self {
            addr,
            routes: Arc::new(Mutex::new(HashMap::new())),
            authorizations: Arc::new(Mutex::new(Vec::new())),
            shutdown: Arc::new(Notify::new()),
        };

        let routes = Arc::clone(&server.routes);
        let authorizations = Arc::clone(&server.authorizations);
        let shutdown = Arc::clone(&server.shutdown);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        tokio::spawn(serve_http(
                            stream,
                            Arc::clone(&routes),
                            Arc::clone(&authorizations),
                        ));
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });

        server
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Answer `GET /api{path}` with the given status and JSON body
    pub fn route(&self, path: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("/api{}", path), (status, body.to_string()));
    }

    /// `Authorization` header of every request, in arrival order
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.authorizations.lock().unwrap().clone()
    }
}

impl Drop for MockRestServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

async fn serve_http(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, (u16, String)>>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buffer).to_string();
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let authorization = request
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("authorization:"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string());
    authorizations.lock().unwrap().push(authorization);

    let (status, body) = routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));

    let reason = if status < 400 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
