//! Common test utilities for HyperSockets integration tests
//!
//! A local WebSocket server that records what clients send, can push frames
//! to every connected client, and can drop connections on demand.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
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
enum ServerCommand {
    Text(String),
    DropConnections,
}

/// A mock WebSocket server for driver tests
pub struct MockWsServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<Option<String>>>>,
    accepted: Arc<AtomicUsize>,
    outbound: broadcast::Sender<ServerCommand>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (outbound, _) = broadcast::channel(256);

        let server = Self {
            addr,
            received: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            accepted: Arc::new(AtomicUsize::new(0)),
            outbound,
            shutdown: Arc::new(Notify::new()),
        };

        let received = Arc::clone(&server.received);
        let queries = Arc::clone(&server.queries);
        let accepted = Arc::clone(&server.accepted);
        let outbound = server.outbound.clone();
        let shutdown = Arc::clone(&server.shutdown);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                // Subscribe before the handshake so no pushed frame is missed
                                let commands = outbound.subscribe();
                                tokio::spawn(handle_connection(
                                    stream,
                                    commands,
                                    Arc::clone(&received),
                                    Arc::clone(&queries),
                                    Arc::clone(&accepted),
                                    Arc::clone(&shutdown),
                                ));
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });

        server
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Push a text frame to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.outbound.send(ServerCommand::Text(text.into()));
    }

    /// Drop every open connection without a close handshake
    pub fn drop_connections(&self) {
        let _ = self.outbound.send(ServerCommand::DropConnections);
    }

    /// Text frames received from clients, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Query string of each accepted handshake
    pub fn queries(&self) -> Vec<Option<String>> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of completed handshakes
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut commands: broadcast::Receiver<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<Option<String>>>>,
    accepted: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    let record_query = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        queries
            .lock()
            .unwrap()
            .push(request.uri().query().map(str::to_string));
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, record_query).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    accepted.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => received.lock().unwrap().push(text),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Ok(ServerCommand::Text(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerCommand::DropConnections) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// Accepts TCP connections but never answers the WebSocket upgrade
pub struct StalledServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl StalledServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        Self { addr, accepted, task }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for StalledServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a local port with nothing listening on it
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
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
