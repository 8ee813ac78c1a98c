use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::machine::{ConnectionMachine, MachineAction, MachineEvent};
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An in-flight handshake, polled by the driver alongside its commands
type Handshake = Pin<Box<dyn Future<Output = Result<WsStream>> + Send>>;

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Open a connection if currently disconnected
    Connect,
    /// Close the connection and cancel any pending reconnect
    Disconnect,
    /// Send a message to the WebSocket
    Send(WsMessage),
    /// Replace (or revoke) the credential
    SetCredential(Option<String>),
    /// Disconnect and stop the driver task
    Shutdown,
}

/// Lifecycle events published by the driver task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected to the server
    Connected,
    /// Disconnected from the server
    Disconnected,
    /// Reconnect scheduled (attempt number, 1-indexed)
    Reconnecting(usize),
    /// Error occurred
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// WebSocket client with an explicit reconnect state machine
///
/// The client is a handle: all I/O happens on a single driver task that owns
/// the socket, the [`ConnectionMachine`] and the reconnect timer. Commands
/// are delivered to the task over a channel, so every method here is
/// non-blocking and safe to call from any thread.
///
/// Lifecycle events are buffered up to the builder's `event_capacity`.
/// Consumers should drain them with [`try_recv_event`](Self::try_recv_event);
/// once the buffer is full the oldest events are discarded.
///
/// # Type Parameters
/// - `R`: MessageRouter implementation
/// - `M`: Message type (determined by router)
pub struct WebSocketClient<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    _router: PhantomData<fn() -> (R, M)>,
}

impl<R, M> WebSocketClient<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    /// Create a new WebSocket client from configuration and spawn its driver
    ///
    /// This is called by the builder's `build()` method.
    /// Use `hypersockets::builder()` to create a client.
    pub(crate) fn new(config: ClientConfig<R, M>) -> Result<Self> {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));

        let driver = ConnectionDriver::new(
            config,
            Arc::clone(&state),
            Arc::clone(&metrics),
            event_tx,
            event_rx.clone(),
        );
        let task_handle = tokio::spawn(driver.run(command_rx));

        Ok(Self {
            state,
            metrics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
            _router: PhantomData,
        })
    }

    /// Request a connection. No-op unless currently disconnected.
    pub fn connect(&self) -> Result<()> {
        self.command(ClientCommand::Connect)
    }

    /// Close the connection and cancel any pending reconnect. Always safe.
    pub fn disconnect(&self) -> Result<()> {
        self.command(ClientCommand::Disconnect)
    }

    /// Send a message through the WebSocket
    ///
    /// Honored only while connected; otherwise the driver drops the message
    /// with a warning. Messages are never queued for a later connection.
    pub fn send(&self, message: WsMessage) -> Result<()> {
        self.command(ClientCommand::Send(message))
    }

    /// Replace the credential used for the next handshake
    ///
    /// `None` revokes it and forces a disconnect. A new credential while
    /// disconnected triggers a connect when auto-connect is enabled.
    pub fn set_credential(&self, credential: Option<String>) -> Result<()> {
        self.command(ClientCommand::SetCredential(credential))
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Receive an event, waiting at most `timeout` (blocking)
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Disconnect and wait for the driver task to exit
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down WebSocket client");

        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| HyperSocketError::InvalidState(format!("Driver task failed: {}", e)))?;
        }

        Ok(())
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| HyperSocketError::ChannelSend(e.to_string()))
    }
}

/// Owns the socket and executes the state machine's actions
struct ConnectionDriver<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    url: String,
    router: R,
    handlers: HashMap<R::RouteKey, Box<dyn MessageHandler<M>>>,
    credential_param: Option<String>,
    credential: Option<String>,
    auto_connect: bool,
    connect_timeout: Duration,
    subscriptions: Arc<dyn SubscriptionProvider>,
    hooks: Arc<dyn ConnectionHooks>,
    machine: ConnectionMachine,
    socket: Option<WsStream>,
    handshake: Option<Handshake>,
    retry_at: Option<Instant>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    event_tx: Sender<ClientEvent>,
    /// Receiver half used to evict the oldest event when the buffer is full
    event_overflow: Receiver<ClientEvent>,
}

impl<R, M> ConnectionDriver<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    fn new(
        config: ClientConfig<R, M>,
        state: Arc<AtomicConnectionState>,
        metrics: Arc<AtomicMetrics>,
        event_tx: Sender<ClientEvent>,
        event_overflow: Receiver<ClientEvent>,
    ) -> Self {
        let ClientConfig {
            url,
            router,
            handlers,
            credential_param,
            credential,
            auto_connect,
            reconnect_strategy,
            connect_timeout,
            subscriptions,
            hooks,
            event_capacity: _,
        } = config;

        Self {
            url,
            router,
            handlers,
            credential_param,
            credential,
            auto_connect,
            connect_timeout,
            subscriptions,
            hooks,
            machine: ConnectionMachine::new(reconnect_strategy, auto_connect),
            socket: None,
            handshake: None,
            retry_at: None,
            state,
            metrics,
            event_tx,
            event_overflow,
        }
    }

    /// Main driver loop
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<ClientCommand>) {
        if self.auto_connect {
            if self.credential_ready() {
                self.dispatch(MachineEvent::ConnectRequested { credential_ready: true })
                    .await;
            } else {
                debug!("[Connection] Auto-connect waiting for a credential");
            }
        }

        loop {
            let retry_at = self.retry_at;

            tokio::select! {
                // Commands first, so a disconnect queued behind a frame or a
                // finished handshake still wins
                biased;

                command = command_rx.recv() => {
                    match command {
                        Some(ClientCommand::Connect) => {
                            let credential_ready = self.credential_ready();
                            self.dispatch(MachineEvent::ConnectRequested { credential_ready }).await;
                        }
                        Some(ClientCommand::Disconnect) => {
                            self.dispatch(MachineEvent::DisconnectRequested).await;
                        }
                        Some(ClientCommand::Send(message)) => {
                            self.send_outbound(message).await;
                        }
                        Some(ClientCommand::SetCredential(credential)) => {
                            self.on_credential(credential).await;
                        }
                        Some(ClientCommand::Shutdown) | None => {
                            info!("[Connection] Received shutdown command");
                            self.dispatch(MachineEvent::DisconnectRequested).await;
                            break;
                        }
                    }
                }

                result = next_handshake(&mut self.handshake) => {
                    self.handshake = None;
                    let event = self.on_handshake(result);
                    self.dispatch(event).await;
                }

                frame = next_frame(&mut self.socket) => {
                    self.on_frame(frame).await;
                }

                _ = retry_deadline(retry_at) => {
                    self.retry_at = None;
                    self.dispatch(MachineEvent::RetryTimerFired).await;
                }
            }
        }

        info!("[Connection] Driver task exiting");
    }

    /// Feed an event to the machine and execute the resulting actions,
    /// including any follow-up events produced by I/O.
    async fn dispatch(&mut self, event: MachineEvent) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for action in self.machine.handle(event) {
                if let Some(next) = self.execute(action).await {
                    pending.push_back(next);
                }
            }
        }
    }

    async fn execute(&mut self, action: MachineAction) -> Option<MachineEvent> {
        match action {
            MachineAction::Transition { from, to } => {
                self.publish(from, to);
                None
            }
            MachineAction::OpenConnection => self.open(),
            MachineAction::ReplaySubscriptions => {
                self.replay_subscriptions().await;
                None
            }
            MachineAction::ScheduleReconnect { delay, attempt } => {
                self.retry_at = Some(Instant::now() + delay);
                self.metrics.increment_reconnects();
                self.emit(ClientEvent::Reconnecting(attempt));
                None
            }
            MachineAction::CancelReconnect => {
                if self.retry_at.take().is_some() {
                    debug!("[Connection] Pending reconnect cancelled");
                }
                None
            }
            MachineAction::CloseConnection => {
                self.close().await;
                None
            }
            // Already logged by the machine; nothing to do
            MachineAction::MissingCredential => None,
        }
    }

    fn publish(&self, from: ConnectionState, to: ConnectionState) {
        self.state.set(to);
        debug!("[Connection] {} -> {}", from, to);

        match to {
            ConnectionState::Connected => {
                info!("[Connection] Connected to {}", self.url);
                self.emit(ClientEvent::Connected);
                self.hooks.on_connect();
            }
            ConnectionState::Disconnected if from != ConnectionState::Reconnecting => {
                info!("[Connection] Disconnected from {}", self.url);
                self.emit(ClientEvent::Disconnected);
                self.hooks.on_disconnect();
            }
            _ => {}
        }
    }

    /// Start the handshake. The driver loop polls it, so commands keep
    /// flowing while it is in flight.
    fn open(&mut self) -> Option<MachineEvent> {
        let url = match self.handshake_url() {
            Ok(url) => url,
            Err(e) => {
                self.report(e);
                return Some(MachineEvent::HandshakeFailed);
            }
        };

        debug!("[Connection] Opening {}", self.url);

        let timeout = self.connect_timeout;
        self.handshake = Some(Box::pin(async move {
            match tokio::time::timeout(timeout, connect_async(url)).await {
                Ok(Ok((ws_stream, _response))) => Ok(ws_stream),
                Ok(Err(e)) => Err(HyperSocketError::WebSocket(format!("Handshake failed: {}", e))),
                Err(_) => Err(HyperSocketError::Timeout(format!("Handshake exceeded {:?}", timeout))),
            }
        }));
        None
    }

    fn on_handshake(&mut self, result: Result<WsStream>) -> MachineEvent {
        match result {
            Ok(ws_stream) => {
                self.socket = Some(ws_stream);
                MachineEvent::HandshakeSucceeded
            }
            Err(e) => {
                self.report(e);
                MachineEvent::HandshakeFailed
            }
        }
    }

    /// URL for the handshake, with the credential appended as a query parameter
    fn handshake_url(&self) -> Result<String> {
        let Some(param) = self.credential_param.as_deref() else {
            return Ok(self.url.clone());
        };

        let credential = self
            .credential
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| HyperSocketError::MissingCredential("no credential for handshake".into()))?;

        let mut url = Url::parse(&self.url)
            .map_err(|e| HyperSocketError::Configuration(format!("Invalid URL {}: {}", self.url, e)))?;
        url.query_pairs_mut().append_pair(param, credential);

        Ok(url.into())
    }

    fn credential_ready(&self) -> bool {
        self.credential_param.is_none()
            || self.credential.as_deref().is_some_and(|c| !c.is_empty())
    }

    async fn on_credential(&mut self, credential: Option<String>) {
        self.credential = credential.filter(|c| !c.is_empty());

        if self.credential_param.is_some() {
            let present = self.credential.is_some();
            self.dispatch(MachineEvent::CredentialChanged { present }).await;
        }
    }

    async fn replay_subscriptions(&mut self) {
        let messages = self.subscriptions.replay_messages();
        if !messages.is_empty() {
            debug!("[Connection] Replaying {} subscription message(s)", messages.len());
        }
        for message in messages {
            if !self.write(message).await {
                break;
            }
        }
    }

    async fn send_outbound(&mut self, message: WsMessage) {
        let state = self.machine.state();
        if state != ConnectionState::Connected {
            warn!("[Connection] Dropping outbound message while {}", state);
            return;
        }
        self.write(message).await;
    }

    async fn write(&mut self, message: WsMessage) -> bool {
        let Some(ws) = self.socket.as_mut() else {
            return false;
        };

        let result = ws.send(ws_message_to_tungstenite(message)).await;
        match result {
            Ok(()) => {
                self.metrics.increment_sent();
                true
            }
            Err(e) => {
                self.report(HyperSocketError::WebSocket(format!("Send failed: {}", e)));
                false
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<std::result::Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.on_data(WsMessage::Text(text)).await,
            Some(Ok(Message::Binary(data))) => self.on_data(WsMessage::Binary(data)).await,
            Some(Ok(Message::Close(frame))) => {
                debug!("[Connection] Close frame received: {:?}", frame);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.report(HyperSocketError::WebSocket(e.to_string()));
                self.on_transport_closed().await;
            }
            None => {
                warn!("[Connection] WebSocket stream closed");
                self.on_transport_closed().await;
            }
        }
    }

    async fn on_transport_closed(&mut self) {
        self.socket = None;
        self.dispatch(MachineEvent::TransportClosed).await;
    }

    /// Parse and route one data frame inline
    async fn on_data(&mut self, message: WsMessage) {
        self.metrics.increment_received();
        self.hooks.on_message(&message);

        match self.router.parse(message).await {
            Ok(parsed) => {
                let route_key = self.router.route_key(&parsed);
                match self.handlers.get_mut(&route_key) {
                    Some(handler) => {
                        if let Err(e) = handler.handle(parsed) {
                            warn!("[Connection] Handler error for route {:?}: {}", route_key, e);
                        }
                    }
                    None => debug!("[Connection] No handler configured for route key: {:?}", route_key),
                }
            }
            Err(e) => {
                warn!("[Connection] Discarding malformed frame: {}", e);
            }
        }
    }

    async fn close(&mut self) {
        if self.handshake.take().is_some() {
            debug!("[Connection] Pending handshake abandoned");
        }
        if let Some(mut ws) = self.socket.take() {
            if let Err(e) = ws.close(None).await {
                debug!("[Connection] Close handshake failed: {}", e);
            }
        }
    }

    fn report(&self, error: HyperSocketError) {
        error!("[Connection] {}", error);
        self.emit(ClientEvent::Error(error.to_string()));
        self.hooks.on_error(&error);
    }

    fn emit(&self, event: ClientEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                if let Ok(dropped) = self.event_overflow.try_recv() {
                    debug!("[Connection] Event buffer full, dropped {:?}", dropped);
                }
                let _ = self.event_tx.try_send(event);
            }
        }
    }
}

/// Next frame from the socket; pends forever while there is none
async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<std::result::Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

/// Outcome of the in-flight handshake; pends forever while there is none
async fn next_handshake(handshake: &mut Option<Handshake>) -> Result<WsStream> {
    match handshake {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

/// Resolves at the retry deadline; pends forever when no retry is scheduled
async fn retry_deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}
