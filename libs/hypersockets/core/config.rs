use crate::traits::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default handshake timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle events buffered for the consumer before the oldest are dropped
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Query parameter carrying the bearer credential when none is configured
pub const DEFAULT_CREDENTIAL_PARAM: &str = "token";

/// Configuration for WebSocketClient with routing support
///
/// This struct holds everything the driver task needs. It is built using the
/// type-state builder pattern and moved into the task on spawn.
pub struct ClientConfig<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    /// WebSocket URL (wss:// or ws://), without credential
    pub(crate) url: String,

    /// Message router for parsing and routing messages
    pub(crate) router: R,

    /// Handlers keyed by route key, invoked inline in arrival order
    pub(crate) handlers: HashMap<R::RouteKey, Box<dyn MessageHandler<M>>>,

    /// Query parameter name for the credential; `None` means no credential is required
    pub(crate) credential_param: Option<String>,

    /// Initial credential
    pub(crate) credential: Option<String>,

    /// Connect as soon as the driver starts (and whenever a credential reappears)
    pub(crate) auto_connect: bool,

    /// Reconnection strategy
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Upper bound on a single handshake
    pub(crate) connect_timeout: Duration,

    /// Subscription messages replayed after every successful handshake
    pub(crate) subscriptions: Arc<dyn SubscriptionProvider>,

    /// Observation hooks
    pub(crate) hooks: Arc<dyn ConnectionHooks>,

    /// Capacity of the lifecycle event channel
    pub(crate) event_capacity: usize,
}

impl<R, M> ClientConfig<R, M>
where
    R: MessageRouter<Message = M>,
    M: Send + std::fmt::Debug + 'static,
{
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Check if a credential must be present before connecting
    pub fn requires_credential(&self) -> bool {
        self.credential_param.is_some()
    }

    /// Get the number of configured handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
