pub mod states;

use crate::client::WebSocketClient;
use crate::config::{
    ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_CREDENTIAL_PARAM, DEFAULT_EVENT_CAPACITY,
};
use crate::traits::*;
use states::*;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Default delay between reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Default reconnect budget
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: usize = 5;

type HandlerMap<R> = HashMap<
    <R as MessageRouter>::RouteKey,
    Box<dyn MessageHandler<<R as MessageRouter>::Message>>,
>;

/// Optional settings shared by every builder state
struct BuilderOptions {
    credential_param: Option<String>,
    credential: Option<String>,
    auto_connect: bool,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    connect_timeout: Duration,
    subscriptions: Option<Arc<dyn SubscriptionProvider>>,
    hooks: Option<Arc<dyn ConnectionHooks>>,
    event_capacity: usize,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            credential_param: None,
            credential: None,
            auto_connect: true,
            reconnect_strategy: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            subscriptions: None,
            hooks: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Type-state builder for WebSocketClient with routing
///
/// This builder uses Rust's type system to enforce that required
/// fields (URL and router) are set before the client can be built.
///
/// Handlers can be added for each route key that the router produces.
pub struct WebSocketClientBuilder<U, Ro, R, M>
where
    U: UrlState,
    Ro: RouterState,
{
    _state: TypeState<U, Ro>,
    _message_type: PhantomData<M>,
    url: Option<String>,
    router: Option<R>,
    // Erased HandlerMap<R>; R is only known to be a router once set
    handlers: Option<Box<dyn Any + Send>>,
    options: BuilderOptions,
}

impl WebSocketClientBuilder<NoUrl, NoRouter, (), ()> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            _message_type: PhantomData,
            url: None,
            router: None,
            handlers: None,
            options: BuilderOptions::default(),
        }
    }
}

impl Default for WebSocketClientBuilder<NoUrl, NoRouter, (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

// URL setting
impl<Ro, R, M> WebSocketClientBuilder<NoUrl, Ro, R, M>
where
    Ro: RouterState,
{
    pub fn url(self, url: impl Into<String>) -> WebSocketClientBuilder<HasUrl, Ro, R, M> {
        WebSocketClientBuilder {
            _state: TypeState::new(),
            _message_type: PhantomData,
            url: Some(url.into()),
            router: self.router,
            handlers: self.handlers,
            options: self.options,
        }
    }
}

/// Routing builder helper
///
/// This helper allows adding handlers for different route keys.
pub struct RoutingBuilder<R>
where
    R: MessageRouter,
{
    handlers: HandlerMap<R>,
}

impl<R> RoutingBuilder<R>
where
    R: MessageRouter,
{
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add a handler for a specific route key
    pub fn handler<H>(mut self, route_key: R::RouteKey, handler: H) -> Self
    where
        H: MessageHandler<R::Message>,
    {
        self.handlers.insert(route_key, Box::new(handler));
        self
    }
}

// Router setting
impl<U> WebSocketClientBuilder<U, NoRouter, (), ()>
where
    U: UrlState,
{
    pub fn router<NewR, F>(
        self,
        router: NewR,
        configure_routing: F,
    ) -> WebSocketClientBuilder<U, HasRouter, NewR, NewR::Message>
    where
        NewR: MessageRouter,
        F: FnOnce(RoutingBuilder<NewR>) -> RoutingBuilder<NewR>,
    {
        let routing = configure_routing(RoutingBuilder::<NewR>::new());

        WebSocketClientBuilder {
            _state: TypeState::new(),
            _message_type: PhantomData,
            url: self.url,
            router: Some(router),
            handlers: Some(Box::new(routing.handlers)),
            options: self.options,
        }
    }
}

// Optional configuration methods
impl<U, Ro, R, M> WebSocketClientBuilder<U, Ro, R, M>
where
    U: UrlState,
    Ro: RouterState,
{
    /// Require a credential, sent as the given URL query parameter
    pub fn credential_query(mut self, param: impl Into<String>) -> Self {
        self.options.credential_param = Some(param.into());
        self
    }

    /// Require a credential, sent as `?token=...`
    pub fn require_credential(self) -> Self {
        self.credential_query(DEFAULT_CREDENTIAL_PARAM)
    }

    /// Initial credential (may be supplied later through the client)
    pub fn credential(mut self, credential: Option<String>) -> Self {
        self.options.credential = credential;
        self
    }

    /// Connect as soon as the client is built (default: true)
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.options.auto_connect = enabled;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.options.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Provider asked for the subscription messages on every successful handshake
    pub fn subscriptions(mut self, provider: impl SubscriptionProvider + 'static) -> Self {
        self.options.subscriptions = Some(Arc::new(provider));
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ConnectionHooks>) -> Self {
        self.options.hooks = Some(hooks);
        self
    }

    /// Lifecycle events kept for the consumer. When nobody drains them the
    /// oldest are dropped (minimum 1).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity.max(1);
        self
    }
}

// Build method - only available when all required fields are set
impl<R> WebSocketClientBuilder<HasUrl, HasRouter, R, R::Message>
where
    R: MessageRouter,
{
    /// Spawn the driver task and return the client handle
    ///
    /// Must be called from within a tokio runtime.
    pub async fn build(self) -> Result<WebSocketClient<R, R::Message>> {
        let url = self
            .url
            .ok_or_else(|| HyperSocketError::Configuration("URL must be set".into()))?;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(HyperSocketError::Configuration(format!(
                "URL must use ws:// or wss://, got {}",
                url
            )));
        }

        let router = self
            .router
            .ok_or_else(|| HyperSocketError::Configuration("Router must be set".into()))?;

        let handlers = match self.handlers {
            Some(erased) => *erased
                .downcast::<HandlerMap<R>>()
                .map_err(|_| HyperSocketError::Configuration("Handler map type mismatch".into()))?,
            None => HashMap::new(),
        };

        let options = self.options;

        let reconnect_strategy = options.reconnect_strategy.unwrap_or_else(|| {
            Box::new(FixedDelay::new(
                DEFAULT_RECONNECT_INTERVAL,
                Some(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            ))
        });

        let config = ClientConfig {
            url,
            router,
            handlers,
            credential_param: options.credential_param,
            credential: options.credential,
            auto_connect: options.auto_connect,
            reconnect_strategy,
            connect_timeout: options.connect_timeout,
            subscriptions: options
                .subscriptions
                .unwrap_or_else(|| Arc::new(StaticSubscriptions::default())),
            hooks: options.hooks.unwrap_or_else(|| Arc::new(NoHooks)),
            event_capacity: options.event_capacity,
        };

        WebSocketClient::new(config)
    }
}
