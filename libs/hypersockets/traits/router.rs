//! Message Routing System
//!
//! Every frame received on a connection is parsed by the router and handed
//! to the handler registered for its route key.
//!
//! # Architecture
//!
//! ```text
//! WebSocket → Router::parse → Route Key → Handler::handle
//!                                 ↓
//!                         (inline on the driver task)
//! ```
//!
//! # Ordering Guarantees
//!
//! Frames are parsed and handled one at a time, in arrival order, on the
//! connection's driver task. A handler never observes message N+1 before
//! message N has been fully handled, regardless of route key.

use crate::{Result, WsMessage};
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;

/// Message router that parses WebSocket messages and determines routing
///
/// The router has two responsibilities:
/// 1. Parse the raw WebSocket message into a typed message
/// 2. Extract a route key that determines which handler processes it
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// enum Route {
///     State,
///     Control,
/// }
///
/// struct FeedRouter;
///
/// #[async_trait]
/// impl MessageRouter for FeedRouter {
///     type Message = FeedMessage;
///     type RouteKey = Route;
///
///     async fn parse(&self, message: WsMessage) -> Result<Self::Message> {
///         // Parse JSON and return typed message
///     }
///
///     fn route_key(&self, message: &Self::Message) -> Self::RouteKey {
///         match message {
///             FeedMessage::Update(_) => Route::State,
///             FeedMessage::Ack(_) => Route::Control,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait MessageRouter: Send + Sync + 'static {
    /// The parsed message type
    type Message: Send + Debug + 'static;

    /// The route key type (determines which handler processes the message)
    type RouteKey: Hash + Eq + Clone + Send + Sync + Debug + 'static;

    /// Parse a raw WebSocket message into a typed message
    ///
    /// Parsing errors are logged by the driver and the frame is discarded;
    /// they never close the connection.
    async fn parse(&self, message: WsMessage) -> Result<Self::Message>;

    /// Extract the route key from a parsed message
    fn route_key(&self, message: &Self::Message) -> Self::RouteKey;
}

/// Message handler that processes typed messages sequentially
///
/// # Example
///
/// ```ignore
/// struct UpdateHandler {
///     applied: Arc<AtomicU64>,
/// }
///
/// impl MessageHandler<FeedMessage> for UpdateHandler {
///     fn handle(&mut self, message: FeedMessage) -> Result<()> {
///         if let FeedMessage::Update(update) = message {
///             self.applied.fetch_add(1, Ordering::Relaxed);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    /// Handle a parsed message
    ///
    /// Runs on the driver task, so it must not block for long.
    ///
    /// # Errors
    /// If this returns an error, it is logged and the connection keeps
    /// processing subsequent messages.
    fn handle(&mut self, message: M) -> Result<()>;
}
