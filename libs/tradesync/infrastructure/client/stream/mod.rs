//! Trading Stream
//!
//! Real-time order, position and P&L synchronization over the backend's
//! streaming endpoint.
//!
//! # Usage
//!
//! ```ignore
//! use tradesync::infrastructure::client::stream::*;
//!
//! let stream = TradingStream::start(&config.stream, token, Arc::new(NoHooks)).await?;
//!
//! // Register a listener; keep the handle to unregister later
//! let handle = stream.hub().on_order_update(|order| {
//!     println!("{} is now {}", order.order_id, order.status);
//! });
//!
//! stream.subscribe(&[Channel::Executions])?;
//! stream.hub().resync(&rest_client).await?;
//!
//! handle.unregister();
//! stream.shutdown().await?;
//! ```
//!
//! # Message Types
//!
//! - **order_update / position_update**: upserted by identifier
//! - **pnl_update**: replaces the P&L snapshot wholesale
//! - **subscribed / unsubscribed**: reconcile the desired channel set

pub mod hub;
pub mod listeners;
pub mod resync;
pub mod store;
pub mod stream_ws;
pub mod subscriptions;
pub mod transform;
pub mod types;

pub use hub::TradingHub;
pub use listeners::{ListenerHandle, ListenerRegistry};
pub use resync::TradingApi;
pub use store::{SharedTradingState, TradingStateStore};
pub use stream_ws::{ControlHandler, StateHandler, StreamRouter, TradingStream};
pub use subscriptions::{SharedSubscriptions, SubscriptionRegistry, SubscriptionReplay};
pub use transform::{order_from_wire, parse_timestamp, pnl_from_wire, position_from_wire, TransformError};
pub use types::{StreamEnvelope, StreamMessage, StreamRoute, SubscriptionAction, SubscriptionCommand};
