//! # HyperSockets core
//!
//! The client is split into a pure state machine ([`machine`]) and the async
//! driver task that executes its actions ([`client`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! let client = hypersockets::builder()
//!     .url("wss://feed.example.com/ws")
//!     .router(FeedRouter, |routing| {
//!         routing
//!             .handler(Route::State, StateHandler::new(store))
//!             .handler(Route::Control, ControlHandler::new(registry))
//!     })
//!     .require_credential()
//!     .credential(Some(token))
//!     .reconnect_strategy(FixedDelay::new(Duration::from_secs(3), Some(5)))
//!     .subscriptions(registry_replay)
//!     .build()
//!     .await?;
//!
//! client.send(WsMessage::Text(r#"{"action":"subscribe","channels":["orders"]}"#.into()))?;
//!
//! while let Some(event) = client.try_recv_event() {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod machine;

// Re-export main types
pub use builder::{states, RoutingBuilder, WebSocketClientBuilder};
pub use client::{ClientEvent, Metrics, WebSocketClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use machine::{ConnectionMachine, MachineAction, MachineEvent};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new WebSocket client builder
pub fn builder() -> WebSocketClientBuilder<
    builder::states::NoUrl,
    builder::states::NoRouter,
    (),
    (),
> {
    WebSocketClientBuilder::new()
}
