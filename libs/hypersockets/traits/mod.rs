//! # HyperSockets Traits
//!
//! Core traits and types used by the connection driver:
//!
//! - **MessageRouter / MessageHandler**: Parse incoming frames and handle them in order
//! - **ReconnectionStrategy**: Control reconnection delay and budget
//! - **SubscriptionProvider**: Supply the subscription messages replayed on connect
//! - **ConnectionHooks**: Observe connect, disconnect, message and error events

pub mod error;
pub mod hooks;
pub mod parser;
pub mod reconnect;
pub mod router;
pub mod subscriptions;

// Re-export commonly used types
pub use error::{HyperSocketError, Result};
pub use hooks::{ConnectionHooks, NoHooks};
pub use parser::WsMessage;
pub use reconnect::{FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use router::{MessageHandler, MessageRouter};
pub use subscriptions::{StaticSubscriptions, SubscriptionProvider};
