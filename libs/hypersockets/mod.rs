//! # HyperSockets
//!
//! A WebSocket client with an explicit, testable reconnect state machine.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `disconnected → connecting → connected`, with a
//!   `reconnecting` state holding a cancellable retry timer
//! - **Type-state builder**: Compile-time guarantees for required configuration
//! - **Ordered routing**: Frames are parsed and handled inline, in arrival order
//! - **Subscription replay**: The desired subscription set is resent on every handshake
//! - **Credential-aware**: Bearer credential carried as a URL query parameter

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder, client, config, connection_state, machine,
    builder::{states, RoutingBuilder, WebSocketClientBuilder},
    client::{ClientEvent, Metrics, WebSocketClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    machine::{ConnectionMachine, MachineAction, MachineEvent},
};

// Convenience function
pub use core::builder as client_builder;
