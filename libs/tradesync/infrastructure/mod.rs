//! Infrastructure Layer
//!
//! Contains implementations of external interfaces (stream, REST, config).
//! This layer depends on the domain layer.

pub mod client;
pub mod config;
pub mod logging;

pub use client::{
    rest::{RestClient, RestError},
    stream::{ListenerHandle, TradingApi, TradingHub, TradingStream},
};

pub use config::{ConfigError, RestOptions, StreamOptions, SyncConfig};
pub use logging::init_tracing;
