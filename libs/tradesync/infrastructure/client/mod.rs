//! Trading backend clients
//!
//! Provides the streaming client (real-time sync) and the REST client used
//! for resync.

pub mod rest;
pub mod stream;

pub use rest::{RestClient, RestError};
pub use stream::{
    ListenerHandle, TradingApi, TradingHub, TradingStream, TransformError,
};
