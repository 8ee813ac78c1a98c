//! Trading Sync
//!
//! Real-time synchronization of orders, positions and P&L with a trading
//! backend: transform, subscriptions, state store and notification hub.

pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use domain::{
    Channel, ExecutionTrigger, Order, OrderKind, OrderStatus, PnlSnapshot, Position,
    PositionStatus, Side, TradingMode,
};
pub use infrastructure::{
    init_tracing, ConfigError, ListenerHandle, RestClient, RestError, RestOptions, StreamOptions,
    SyncConfig, TradingApi, TradingHub, TradingStream,
};
