//! Domain Layer
//!
//! Contains pure business entities and domain models.
//! This layer has no dependencies on infrastructure.

pub mod channel;
pub mod trading;

pub use channel::Channel;
pub use trading::{
    ExecutionTrigger, Order, OrderKind, OrderStatus, PnlSnapshot, Position, PositionStatus, Side,
    TradingMode,
};
